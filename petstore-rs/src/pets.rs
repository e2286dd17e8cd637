//! Pet catalog: pet records, form patches, and image attachments.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::store::{EntityStore, Record};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pet {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub name: String,
    pub photo_urls: Vec<String>,
    pub tags: Vec<Tag>,
    pub status: String,
}

impl Record for Pet {
    fn id(&self) -> i64 {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = id;
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Partial update submitted as `application/x-www-form-urlencoded`.
/// Absent or empty fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PetForm {
    pub name: Option<String>,
    pub status: Option<String>,
}

impl PetForm {
    fn apply(self, pet: &mut Pet) {
        if let Some(name) = self.name.filter(|name| !name.is_empty()) {
            pet.name = name;
        }
        if let Some(status) = self.status.filter(|status| !status.is_empty()) {
            pet.status = status;
        }
    }
}

#[derive(Debug, Default)]
pub struct PetCatalog {
    store: EntityStore<Pet>,
}

impl PetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> StoreResult<Pet> {
        self.store.get(id)
    }

    pub fn by_status(&self, status: &str) -> Vec<Pet> {
        self.store.by_status(status)
    }

    pub fn all(&self) -> Vec<Pet> {
        self.store.all()
    }

    /// Add a pet. The id in `pet`, if any, is replaced by a store-assigned one.
    pub fn create(&self, pet: Pet) -> StoreResult<i64> {
        let id = self.store.create(pet)?;
        debug!(pet_id = id, "pet created");
        Ok(id)
    }

    /// Replace every field except the id and the attached image.
    pub fn update_full(&self, id: i64, pet: Pet) -> StoreResult<Pet> {
        let updated = self.store.update(id, move |current| *current = pet)?;
        debug!(pet_id = id, status = %updated.status, "pet replaced");
        Ok(updated)
    }

    /// Merge name/status from a form submission into the stored pet.
    pub fn update_by_form(&self, id: i64, form: PetForm) -> StoreResult<Pet> {
        let updated = self.store.update(id, move |current| form.apply(current))?;
        debug!(pet_id = id, status = %updated.status, "pet patched from form");
        Ok(updated)
    }

    pub fn attach_image(&self, id: i64, image: Bytes) -> StoreResult<()> {
        if image.is_empty() {
            return Err(StoreError::BadInput(String::from("image body is empty")));
        }
        let size = image.len();
        self.store.attach_blob(id, image)?;
        debug!(pet_id = id, bytes = size, "pet image attached");
        Ok(())
    }

    pub fn image(&self, id: i64) -> StoreResult<Option<Bytes>> {
        self.store.blob(id)
    }

    pub fn delete(&self, id: i64) -> StoreResult<()> {
        self.store.delete(id)?;
        debug!(pet_id = id, "pet deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use bytes::Bytes;

    use super::{Pet, PetCatalog, PetForm};
    use crate::error::StoreError;

    fn pet(name: &str, status: &str) -> Pet {
        Pet {
            name: String::from(name),
            status: String::from(status),
            ..Pet::default()
        }
    }

    fn ids(pets: &[Pet]) -> Vec<i64> {
        pets.iter().map(|pet| pet.id).collect()
    }

    #[test]
    fn rex_walkthrough() {
        let catalog = PetCatalog::new();
        let id = catalog.create(pet("Rex", "available")).unwrap();
        assert_eq!(id, 1);
        assert_eq!(ids(&catalog.by_status("available")), vec![1]);

        catalog
            .update_by_form(
                id,
                PetForm {
                    name: None,
                    status: Some(String::from("sold")),
                },
            )
            .unwrap();
        assert!(catalog.by_status("available").is_empty());
        assert_eq!(ids(&catalog.by_status("sold")), vec![1]);
        assert_eq!(catalog.get(id).unwrap().name, "Rex");

        catalog.delete(id).unwrap();
        assert_eq!(catalog.get(id), Err(StoreError::NotFound));
        assert_eq!(catalog.create(pet("Fido", "available")).unwrap(), 2);
    }

    #[test]
    fn form_update_keeps_image_and_other_fields() {
        let catalog = PetCatalog::new();
        let mut original = pet("Rex", "available");
        original.photo_urls = vec![String::from("http://img/rex.png")];
        let id = catalog.create(original).unwrap();
        catalog
            .attach_image(id, Bytes::from_static(b"\x89PNG"))
            .unwrap();

        let updated = catalog
            .update_by_form(
                id,
                PetForm {
                    name: Some(String::from("Max")),
                    status: Some(String::new()),
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Max");
        assert_eq!(updated.status, "available");
        assert_eq!(updated.photo_urls, vec![String::from("http://img/rex.png")]);
        assert_eq!(
            catalog.image(id).unwrap(),
            Some(Bytes::from_static(b"\x89PNG"))
        );
    }

    #[test]
    fn full_update_replaces_fields_but_keeps_image() {
        let catalog = PetCatalog::new();
        let mut original = pet("Rex", "available");
        original.photo_urls = vec![String::from("http://img/rex.png")];
        let id = catalog.create(original).unwrap();
        catalog.attach_image(id, Bytes::from_static(b"img")).unwrap();

        let mut replacement = pet("Max", "pending");
        replacement.id = 500;
        let updated = catalog.update_full(id, replacement).unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "Max");
        assert!(updated.photo_urls.is_empty());
        assert_eq!(ids(&catalog.by_status("pending")), vec![id]);
        assert_eq!(catalog.image(id).unwrap(), Some(Bytes::from_static(b"img")));
    }

    #[test]
    fn operations_on_missing_pet_are_not_found() {
        let catalog = PetCatalog::new();

        assert_eq!(
            catalog.update_full(9, pet("Rex", "available")),
            Err(StoreError::NotFound)
        );
        assert_eq!(
            catalog.update_by_form(9, PetForm::default()),
            Err(StoreError::NotFound)
        );
        assert_eq!(
            catalog.attach_image(9, Bytes::from_static(b"img")),
            Err(StoreError::NotFound)
        );
        assert_eq!(catalog.delete(9), Err(StoreError::NotFound));
    }

    #[test]
    fn all_lists_live_pets_in_id_order() {
        let catalog = PetCatalog::new();
        catalog.create(pet("Rex", "available")).unwrap();
        let middle = catalog.create(pet("Max", "sold")).unwrap();
        catalog.create(pet("Bo", "pending")).unwrap();
        catalog.delete(middle).unwrap();

        assert_eq!(ids(&catalog.all()), vec![1, 3]);
        assert_eq!(catalog.image(1).unwrap(), None);
    }

    #[test]
    fn partial_replacement_resets_missing_fields() {
        let catalog = PetCatalog::new();
        assert!(catalog.is_empty());
        let id = catalog.create(pet("Rex", "available")).unwrap();

        let partial: Pet = serde_json::from_str(r#"{"status":"sold"}"#).unwrap();
        let updated = catalog.update_full(id, partial).unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.name, "");
        assert_eq!(ids(&catalog.by_status("sold")), vec![id]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn pet_json_uses_camel_case_and_defaults() {
        let parsed: Pet =
            serde_json::from_str(r#"{"name":"Rex","photoUrls":["a"],"status":"available"}"#)
                .unwrap();
        assert_eq!(parsed.id, 0);
        assert_eq!(parsed.photo_urls, vec![String::from("a")]);

        let rendered = serde_json::to_value(&parsed).unwrap();
        assert!(rendered.get("photoUrls").is_some());
        assert!(rendered.get("category").is_none());
    }
}
