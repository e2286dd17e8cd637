//! Generic concurrent record table with a secondary status index.
//!
//! A table owns three maps (records, status buckets, blobs) behind one
//! [`parking_lot::RwLock`], so a record and its index entry always change in
//! the same critical section. Readers get clones, never references into the
//! table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};

/// A value that can live in an [`EntityStore`].
pub trait Record: Clone + Send + Sync {
    fn id(&self) -> i64;
    fn assign_id(&mut self, id: i64);
    fn status(&self) -> &str;
}

#[derive(Debug)]
struct Table<T> {
    /// Next id to hand out; `None` once `i64::MAX` has been issued.
    next_id: Option<i64>,
    records: HashMap<i64, T>,
    by_status: HashMap<String, BTreeSet<i64>>,
    blobs: HashMap<i64, Bytes>,
}

impl<T> Table<T> {
    fn index_insert(&mut self, status: &str, id: i64) {
        self.by_status
            .entry(status.to_string())
            .or_default()
            .insert(id);
    }

    fn index_remove(&mut self, status: &str, id: i64) {
        if let Some(bucket) = self.by_status.get_mut(status) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.by_status.remove(status);
            }
        }
    }
}

#[derive(Debug)]
pub struct EntityStore<T> {
    inner: RwLock<Table<T>>,
}

impl<T: Record> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Table {
                next_id: Some(1),
                records: HashMap::new(),
                by_status: HashMap::new(),
                blobs: HashMap::new(),
            }),
        }
    }

    /// Store `payload` under a freshly allocated id. Any id already set on the
    /// payload is overwritten. Ids are monotonic and never reused.
    pub fn create(&self, mut payload: T) -> StoreResult<i64> {
        let mut table = self.inner.write();
        let id = table
            .next_id
            .ok_or_else(|| StoreError::Internal(String::from("id space exhausted")))?;
        table.next_id = id.checked_add(1);

        payload.assign_id(id);
        table.index_insert(payload.status(), id);
        table.records.insert(id, payload);
        Ok(id)
    }

    pub fn get(&self, id: i64) -> StoreResult<T> {
        self.inner
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// Live records whose current status equals `status`, ordered by id.
    pub fn by_status(&self, status: &str) -> Vec<T> {
        let table = self.inner.read();
        table
            .by_status
            .get(status)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| table.records.get(id))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    }

    /// Every live record, ordered by id.
    pub fn all(&self) -> Vec<T> {
        let table = self.inner.read();
        let mut records = table.records.values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.id());
        records
    }

    /// Apply `patch` to the record with `id` and return the result.
    ///
    /// The patch runs on a copy; the copy replaces the stored record and the
    /// status index is moved in the same critical section. The id cannot be
    /// changed by a patch. Blobs are untouched.
    pub fn update<F>(&self, id: i64, patch: F) -> StoreResult<T>
    where
        F: FnOnce(&mut T),
    {
        let mut table = self.inner.write();
        let current = table.records.get(&id).ok_or(StoreError::NotFound)?;

        let mut next = current.clone();
        patch(&mut next);
        next.assign_id(id);

        let old_status = current.status().to_string();
        if old_status != next.status() {
            table.index_remove(&old_status, id);
            table.index_insert(next.status(), id);
        }
        table.records.insert(id, next.clone());
        Ok(next)
    }

    /// Remove the record, its index entry and any blob attached to it.
    pub fn delete(&self, id: i64) -> StoreResult<T> {
        let mut table = self.inner.write();
        let removed = table.records.remove(&id).ok_or(StoreError::NotFound)?;
        table.index_remove(removed.status(), id);
        table.blobs.remove(&id);
        Ok(removed)
    }

    /// Associate opaque bytes with an existing record, replacing any previous blob.
    pub fn attach_blob(&self, id: i64, blob: Bytes) -> StoreResult<()> {
        let mut table = self.inner.write();
        if !table.records.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        table.blobs.insert(id, blob);
        Ok(())
    }

    pub fn blob(&self, id: i64) -> StoreResult<Option<Bytes>> {
        let table = self.inner.read();
        if !table.records.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        Ok(table.blobs.get(&id).cloned())
    }

    /// Number of live records per status, read straight off the index.
    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        self.inner
            .read()
            .by_status
            .iter()
            .map(|(status, ids)| (status.clone(), ids.len()))
            .collect()
    }

    pub fn count_with_status(&self, status: &str) -> usize {
        self.inner
            .read()
            .by_status
            .get(status)
            .map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;

    use bytes::Bytes;
    use proptest::prelude::*;

    use super::{EntityStore, Record};
    use crate::error::StoreError;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        id: i64,
        status: String,
        label: String,
    }

    impl Item {
        fn new(status: &str) -> Self {
            Self {
                id: 0,
                status: String::from(status),
                label: String::from("item"),
            }
        }
    }

    impl Record for Item {
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

    fn ids(items: &[Item]) -> Vec<i64> {
        items.iter().map(|item| item.id).collect()
    }

    #[test]
    fn create_assigns_sequential_ids_and_ignores_payload_id() {
        let store = EntityStore::new();
        let mut preset = Item::new("available");
        preset.id = 42;

        assert_eq!(store.create(preset).unwrap(), 1);
        assert_eq!(store.create(Item::new("available")).unwrap(), 2);
        assert!(matches!(store.get(42), Err(StoreError::NotFound)));
        assert_eq!(store.get(1).unwrap().id, 1);
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let store = EntityStore::new();
        let first = store.create(Item::new("available")).unwrap();
        store.delete(first).unwrap();

        let second = store.create(Item::new("available")).unwrap();
        assert_eq!(second, 2);
        assert!(matches!(store.get(first), Err(StoreError::NotFound)));
    }

    #[test]
    fn update_moves_record_between_status_buckets() {
        let store = EntityStore::new();
        let id = store.create(Item::new("available")).unwrap();

        let updated = store
            .update(id, |item| item.status = String::from("sold"))
            .unwrap();

        assert_eq!(updated.status, "sold");
        assert!(store.by_status("available").is_empty());
        assert_eq!(ids(&store.by_status("sold")), vec![id]);
        assert_eq!(store.count_with_status("available"), 0);
    }

    #[test]
    fn update_cannot_change_id() {
        let store = EntityStore::new();
        let id = store.create(Item::new("available")).unwrap();

        let updated = store.update(id, |item| item.id = 99).unwrap();

        assert_eq!(updated.id, id);
        assert!(store.get(99).is_err());
    }

    #[test]
    fn missing_ids_report_not_found() {
        let store: EntityStore<Item> = EntityStore::new();
        assert!(store.is_empty());

        assert_eq!(store.get(7), Err(StoreError::NotFound));
        assert_eq!(store.update(7, |_| {}), Err(StoreError::NotFound));
        assert_eq!(store.delete(7), Err(StoreError::NotFound));
        assert_eq!(
            store.attach_blob(7, Bytes::from_static(b"png")),
            Err(StoreError::NotFound)
        );
        assert_eq!(store.blob(7), Err(StoreError::NotFound));
    }

    #[test]
    fn blob_survives_updates_and_goes_with_delete() {
        let store = EntityStore::new();
        let id = store.create(Item::new("available")).unwrap();
        store.attach_blob(id, Bytes::from_static(b"png")).unwrap();

        store
            .update(id, |item| {
                item.status = String::from("pending");
                item.label = String::from("renamed");
            })
            .unwrap();
        assert_eq!(store.blob(id).unwrap(), Some(Bytes::from_static(b"png")));

        store.delete(id).unwrap();
        assert_eq!(store.blob(id), Err(StoreError::NotFound));
    }

    #[test]
    fn status_counts_follow_the_index() {
        let store = EntityStore::new();
        store.create(Item::new("placed")).unwrap();
        let second = store.create(Item::new("placed")).unwrap();
        store.create(Item::new("shipped")).unwrap();
        store.delete(second).unwrap();

        let counts = store.status_counts();
        assert_eq!(counts.get("placed"), Some(&1));
        assert_eq!(counts.get("shipped"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let store = EntityStore::new();

        let all_ids = std::thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..250)
                            .map(|_| store.create(Item::new("available")).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });

        let unique = all_ids.iter().copied().collect::<HashSet<_>>();
        assert_eq!(unique.len(), 2000);
        assert_eq!(store.count_with_status("available"), 2000);
    }

    #[test]
    fn concurrent_status_flips_keep_index_consistent() {
        let store = EntityStore::new();
        let created = (0..64)
            .map(|_| store.create(Item::new("available")).unwrap())
            .collect::<Vec<_>>();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let store = &store;
                let created = &created;
                scope.spawn(move || {
                    for round in 0..50 {
                        for id in created {
                            let status = if (round + worker) % 2 == 0 {
                                "sold"
                            } else {
                                "available"
                            };
                            store
                                .update(*id, |item| item.status = String::from(status))
                                .unwrap();
                        }
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..200 {
                    let total = store.status_counts().values().sum::<usize>();
                    assert_eq!(total, 64);
                }
            });
        });

        for item in store.all() {
            let bucket = ids(&store.by_status(&item.status));
            assert!(bucket.contains(&item.id));
        }
        assert_eq!(
            store.by_status("available").len() + store.by_status("sold").len(),
            64
        );
    }

    #[test]
    fn last_id_is_issued_before_exhaustion_is_reported() {
        let store = EntityStore::new();
        store.create(Item::new("available")).unwrap();
        store.inner.write().next_id = Some(i64::MAX);

        assert_eq!(store.create(Item::new("available")), Ok(i64::MAX));
        assert_eq!(store.get(i64::MAX).unwrap().id, i64::MAX);

        let exhausted = store.create(Item::new("sold"));
        assert!(matches!(exhausted, Err(StoreError::Internal(_))));
        assert_eq!(store.len(), 2);
        assert_eq!(store.count_with_status("sold"), 0);
        assert_eq!(store.inner.read().next_id, None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(u8),
        Update(usize, u8),
        Delete(usize),
    }

    fn status_name(raw: u8) -> &'static str {
        ["available", "pending", "sold"][usize::from(raw % 3)]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u8>().prop_map(Op::Create),
            (any::<usize>(), any::<u8>()).prop_map(|(idx, s)| Op::Update(idx, s)),
            any::<usize>().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn ids_stay_unique_and_index_matches_live_records(
            ops in prop::collection::vec(op_strategy(), 1..64)
        ) {
            let store = EntityStore::new();
            let mut issued = Vec::new();
            let mut live: Vec<i64> = Vec::new();

            for op in ops {
                match op {
                    Op::Create(s) => {
                        let id = store.create(Item::new(status_name(s))).unwrap();
                        prop_assert!(!issued.contains(&id));
                        issued.push(id);
                        live.push(id);
                    }
                    Op::Update(idx, s) if !live.is_empty() => {
                        let id = live[idx % live.len()];
                        store
                            .update(id, |item| item.status = String::from(status_name(s)))
                            .unwrap();
                    }
                    Op::Delete(idx) if !live.is_empty() => {
                        let id = live.remove(idx % live.len());
                        store.delete(id).unwrap();
                    }
                    _ => {}
                }
            }

            for raw in 0..3u8 {
                let status = status_name(raw);
                let mut expected = store
                    .all()
                    .into_iter()
                    .filter(|item| item.status == status)
                    .map(|item| item.id)
                    .collect::<Vec<_>>();
                expected.sort_unstable();
                prop_assert_eq!(ids(&store.by_status(status)), expected);
            }
            prop_assert_eq!(store.len(), live.len());
        }
    }
}
