use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreResult;
use crate::store::{EntityStore, Record};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub id: i64,
    pub pet_id: i64,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_date: Option<String>,
    pub status: String,
    pub complete: bool,
}

impl Record for Order {
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

#[derive(Debug, Default)]
pub struct OrderBook {
    store: EntityStore<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count live orders per status. An empty filter covers every status; a
    /// non-empty one restricts the result to that status (absent when zero).
    pub fn inventory(&self, status_filter: &str) -> BTreeMap<String, usize> {
        if status_filter.is_empty() {
            return self.store.status_counts();
        }

        let count = self.store.count_with_status(status_filter);
        let mut counts = BTreeMap::new();
        if count > 0 {
            counts.insert(status_filter.to_string(), count);
        }
        counts
    }

    pub fn place_order(&self, order: Order) -> StoreResult<i64> {
        let id = self.store.create(order)?;
        debug!(order_id = id, "order placed");
        Ok(id)
    }

    pub fn get_order(&self, id: i64) -> StoreResult<Order> {
        self.store.get(id)
    }

    pub fn delete_order(&self, id: i64) -> StoreResult<()> {
        self.store.delete(id)?;
        debug!(order_id = id, "order deleted");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
