use std::sync::Arc;

use crate::auth::AuthGate;
use crate::orders::OrderBook;
use crate::pets::PetCatalog;
use crate::users::UserDirectory;

/// Process-wide stores, built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub pets: Arc<PetCatalog>,
    pub orders: Arc<OrderBook>,
    pub users: Arc<UserDirectory>,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    pub fn new(gate: AuthGate, users: UserDirectory) -> Self {
        Self {
            pets: Arc::new(PetCatalog::new()),
            orders: Arc::new(OrderBook::new()),
            users: Arc::new(users),
            gate: Arc::new(gate),
        }
    }
}
