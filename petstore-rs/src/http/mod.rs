//! HTTP layer: Axum router, handlers, and request/response shapes.
//!
//! Exposes the pet, store, and user endpoints. Every resource route is
//! guarded by the shared-token gate; `/health` is open.

mod auth;
mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;
