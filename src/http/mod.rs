//! HTTP layer: Axum router, handlers, and responses.
//!
//! Exposes the `/user`, `/product`, and `/delivery` resource endpoints
//! plus `/health`, with cookie-session auth on the protected routes.

mod auth;
mod error;
mod handlers;
mod responses;
mod state;


pub use handlers::router;
pub use state::AppState;
