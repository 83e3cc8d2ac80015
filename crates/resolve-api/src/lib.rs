pub mod admin;
pub mod auth;
pub mod complaints;
pub mod error;
pub mod middleware;
pub mod notifications;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use routes::router;
