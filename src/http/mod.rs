//! Axum HTTP server handlers and middleware for the login, token, client and user endpoints.

pub mod context;
mod handler_clients;
mod handler_login;
mod handler_token;
mod handler_users;
pub mod middleware_auth;
pub mod server;
mod utils_oauth;

pub use context::AppState;
pub use server::build_router;
