//! HTTP surface of the dashboard
//!
//! A JSON API consumed by the browser front end. Each signed-in operator
//! gets their own dashboard, dropped again when the session ends.

mod api;
mod auth;
mod server;

pub use api::AppState;
pub use auth::create_session_store;
pub use server::{start_web_server, WebServerConfig};
