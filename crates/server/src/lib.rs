// Pulse HTTP server
//
// Exposes the notification queue over HTTP: authenticated short and long
// polling for users and admins, internal publish routes and health probes.

pub mod api;
pub mod auth;
pub mod config;
pub mod maintenance;
pub mod telemetry;

pub use api::{build_app, AppState};
