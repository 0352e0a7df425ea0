//! Relay server
//!
//! axum router exposing the device and viewer websocket streams plus the
//! recording control, device registration and query endpoints.

pub mod config;
pub mod extract;
pub mod http;
pub mod listener;
pub mod ws;

pub use config::ServerConfig;
pub use extract::{Caller, Operator};
pub use http::ApiError;
pub use listener::{router, RelayServer, RelayState};
