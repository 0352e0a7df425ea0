//! Telemetry relay
//!
//! Relays numeric samples from one producing device connection to any number
//! of viewer connections, and records the stream in fixed-size batches while
//! an operator has recording enabled.
//!
//! # Components
//!
//! - [`registry`]: live device and viewer connections, fan-out
//! - [`ingest`]: per-message sample parsing and routing
//! - [`session`]: recording state machine and control surface
//! - [`storage`]: capped array persistence behind the [`storage::RecordStore`] trait
//! - [`server`]: axum websocket and HTTP endpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use telemetry_relay::auth::StaticTokenAuthorizer;
//! use telemetry_relay::server::{RelayServer, ServerConfig};
//! use telemetry_relay::storage::MemoryStore;
//!
//! # async fn run() -> telemetry_relay::Result<()> {
//! let config = ServerConfig::default().flush_threshold(250);
//! let server = RelayServer::new(
//!     config,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticTokenAuthorizer::new().operator("secret")),
//! );
//! server.run().await
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod ingest;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;
pub mod storage;

pub use error::{Error, Result};
pub use ingest::{IngestPipeline, Sample};
pub use registry::{ConnectionRegistry, DeviceId, RegistryConfig};
pub use server::{RelayServer, ServerConfig};
pub use session::{RecordingStatus, SessionConfig, SessionManager};
pub use stats::RelayStats;
pub use storage::{MemoryStore, RecordStore, StorageGateway};
