//! Connection registry for device/viewer routing
//!
//! The registry tracks the single producing connection of each device and the
//! bounded set of viewers watching it. Fan-out is message passing: every
//! connection owns a bounded `tokio::sync::mpsc` queue drained by its own
//! socket task, and the registry only ever `try_send`s into those queues.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ConnectionRegistry>
//!                 ┌──────────────────────────────────┐
//!                 │ devices: HashMap<DeviceId,       │
//!                 │   DeviceEntry { connection } >   │
//!                 │ viewers: HashMap<DeviceId,       │
//!                 │   ViewerSet { Vec<Handle> } >    │
//!                 └───────────────┬──────────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!     [Device]                [Viewer]                [Viewer]
//!   on_sample()             rx.recv()               rx.recv()
//!         │                       │                       │
//!         └──► registry.broadcast() ──► try_send ──► WebSocket
//! ```
//!
//! # Slow Viewers
//!
//! A full viewer queue drops the frame for that viewer only. A closed queue
//! is skipped. Neither stalls the device's ingest loop.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{DeviceEntry, RegistryStats, ViewerSet};
pub use error::RegistryError;
pub use frame::{BroadcastOutcome, CloseReason, ConnectionHandle, ConnectionId, DeviceId, Outbound};
pub use store::ConnectionRegistry;
