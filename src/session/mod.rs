//! Recording sessions
//!
//! Per-device recording state machine and the control surface that toggles
//! it. Samples only reach storage while a device has an active session.

pub mod config;
pub mod control;
pub mod state;

pub use config::SessionConfig;
pub use control::{RecordingStatus, SessionManager, SharedSession};
pub use state::{SessionId, SessionState};
