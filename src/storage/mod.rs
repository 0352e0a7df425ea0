//! Session persistence
//!
//! Recordings are stored as one capped array document per session plus a
//! metadata record per session. Device registrations live alongside them.
//! The [`RecordStore`] trait is the seam to a real database; [`MemoryStore`]
//! keeps everything in process.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod record;
pub mod store;

pub use error::StorageError;
pub use gateway::{FlushOutcome, SessionData, StorageGateway, DEFAULT_STORAGE_CAP};
pub use memory::MemoryStore;
pub use record::{
    ArrayId, ArrayRecord, DevicePatch, DeviceRecord, RecordId, RecordPatch, SessionRecord,
};
pub use store::RecordStore;
