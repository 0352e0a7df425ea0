//! Device sample ingestion
//!
//! Parses device payloads, fans them out to viewers and feeds recording
//! buffers.

pub mod pipeline;
pub mod sample;

pub use pipeline::{IngestPipeline, SampleOutcome};
pub use sample::Sample;
