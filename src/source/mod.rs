//! Event source: samples plus the dictionaries needed to resolve them.
//!
//! This module handles:
//! - The sample/dictionary model consumed by the converter
//! - A JSON-backed in-memory recording

pub mod recording;
pub mod schema;

pub use recording::{Recording, RecordingSummary};
pub use schema::{ClassRef, EventKind, MethodRef, RawFrame, RecordingClock, Sample, SampleKind};

/// Provider of samples and lookup tables.
///
/// Every lookup may miss; callers must degrade gracefully.
pub trait EventSource {
    /// Samples in arrival order
    fn samples(&self) -> &[Sample];

    fn clock(&self) -> RecordingClock;

    /// Frames of a raw stack trace, leaf-first
    fn stack_trace(&self, id: u64) -> Option<&[RawFrame]>;

    fn method(&self, id: u64) -> Option<&MethodRef>;

    fn class(&self, id: u64) -> Option<&ClassRef>;

    fn symbol(&self, id: u64) -> Option<&[u8]>;
}
