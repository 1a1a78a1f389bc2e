//! Persisted document store: segment files plus a manifest naming the live ones.

pub mod document;
pub mod segment;

pub use document::DocumentStore;
pub use segment::{SegmentData, SegmentMeta, SegmentReader, SegmentWriter};
