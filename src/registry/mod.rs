//! Codec traits and the registry that dispatches reads and writes to them.

/// `Processor` and `MetadataProcessor` traits.
pub mod processor;
/// Ordered codec registry with the read and write pipelines.
#[allow(clippy::module_inception)]
pub mod registry;

pub use processor::{MetadataProcessor, Processor, ReadSeek};
pub use registry::Registry;
