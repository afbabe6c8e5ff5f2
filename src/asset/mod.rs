//! The asset value and its typed metadata.

/// Immutable essence plus namespaced metadata.
pub mod model;
/// Metadata values and namespace maps.
pub mod value;

pub use model::{Asset, MADAM_NAMESPACE, MIME_TYPE_KEY, TAGS_KEY};
pub use value::{Metadata, MetadataValue, Namespaces};
