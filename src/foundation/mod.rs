//! Shared building blocks: errors, MIME types and configuration.

/// Codec configuration sections.
pub mod config;
/// Error taxonomy.
pub mod error;
/// MIME type value.
pub mod mime;
