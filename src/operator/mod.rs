//! Operators: configured, reusable transforms, and pipelines composing them.

/// `Operator` and `Transform` traits plus bound operator values.
pub mod bound;
/// Ordered operator composition.
pub mod pipeline;

pub use bound::{BoundOperator, Operator, Transform};
pub use pipeline::Pipeline;
