use crate::asset::Asset;
use crate::foundation::error::MadamResult;

/// A configured transform over assets.
///
/// Implementations consume the input and return a new asset; they may return the input itself
/// when the transform is a no-op.
pub trait Operator: std::fmt::Debug + Send + Sync {
    fn apply(&self, asset: Asset) -> MadamResult<Asset>;
}

/// A codec exposing a family of transforms described by [`Transform::Op`].
pub trait Transform: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Transform kind plus its parameters.
    type Op: std::fmt::Debug + Clone + Send + Sync + 'static;

    fn transform(&self, asset: Asset, op: &Self::Op) -> MadamResult<Asset>;

    /// Bind `op` to this codec, producing a reusable operator.
    fn bind(&self, op: Self::Op) -> BoundOperator<Self> {
        BoundOperator {
            codec: self.clone(),
            op,
        }
    }
}

/// Transform kind plus bound configuration, applied by the codec that defines it.
#[derive(Clone, Debug)]
pub struct BoundOperator<T: Transform> {
    codec: T,
    op: T::Op,
}

impl<T: Transform> BoundOperator<T> {
    pub fn op(&self) -> &T::Op {
        &self.op
    }
}

impl<T: Transform> Operator for BoundOperator<T> {
    fn apply(&self, asset: Asset) -> MadamResult<Asset> {
        self.codec.transform(asset, &self.op)
    }
}
