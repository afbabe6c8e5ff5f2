use tracing::debug_span;

use crate::asset::Asset;
use crate::foundation::error::MadamResult;
use crate::operator::bound::Operator;

/// Ordered sequence of operators; insertion order is execution order.
#[derive(Debug, Default)]
pub struct Pipeline {
    operators: Vec<Box<dyn Operator>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operator.
    pub fn add(&mut self, operator: impl Operator + 'static) -> &mut Self {
        self.operators.push(Box::new(operator));
        self
    }

    /// Builder form of [`Pipeline::add`].
    pub fn with(mut self, operator: impl Operator + 'static) -> Self {
        self.add(operator);
        self
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Lazily run every operator over each input, yielding one result per input in input order.
    ///
    /// A failing operator stops the chain for that asset only.
    pub fn process<'a, I>(&'a self, assets: I) -> impl Iterator<Item = MadamResult<Asset>> + 'a
    where
        I: IntoIterator<Item = Asset>,
        I::IntoIter: 'a,
    {
        assets
            .into_iter()
            .enumerate()
            .map(move |(index, asset)| {
                let _span = debug_span!("pipeline", index, operators = self.len()).entered();
                self.apply(asset)
            })
    }
}

impl Operator for Pipeline {
    fn apply(&self, asset: Asset) -> MadamResult<Asset> {
        self.operators
            .iter()
            .try_fold(asset, |asset, operator| operator.apply(asset))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operator/pipeline.rs"]
mod tests;
