use crate::asset::Asset;
use crate::foundation::error::{MadamError, MadamResult};
use crate::storage::{AssetStorage, Snapshot};

/// Insertion-ordered assets held in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemoryStorage {
    assets: Vec<Asset>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetStorage for InMemoryStorage {
    fn add(&mut self, asset: Asset) -> MadamResult<()> {
        self.assets.push(asset);
        Ok(())
    }

    fn remove(&mut self, asset: &Asset) -> MadamResult<()> {
        let index = self
            .assets
            .iter()
            .position(|a| a == asset)
            .ok_or_else(|| MadamError::not_found(format!("{asset:?}")))?;
        self.assets.remove(index);
        Ok(())
    }

    fn contains(&self, asset: &Asset) -> MadamResult<bool> {
        Ok(self.assets.contains(asset))
    }

    fn iter(&self) -> MadamResult<Snapshot> {
        Ok(self.assets.clone().into_iter())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/memory.rs"]
mod tests;
