//! Asset collections: an in-memory list and a directory-backed store.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use crate::asset::{Asset, MetadataValue};
use crate::foundation::error::MadamResult;

/// Snapshot iterator returned by [`AssetStorage::iter`].
pub type Snapshot = std::vec::IntoIter<Asset>;

/// Collection of assets compared by structural equality.
pub trait AssetStorage {
    fn add(&mut self, asset: Asset) -> MadamResult<()>;

    /// Remove the first asset equal to `asset`; fails with `NotFound` when there is none.
    fn remove(&mut self, asset: &Asset) -> MadamResult<()>;

    fn contains(&self, asset: &Asset) -> MadamResult<bool>;

    /// Copy of the current contents; later additions and removals do not affect it.
    fn iter(&self) -> MadamResult<Snapshot>;

    /// Assets carrying every tag in `tags`.
    fn filter_by_tags(&self, tags: &[&str]) -> MadamResult<Vec<Asset>> {
        Ok(self
            .iter()?
            .filter(|asset| tags.iter().all(|tag| asset.has_tag(tag)))
            .collect())
    }

    /// Assets whose `madam` namespace maps `key` to `value`.
    fn filter(&self, key: &str, value: &MetadataValue) -> MadamResult<Vec<Asset>> {
        Ok(self
            .iter()?
            .filter(|asset| asset.get(key) == Some(value))
            .collect())
    }
}
