use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::asset::{Asset, Namespaces};
use crate::foundation::error::{MadamError, MadamResult};
use crate::storage::{AssetStorage, Snapshot};

const ESSENCE_FILE: &str = "essence";
const METADATA_FILE: &str = "metadata.json";
/// Prefix of entries being written; never parsed as a key.
const STAGING_PREFIX: &str = ".staging-";

/// Assets persisted below a directory, one `<key>/` entry per asset.
///
/// Each entry holds the raw essence in `essence` and the metadata namespaces in `metadata.json`.
/// Keys are canonical decimal integers; a reopened store continues after the highest key on disk.
/// Entries are staged in a temporary directory and renamed into place once complete.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    next_key: u64,
}

impl FileStorage {
    /// Open the store at `path`, creating the directory when it does not exist.
    pub fn open(path: impl AsRef<Path>) -> MadamResult<Self> {
        let root = path.as_ref().to_path_buf();
        if root.exists() && !root.is_dir() {
            return Err(MadamError::AlreadyExists(root));
        }
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create storage directory '{}'", root.display()))?;

        let mut storage = Self { root, next_key: 0 };
        storage.next_key = storage.keys()?.last().map_or(0, |max| max + 1);
        debug!(root = %storage.root.display(), next_key = storage.next_key, "opened file storage");
        Ok(storage)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys present on disk in ascending order.
    pub fn keys(&self) -> MadamResult<Vec<u64>> {
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("list storage directory '{}'", self.root.display()))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.context("read storage entry")?;
            if let Some(key) = entry.file_name().to_str().and_then(parse_key)
                && entry.path().is_dir()
            {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    pub fn get(&self, key: u64) -> MadamResult<Asset> {
        let dir = self.entry(key);
        if !dir.is_dir() {
            return Err(MadamError::not_found(format!("storage key {key}")));
        }
        let essence = std::fs::read(dir.join(ESSENCE_FILE))
            .with_context(|| format!("read essence of entry {key}"))?;
        let json = std::fs::read(dir.join(METADATA_FILE))
            .with_context(|| format!("read metadata of entry {key}"))?;
        let metadata: Namespaces = serde_json::from_slice(&json)
            .map_err(|e| MadamError::serde(format!("metadata of entry {key}: {e}")))?;
        Asset::from_parts(essence, metadata)
    }

    /// Store `asset` and return its key.
    ///
    /// Metadata holding NaN or infinite floats is rejected, since JSON cannot represent it.
    pub fn insert(&mut self, asset: &Asset) -> MadamResult<u64> {
        if let Some((namespace, key)) = non_finite_entry(asset) {
            return Err(MadamError::serde(format!(
                "{namespace}.{key} holds a non-finite float"
            )));
        }
        let json = serde_json::to_vec_pretty(asset.metadata())
            .map_err(|e| MadamError::serde(format!("asset metadata: {e}")))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .with_context(|| format!("create staging entry in '{}'", self.root.display()))?;
        std::fs::write(staging.path().join(ESSENCE_FILE), asset.essence_bytes())
            .context("write staged essence")?;
        std::fs::write(staging.path().join(METADATA_FILE), json)
            .context("write staged metadata")?;

        // Keys taken by entries that appeared since opening are skipped.
        while self.entry(self.next_key).exists() {
            self.next_key += 1;
        }
        let key = self.next_key;
        let dir = self.entry(key);
        std::fs::rename(staging.path(), &dir)
            .with_context(|| format!("move storage entry into '{}'", dir.display()))?;
        self.next_key += 1;
        debug!(key, "stored asset");
        Ok(key)
    }

    fn entry(&self, key: u64) -> PathBuf {
        self.root.join(key.to_string())
    }

    fn find(&self, asset: &Asset) -> MadamResult<Option<u64>> {
        for key in self.keys()? {
            if self.get(key)? == *asset {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}

/// Key of a directory name in canonical decimal form, so that `get(key)` finds it again.
fn parse_key(name: &str) -> Option<u64> {
    name.parse::<u64>()
        .ok()
        .filter(|key| key.to_string() == name)
}

fn non_finite_entry(asset: &Asset) -> Option<(&str, &str)> {
    asset.metadata().iter().find_map(|(namespace, entries)| {
        entries
            .iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(key, _)| (namespace.as_str(), key.as_str()))
    })
}

impl AssetStorage for FileStorage {
    fn add(&mut self, asset: Asset) -> MadamResult<()> {
        self.insert(&asset).map(|_| ())
    }

    fn remove(&mut self, asset: &Asset) -> MadamResult<()> {
        let key = self
            .find(asset)?
            .ok_or_else(|| MadamError::not_found(format!("{asset:?}")))?;
        let dir = self.entry(key);
        std::fs::remove_dir_all(&dir)
            .with_context(|| format!("remove storage entry '{}'", dir.display()))?;
        debug!(key, "removed asset");
        Ok(())
    }

    fn contains(&self, asset: &Asset) -> MadamResult<bool> {
        Ok(self.find(asset)?.is_some())
    }

    fn iter(&self) -> MadamResult<Snapshot> {
        let assets = self
            .keys()?
            .into_iter()
            .map(|key| self.get(key))
            .collect::<MadamResult<Vec<_>>>()?;
        Ok(assets.into_iter())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/file.rs"]
mod tests;
