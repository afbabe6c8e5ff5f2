use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::asset::value::{Metadata, MetadataValue, Namespaces};
use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;

/// Reserved namespace holding format-independent properties.
pub const MADAM_NAMESPACE: &str = "madam";
/// Key of the content type inside [`MADAM_NAMESPACE`].
pub const MIME_TYPE_KEY: &str = "mime_type";
/// Key of the tag set inside [`MADAM_NAMESPACE`].
pub const TAGS_KEY: &str = "tags";

static WILDCARD: MimeType = MimeType::any();
static NO_TAGS: BTreeSet<String> = BTreeSet::new();

/// One versioned unit of content: essence bytes plus namespaced metadata.
///
/// The essence is owned exclusively by the asset and never modified after construction.
/// Metadata is set through the consuming `with*` builders while the asset is being assembled;
/// transforms always produce a new `Asset`.
///
/// `madam.mime_type` (a [`MetadataValue::Mime`]) and `madam.tags` (a [`MetadataValue::Tags`])
/// are always present: builders ignore attempts to remove them or store another value type.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AssetParts")]
pub struct Asset {
    essence: Vec<u8>,
    metadata: Namespaces,
}

/// Unchecked serialized form of [`Asset`].
#[derive(Deserialize)]
struct AssetParts {
    essence: Vec<u8>,
    metadata: Namespaces,
}

impl TryFrom<AssetParts> for Asset {
    type Error = String;

    fn try_from(parts: AssetParts) -> Result<Self, String> {
        let madam = parts.metadata.get(MADAM_NAMESPACE);
        for key in [MIME_TYPE_KEY, TAGS_KEY] {
            match madam.and_then(|m| m.get(key)) {
                Some(value) if fits_reserved(key, value) => {}
                Some(value) => return Err(format!("madam.{key} has the wrong type: {value:?}")),
                None => return Err(format!("madam.{key} is missing")),
            }
        }
        Ok(Self {
            essence: parts.essence,
            metadata: parts.metadata,
        })
    }
}

/// Whether `value` may be stored under `key` of the `madam` namespace.
fn fits_reserved(key: &str, value: &MetadataValue) -> bool {
    match key {
        MIME_TYPE_KEY => matches!(value, MetadataValue::Mime(_)),
        TAGS_KEY => matches!(value, MetadataValue::Tags(_)),
        _ => true,
    }
}

impl Asset {
    /// Create an asset with the given essence and content type, and an empty tag set.
    pub fn new(essence: impl Into<Vec<u8>>, mime_type: MimeType) -> Self {
        let mut madam = Metadata::new();
        madam.insert(MIME_TYPE_KEY.to_string(), MetadataValue::Mime(mime_type));
        madam.insert(TAGS_KEY.to_string(), MetadataValue::Tags(BTreeSet::new()));

        let mut metadata = BTreeMap::new();
        metadata.insert(MADAM_NAMESPACE.to_string(), madam);
        Self {
            essence: essence.into(),
            metadata,
        }
    }

    /// Reassemble an asset from previously persisted parts.
    ///
    /// Fails with [`MadamError::Serde`] when the reserved `madam` entries are missing or mistyped.
    pub(crate) fn from_parts(essence: Vec<u8>, metadata: Namespaces) -> MadamResult<Self> {
        Self::try_from(AssetParts { essence, metadata }).map_err(MadamError::serde)
    }

    /// Create an asset by draining `reader`.
    pub fn from_reader(mut reader: impl Read, mime_type: MimeType) -> MadamResult<Self> {
        let mut essence = Vec::new();
        reader
            .read_to_end(&mut essence)
            .context("read asset essence")?;
        Ok(Self::new(essence, mime_type))
    }

    /// Set a key in the `madam` namespace.
    ///
    /// A value of the wrong type for `mime_type` or `tags` is ignored.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        let (key, value) = (key.into(), value.into());
        if fits_reserved(&key, &value) {
            self.madam_mut().insert(key, value);
        } else {
            warn!(key = %key, ?value, "ignored mistyped reserved madam entry");
        }
        self
    }

    /// Add a tag.
    pub fn with_tag(self, tag: impl Into<String>) -> Self {
        self.with_tags([tag])
    }

    /// Add several tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self
            .madam_mut()
            .entry(TAGS_KEY.to_string())
            .or_insert_with(|| MetadataValue::Tags(BTreeSet::new()));
        if let MetadataValue::Tags(set) = entry {
            set.extend(tags.into_iter().map(Into::into));
        } else {
            *entry = MetadataValue::Tags(tags.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Attach a namespace. Entries for `madam` are merged, any other namespace is replaced.
    pub fn with_namespace(mut self, name: impl Into<String>, entries: Metadata) -> Self {
        let name = name.into();
        if name == MADAM_NAMESPACE {
            for (key, value) in entries {
                self = self.with(key, value);
            }
        } else {
            self.metadata.insert(name, entries);
        }
        self
    }

    /// Attach every namespace in `namespaces`, skipping empty ones.
    pub fn with_namespaces(self, namespaces: Namespaces) -> Self {
        namespaces
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .fold(self, |asset, (name, entries)| {
                asset.with_namespace(name, entries)
            })
    }

    /// Remove `key` from `namespace`; the namespace disappears when it becomes empty.
    ///
    /// `madam.mime_type` and `madam.tags` cannot be removed.
    pub fn without(mut self, namespace: &str, key: &str) -> Self {
        if namespace == MADAM_NAMESPACE && matches!(key, MIME_TYPE_KEY | TAGS_KEY) {
            warn!(key, "reserved madam entry kept");
            return self;
        }
        if let Some(entries) = self.metadata.get_mut(namespace) {
            entries.remove(key);
            if entries.is_empty() && namespace != MADAM_NAMESPACE {
                self.metadata.remove(namespace);
            }
        }
        self
    }

    /// New asset with the same metadata and a different essence.
    pub fn with_essence(&self, essence: impl Into<Vec<u8>>) -> Self {
        Self {
            essence: essence.into(),
            metadata: self.metadata.clone(),
        }
    }

    /// New asset produced by a transform of `self`.
    ///
    /// Tags and non-`madam` namespaces carry over; format-dependent `madam` entries (such as
    /// dimensions or duration) do not and must be set by the caller.
    pub fn derive(&self, essence: impl Into<Vec<u8>>, mime_type: MimeType) -> Self {
        let carried: Namespaces = self
            .metadata
            .iter()
            .filter(|(name, _)| name.as_str() != MADAM_NAMESPACE)
            .map(|(name, entries)| (name.clone(), entries.clone()))
            .collect();
        Self::new(essence, mime_type)
            .with_tags(self.tags().iter().cloned())
            .with_namespaces(carried)
    }

    /// Fresh reader over the essence; every call starts at offset zero.
    pub fn essence(&self) -> Cursor<&[u8]> {
        Cursor::new(&self.essence)
    }

    pub fn essence_bytes(&self) -> &[u8] {
        &self.essence
    }

    pub fn into_essence(self) -> Vec<u8> {
        self.essence
    }

    /// All namespaces, including `madam`.
    pub fn metadata(&self) -> &Namespaces {
        &self.metadata
    }

    pub fn namespace(&self, name: &str) -> Option<&Metadata> {
        self.metadata.get(name)
    }

    /// Entry of the `madam` namespace.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(MADAM_NAMESPACE).and_then(|m| m.get(key))
    }

    pub fn mime_type(&self) -> &MimeType {
        self.get(MIME_TYPE_KEY)
            .and_then(MetadataValue::as_mime)
            .unwrap_or(&WILDCARD)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        self.get(TAGS_KEY)
            .and_then(MetadataValue::as_tags)
            .unwrap_or(&NO_TAGS)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(tag)
    }

    /// Width in pixels, for images and videos.
    pub fn width(&self) -> Option<u32> {
        self.dimension("width")
    }

    /// Height in pixels, for images and videos.
    pub fn height(&self) -> Option<u32> {
        self.dimension("height")
    }

    /// Duration in seconds, for audio and video.
    pub fn duration(&self) -> Option<f64> {
        self.get("duration").and_then(MetadataValue::as_float)
    }

    fn dimension(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(MetadataValue::as_int)
            .and_then(|v| u32::try_from(v).ok())
    }

    fn madam_mut(&mut self) -> &mut Metadata {
        self.metadata
            .entry(MADAM_NAMESPACE.to_string())
            .or_default()
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("essence_len", &self.essence.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/asset/model.rs"]
mod tests;
