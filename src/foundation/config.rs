use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::foundation::error::{MadamError, MadamResult};
use crate::foundation::mime::MimeType;

/// Codec configuration.
///
/// A JSON object of sections. Section names are full MIME types (`"image/jpeg"`), bare media
/// types (`"image"`) or tool names (`"ffmpeg"`):
///
/// ```json
/// {
///   "image": { "quality": 90 },
///   "image/png": { "compression": "best" },
///   "video/x-matroska": { "video": { "codec": "libx264", "bitrate": 1200 } },
///   "ffmpeg": { "threads": 2 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    sections: BTreeMap<String, Map<String, Value>>,
}

impl Config {
    /// Empty configuration; every codec falls back to its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from a JSON string.
    pub fn from_json_str(s: &str) -> MadamResult<Self> {
        serde_json::from_str(s).map_err(|e| MadamError::config(format!("invalid config: {e}")))
    }

    /// Read and parse a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> MadamResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config from '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Return a copy with `section.key` set to `value`.
    pub fn with(mut self, section: &str, key: &str, value: impl Into<Value>) -> Self {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    /// Raw section by exact name.
    pub fn raw_section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.sections.get(name)
    }

    /// Effective section for `mime`: the media-type section overlaid by the full MIME section.
    pub fn section(&self, mime: &MimeType) -> Map<String, Value> {
        let mut merged = Map::new();
        if let Some(media) = mime.type_()
            && let Some(section) = self.sections.get(media)
        {
            merge_into(&mut merged, section);
        }
        if !mime.is_wildcard()
            && let Some(section) = self.sections.get(&mime.to_string())
        {
            merge_into(&mut merged, section);
        }
        merged
    }

    /// Deserialize the section named `name` into typed options.
    pub fn options<T: DeserializeOwned + Default>(&self, name: &str) -> MadamResult<T> {
        match self.sections.get(name) {
            Some(section) => decode_section(name, section.clone()),
            None => Ok(T::default()),
        }
    }

    /// Deserialize the effective section for `mime` into typed options.
    pub fn options_for<T: DeserializeOwned>(&self, mime: &MimeType) -> MadamResult<T> {
        decode_section(&mime.to_string(), self.section(mime))
    }
}

fn decode_section<T: DeserializeOwned>(name: &str, section: Map<String, Value>) -> MadamResult<T> {
    serde_json::from_value(Value::Object(section))
        .map_err(|e| MadamError::config(format!("section '{name}': {e}")))
}

fn merge_into(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(overlay)) => {
                merge_into(existing, overlay)
            }
            _ => {
                dst.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
