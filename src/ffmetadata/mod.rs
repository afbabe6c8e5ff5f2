//! FFmetadata text format: the `;FFMETADATA1` tag exchange format understood by ffmpeg.
//!
//! ```text
//! ;FFMETADATA1
//! title=Big Buck Bunny
//! artist=Blender Foundation
//! [CHAPTER]
//! title=Intro
//! ```

pub mod error;
mod parser;
mod writer;

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ffmetadata::error::FfMetadataError;

/// Name of the implicit section holding entries before the first `[SECTION]` header.
pub const GLOBAL_SECTION: &str = "GLOBAL";

/// Unescaped key/value entries of one section.
pub type FfSection = BTreeMap<String, String>;

/// Parsed FFmetadata document: named sections in document order.
///
/// The global section always comes first. A section header that appears more than once continues
/// the section opened by its first occurrence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FfMetadata {
    sections: Vec<(String, FfSection)>,
}

impl Default for FfMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl FfMetadata {
    /// Document with an empty global section.
    pub fn new() -> Self {
        Self {
            sections: vec![(GLOBAL_SECTION.to_string(), FfSection::new())],
        }
    }

    /// Parse FFmetadata text.
    pub fn parse(src: &str) -> Result<Self, FfMetadataError> {
        parser::parse_ffmetadata(src)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&FfSection> {
        self.position(name).map(|i| &self.sections[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FfSection> {
        self.position(name).map(|i| &mut self.sections[i].1)
    }

    /// Entries of the global section, if it has not been removed.
    pub fn global(&self) -> Option<&FfSection> {
        self.get(GLOBAL_SECTION)
    }

    /// Replace (or append) a whole section, returning the previous entries.
    pub fn insert(&mut self, name: impl Into<String>, section: FfSection) -> Option<FfSection> {
        let name = name.into();
        match self.position(&name) {
            Some(i) => Some(std::mem::replace(&mut self.sections[i].1, section)),
            None => {
                self.sections.push((name, section));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FfSection> {
        self.position(name).map(|i| self.sections.remove(i).1)
    }

    /// Section names in document order.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FfSection)> {
        self.sections
            .iter()
            .map(|(name, section)| (name.as_str(), section))
    }

    /// Number of sections, including the global one.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub(crate) fn ensure_section(&mut self, name: &str) -> &mut FfSection {
        let i = match self.position(name) {
            Some(i) => i,
            None => {
                self.sections.push((name.to_string(), FfSection::new()));
                self.sections.len() - 1
            }
        };
        &mut self.sections[i].1
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|(n, _)| n == name)
    }
}

impl FromStr for FfMetadata {
    type Err = FfMetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ffmetadata/model.rs"]
mod tests;
