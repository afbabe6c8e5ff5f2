use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const DELIMITER: char = '/';
const WILDCARD: &str = "*";

/// Errors produced while constructing a [`MimeType`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MimeTypeError {
    /// The combined `type/subtype` string already carries a subtype.
    #[error("MIME type '{0}' already contains a subtype")]
    SubtypeConflict(String),

    /// More than one `/` in a combined string.
    #[error("MIME type '{0}' contains more than one delimiter")]
    TooManyDelimiters(String),

    /// A `/` inside the subtype component.
    #[error("MIME subtype '{0}' must not contain a delimiter")]
    DelimiterInSubtype(String),
}

/// Normalized, wildcard-aware content type identifier.
///
/// Both components are stored lower-cased; `None` represents the `*` wildcard. The derived
/// ordering compares the type first and the subtype second, with the wildcard sorting lowest,
/// which is exactly the ordering of the canonical `type/subtype` form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MimeType {
    type_: Option<String>,
    subtype: Option<String>,
}

impl MimeType {
    /// Build a MIME type from a media type and an optional subtype.
    ///
    /// `mediatype` may be a bare type (`"image"`), a wildcard (`"*"`), or a combined
    /// `"type/subtype"` string, in which case `subtype` must be absent.
    pub fn new(mediatype: Option<&str>, subtype: Option<&str>) -> Result<Self, MimeTypeError> {
        let subtype = subtype.filter(|s| !s.is_empty());
        let (mediatype, subtype) = match mediatype {
            Some(combined) if combined.contains(DELIMITER) => {
                if subtype.is_some() {
                    return Err(MimeTypeError::SubtypeConflict(combined.to_string()));
                }
                let mut parts = combined.split(DELIMITER);
                let mediatype = parts.next();
                let subtype = parts.next();
                if parts.next().is_some() {
                    return Err(MimeTypeError::TooManyDelimiters(combined.to_string()));
                }
                (mediatype, subtype)
            }
            other => (other, subtype),
        };
        if let Some(s) = subtype
            && s.contains(DELIMITER)
        {
            return Err(MimeTypeError::DelimiterInSubtype(s.to_string()));
        }

        Ok(Self {
            type_: normalize(mediatype),
            subtype: normalize(subtype),
        })
    }

    /// Parse a combined `type/subtype` string.
    pub fn parse(s: &str) -> Result<Self, MimeTypeError> {
        Self::new(Some(s), None)
    }

    /// The full wildcard `*/*`.
    pub const fn any() -> Self {
        Self {
            type_: None,
            subtype: None,
        }
    }

    /// Build from a compile-time `type/subtype` literal owned by a codec table.
    pub(crate) fn known(literal: &'static str) -> Self {
        let (mediatype, subtype) = literal.split_once(DELIMITER).unwrap_or((literal, ""));
        Self {
            type_: normalize(Some(mediatype)),
            subtype: normalize(Some(subtype)),
        }
    }

    /// Media type component, `None` for the wildcard.
    pub fn type_(&self) -> Option<&str> {
        self.type_.as_deref()
    }

    /// Subtype component, `None` for the wildcard.
    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Whether either component is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.type_.is_none() || self.subtype.is_none()
    }

    /// Wildcard-aware match: `image/*` matches `image/png`, `*/*` matches everything.
    pub fn matches(&self, other: &MimeType) -> bool {
        fn component(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        component(&self.type_, &other.type_) && component(&self.subtype, &other.subtype)
    }
}

fn normalize(component: Option<&str>) -> Option<String> {
    match component {
        None => None,
        Some(s) if s.is_empty() || s == WILDCARD => None,
        Some(s) => Some(s.to_ascii_lowercase()),
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}",
            self.type_.as_deref().unwrap_or(WILDCARD),
            self.subtype.as_deref().unwrap_or(WILDCARD)
        )
    }
}

impl FromStr for MimeType {
    type Err = MimeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MimeType {
    type Error = MimeTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for MimeType {
    type Error = MimeTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MimeType> for String {
    fn from(value: MimeType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/mime.rs"]
mod tests;
