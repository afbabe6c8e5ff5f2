/// Malformed FFmetadata text.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("ffmetadata error at line {line}: {message}")]
pub struct FfMetadataError {
    /// 1-based physical line where the offending logical line starts.
    pub line: usize,
    pub message: String,
}

impl FfMetadataError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ffmetadata/error.rs"]
mod tests;
