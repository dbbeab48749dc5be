use serde::Serialize;
use thiserror::Error;

/// Every failure the asset store can report.
///
/// `Clone` so a single pinned result can be handed to any number of awaiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("Archive decode error: {0}")]
    Decode(String),
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Text decode error: {0}")]
    TextDecode(String),
    #[error("JSON parse error: {0}")]
    Parse(String),
    #[error("Asset not cached: {0}")]
    NotCached(String),
    #[error("Worker task failed: {0}")]
    Task(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<zip::result::ZipError> for AssetError {
    fn from(error: zip::result::ZipError) -> Self {
        AssetError::Decode(error.to_string())
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(error: serde_json::Error) -> Self {
        AssetError::Parse(error.to_string())
    }
}

impl From<tokio::task::JoinError> for AssetError {
    fn from(error: tokio::task::JoinError) -> Self {
        AssetError::Task(error.to_string())
    }
}

impl Serialize for AssetError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
#[path = "tests/errors_tests.rs"]
mod tests;
