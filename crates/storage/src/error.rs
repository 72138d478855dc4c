use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    pub fn new(message: String) -> Self {
        Self::BackendError(message)
    }

    /// Whether the stored bytes were present but could not be decoded.
    pub fn is_corrupt_data(&self) -> bool {
        matches!(self, Self::SerializationError(_))
    }
}

/// 結果型
pub type Result<T> = std::result::Result<T, StorageError>;
