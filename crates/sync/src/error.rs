use patrol_rust_storage::StorageError;
use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl SyncError {
    pub fn new(message: String) -> Self {
        Self::GatewayError(message)
    }
}

/// 結果型
pub type Result<T> = std::result::Result<T, SyncError>;
