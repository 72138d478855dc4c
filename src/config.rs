//! Configuration options for the patrol client

use patrol_rust_sync::{RemovalPolicy, DEFAULT_SYNC_INTERVAL};
use std::path::PathBuf;
use std::time::Duration;

/// Directory name used for the on-device store
pub const DEFAULT_STORE_NAME: &str = "RecorridasQR";

/// Configuration options for the patrol client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Period of the background sync timer
    pub sync_interval: Duration,

    /// Which queued visits leave the store after a batch sync
    pub removal_policy: RemovalPolicy,

    /// Value of the `X-Client-Info` header
    pub client_info: String,

    /// Directory of the file-backed store
    pub store_dir: PathBuf,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            sync_interval: DEFAULT_SYNC_INTERVAL,
            removal_policy: RemovalPolicy::AcceptedOnly,
            client_info: format!("patrol-rust/{}", env!("CARGO_PKG_VERSION")),
            store_dir: PathBuf::from(DEFAULT_STORE_NAME),
        }
    }
}

impl ClientOptions {
    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the background sync period
    pub fn with_sync_interval(mut self, value: Duration) -> Self {
        self.sync_interval = value;
        self
    }

    /// Set the removal policy used by the sync engine
    pub fn with_removal_policy(mut self, value: RemovalPolicy) -> Self {
        self.removal_policy = value;
        self
    }

    /// Set the `X-Client-Info` header value
    pub fn with_client_info(mut self, value: &str) -> Self {
        self.client_info = value.to_string();
        self
    }

    /// Set the directory of the file-backed store
    pub fn with_store_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.store_dir = value.into();
        self
    }
}
