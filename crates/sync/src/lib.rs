//! Offline visit synchronization for patrol-rust
//!
//! This crate reconciles the offline queue kept by `patrol-rust-storage`
//! with the server: at most one batch in flight, gated on connectivity,
//! triggered by a timer, by the network coming back, or on demand.

mod connectivity;
mod engine;
mod error;
mod gateway;
mod scheduler;

pub use connectivity::{AlwaysOnline, Connectivity, NetworkMonitor, NetworkState};
pub use engine::{
    RemovalPolicy, SkipReason, SyncEngine, SyncOutcome, SyncReport, SyncState, SyncStatus,
};
pub use error::{Result, SyncError};
pub use gateway::{BatchGateway, SyncFailure, SyncResult};
pub use scheduler::{AutoSyncBuilder, SyncHandle, DEFAULT_SYNC_INTERVAL};

use std::sync::Arc;

impl SyncEngine {
    /// Configure background triggers for this engine
    pub fn auto_sync(self: &Arc<Self>) -> AutoSyncBuilder {
        AutoSyncBuilder::new(self.clone())
    }
}
