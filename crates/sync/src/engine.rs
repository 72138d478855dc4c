//! Offline queue reconciliation

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use patrol_rust_storage::{OfflineStore, QueuedVisit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::connectivity::Connectivity;
use crate::gateway::{BatchGateway, SyncFailure, SyncResult};

/// 同期状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Which queued entries leave the store after the server answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemovalPolicy {
    /// Remove only submitted entries whose local id the server accepted;
    /// refused entries stay queued for the next attempt.
    #[default]
    AcceptedOnly,
    /// Remove every submitted entry as soon as the server accepts any of
    /// them. Refused records are dropped without retry.
    AllSubmittedOnAnySuccess,
}

impl RemovalPolicy {
    fn select(&self, submitted: &[QueuedVisit], result: &SyncResult) -> Vec<String> {
        match self {
            Self::AcceptedOnly => {
                let accepted: HashSet<&str> = result.success.iter().map(String::as_str).collect();
                submitted
                    .iter()
                    .filter(|v| accepted.contains(v.local_id.as_str()))
                    .map(|v| v.local_id.clone())
                    .collect()
            }
            Self::AllSubmittedOnAnySuccess => {
                if result.has_accepted() {
                    submitted.iter().map(|v| v.local_id.clone()).collect()
                } else {
                    Vec::new()
                }
            }
        }
    }
}

/// Why an attempt did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySyncing,
    Offline,
}

/// Summary of a batch the server answered
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Entries sent in the batch
    pub submitted: usize,
    /// Local ids the server reported as accepted
    pub accepted: usize,
    /// Accepted ids that match no submitted entry
    pub unmatched: usize,
    /// Entries removed from the store
    pub removed: usize,
    /// Records the server refused
    pub rejected: Vec<SyncFailure>,
}

/// Result of one sync attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// Nothing queued; the gateway was not called
    Empty,
    Synced(SyncReport),
    /// Transport or server failure; the queue is unchanged
    Failed(String),
}

/// Observable engine status for history/diagnostic views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            last_attempt_at: None,
            last_success_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Resets the in-flight flag however the attempt ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Delivers queued visits to the server, one batch at a time
///
/// Build one per application and share it behind an `Arc` with whatever
/// schedules attempts.
pub struct SyncEngine {
    store: Arc<OfflineStore>,
    gateway: Arc<dyn BatchGateway>,
    connectivity: Arc<dyn Connectivity>,
    policy: RemovalPolicy,
    syncing: AtomicBool,
    status: RwLock<SyncStatus>,
}

impl SyncEngine {
    /// 新しい同期エンジンを作成
    pub fn new(
        store: Arc<OfflineStore>,
        gateway: Arc<dyn BatchGateway>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            store,
            gateway,
            connectivity,
            policy: RemovalPolicy::default(),
            syncing: AtomicBool::new(false),
            status: RwLock::new(SyncStatus::default()),
        }
    }

    /// Set the removal policy
    pub fn with_policy(mut self, policy: RemovalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RemovalPolicy {
        self.policy
    }

    /// Current state of the state machine
    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::SeqCst) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Snapshot of the engine status
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        status.state = self.state();
        status
    }

    /// Number of visits still waiting for the server
    pub async fn pending_count(&self) -> usize {
        self.store.pending_count().await
    }

    /// Run one sync attempt
    ///
    /// Never returns an error: failures are logged, recorded in the status
    /// and leave the queue untouched for the next trigger.
    pub async fn sync_now(&self) -> SyncOutcome {
        if self.syncing.load(Ordering::SeqCst) {
            debug!("Sync already in progress, skipping");
            return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
        }

        if !self.connectivity.is_online() {
            debug!("No network connection, skipping sync");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        if self
            .syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync already in progress, skipping");
            return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
        }
        let _in_flight = InFlight(&self.syncing);

        self.status.write().await.last_attempt_at = Some(Utc::now());

        let visits = self.store.list_queued_visits().await;
        if visits.is_empty() {
            debug!("No pending visits to sync");
            return SyncOutcome::Empty;
        }

        info!("Syncing {} visits...", visits.len());

        let result = match self.gateway.sync_batch(&visits).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Error syncing visits: {}", e);
                self.record_failure(e.to_string()).await;
                return SyncOutcome::Failed(e.to_string());
            }
        };

        let to_remove = self.policy.select(&visits, &result);
        let removed = match self.store.remove_visits(&to_remove).await {
            Ok(removed) => removed,
            Err(e) => {
                // accepted records stay queued and get resubmitted next time
                error!("Error removing synced visits: {}", e);
                self.record_failure(e.to_string()).await;
                return SyncOutcome::Failed(e.to_string());
            }
        };

        let submitted: HashSet<&str> = visits.iter().map(|v| v.local_id.as_str()).collect();
        let unmatched = result
            .success
            .iter()
            .filter(|id| !submitted.contains(id.as_str()))
            .count();
        if result.has_accepted() && removed == 0 {
            // the same batch goes out again on the next trigger
            warn!(
                "Server accepted {} ids but none match a queued visit ({:?} policy); \
                 the backend may be answering with server ids",
                result.success.len(),
                self.policy
            );
        }

        if !result.failed.is_empty() {
            warn!(
                "Server refused {} of {} visits",
                result.failed.len(),
                visits.len()
            );
        }
        info!(
            "Sync finished: {} accepted, {} removed from queue",
            result.success.len(),
            removed
        );

        let mut status = self.status.write().await;
        status.last_success_at = Some(Utc::now());
        status.consecutive_failures = 0;
        status.last_error = None;

        SyncOutcome::Synced(SyncReport {
            submitted: visits.len(),
            accepted: result.success.len(),
            unmatched,
            removed,
            rejected: result.failed,
        })
    }

    async fn record_failure(&self, message: String) {
        let mut status = self.status.write().await;
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);
        status.last_error = Some(message);
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
