//! Periodic and event-driven sync triggers

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::connectivity::NetworkState;
use crate::engine::SyncEngine;

/// Default period between background attempts
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Builder for the background trigger task
pub struct AutoSyncBuilder {
    engine: Arc<SyncEngine>,
    interval: Duration,
    network: Option<watch::Receiver<NetworkState>>,
}

impl AutoSyncBuilder {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            interval: DEFAULT_SYNC_INTERVAL,
            network: None,
        }
    }

    /// Set the period of the background timer
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Attempt a sync each time this receiver reports the network came back
    pub fn with_network_events(mut self, network: watch::Receiver<NetworkState>) -> Self {
        self.network = Some(network);
        self
    }

    /// Spawn the trigger task on the current tokio runtime
    ///
    /// The task keeps running when the handle is dropped; only
    /// [`SyncHandle::shutdown`] stops it.
    pub fn start(mut self) -> SyncHandle {
        // read the counter now so a regain right after start() is not lost
        let regained = self
            .network
            .as_mut()
            .map(|rx| rx.borrow_and_update().regained)
            .unwrap_or(0);
        let manual = Arc::new(Notify::new());
        let stop = Arc::new(Notify::new());

        info!(
            "Starting auto sync every {}s",
            self.interval.as_secs_f64()
        );

        let task = tokio::spawn(run(
            self.engine,
            self.interval,
            self.network,
            regained,
            manual.clone(),
            stop.clone(),
        ));

        SyncHandle { manual, stop, task }
    }
}

/// Handle to a running trigger task
#[derive(Debug)]
pub struct SyncHandle {
    manual: Arc<Notify>,
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Ask for an attempt right away ("sync now")
    pub fn trigger(&self) {
        self.manual.notify_one();
    }

    /// Stop the trigger task and wait for it to exit
    ///
    /// An attempt already in flight still runs to completion.
    pub async fn shutdown(self) {
        self.stop.notify_one();
        if let Err(e) = self.task.await {
            debug!("Auto sync task ended abnormally: {}", e);
        }
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    period: Duration,
    mut network: Option<watch::Receiver<NetworkState>>,
    mut regained: u64,
    manual: Arc<Notify>,
    stop: Arc<Notify>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.notified() => {
                info!("Auto sync stopped");
                break;
            }
            _ = ticker.tick() => {
                debug!("Periodic sync triggered");
                spawn_attempt(&engine);
            }
            _ = manual.notified() => {
                debug!("Manual sync triggered");
                spawn_attempt(&engine);
            }
            change = next_network_state(&mut network) => match change {
                Some(state) => {
                    if state.regained > regained {
                        info!("Connection regained, syncing...");
                        spawn_attempt(&engine);
                    }
                    regained = state.regained;
                }
                None => {
                    debug!("Network monitor dropped, relying on timer only");
                    network = None;
                }
            },
        }
    }
}

/// Attempts run in their own task so a slow batch never delays the next
/// trigger; overlapping triggers are turned away by the engine itself.
fn spawn_attempt(engine: &Arc<SyncEngine>) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let outcome = engine.sync_now().await;
        debug!("Sync attempt finished: {:?}", outcome);
    });
}

async fn next_network_state(
    network: &mut Option<watch::Receiver<NetworkState>>,
) -> Option<NetworkState> {
    match network {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(*rx.borrow_and_update()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
