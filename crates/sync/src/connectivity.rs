//! Network availability signal

use log::info;
use tokio::sync::watch;

/// Reports whether the network is currently usable
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity that never goes down
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}

/// Snapshot published to subscribers of a [`NetworkMonitor`]
///
/// `regained` counts offline→online transitions since the monitor was
/// created. A watch channel only keeps the latest value, so a quick
/// offline/online flap can look like "still online"; the counter still moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkState {
    pub online: bool,
    pub regained: u64,
}

/// Online/offline state fed by the platform's network events
#[derive(Debug)]
pub struct NetworkMonitor {
    state: watch::Sender<NetworkState>,
}

impl NetworkMonitor {
    /// 初期状態を指定してモニターを作成
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(NetworkState {
            online,
            regained: 0,
        });
        Self { state }
    }

    /// Record a network event; returns true when the state changed
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            if online {
                current.regained += 1;
            }
            current.online = online;
            true
        });
        if changed {
            info!(
                "Network state changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receiver woken on each state change
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state.subscribe()
    }

    /// Number of times the connection has come back
    pub fn regained_count(&self) -> u64 {
        self.state.borrow().regained
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.state.borrow().online
    }
}
