//! Patrol Rust Client Library
//!
//! Offline-first visit capture for checkpoint patrols: guards scan a QR
//! code, the device position is checked against the checkpoint, and the
//! visit is submitted or kept in a durable queue until the background sync
//! delivers it.

pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod fetch;
pub mod lookups;
pub mod visits;

use log::warn;
use reqwest::Client;
use std::sync::Arc;

use crate::auth::{Auth, SessionToken};
use crate::capture::CaptureFlow;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::lookups::LookupsClient;
use crate::visits::{ServerVisit, VisitsClient};

pub use patrol_rust_storage as storage;
pub use patrol_rust_sync as sync;

use patrol_rust_storage::{OfflineStore, QueuedVisit};
use patrol_rust_sync::{Connectivity, NetworkMonitor, SyncEngine, SyncHandle, SyncOutcome};

/// The main entry point for the patrol client
pub struct Patrol {
    /// The base URL of the backend
    pub url: String,
    /// HTTP client used for requests
    pub http_client: Client,
    /// Auth client for login and session handling
    pub auth: Auth,
    /// Client options
    pub options: ClientOptions,
    store: Arc<OfflineStore>,
    token: SessionToken,
    network: Arc<NetworkMonitor>,
    engine: Arc<SyncEngine>,
}

impl Patrol {
    /// Create a client backed by an in-memory store
    ///
    /// # Example
    ///
    /// ```
    /// use patrol_rust::Patrol;
    ///
    /// let patrol = Patrol::new("https://patrol.example.com/api");
    /// ```
    pub fn new(url: &str) -> Self {
        Self::new_with_options(url, ClientOptions::default())
    }

    /// Create a client with custom options, backed by an in-memory store
    ///
    /// # Example
    ///
    /// ```
    /// use patrol_rust::{Patrol, config::ClientOptions};
    /// use std::time::Duration;
    ///
    /// let options = ClientOptions::default().with_sync_interval(Duration::from_secs(60));
    /// let patrol = Patrol::new_with_options("https://patrol.example.com/api", options);
    /// ```
    pub fn new_with_options(url: &str, options: ClientOptions) -> Self {
        Self::with_store(url, options, Arc::new(OfflineStore::in_memory()))
    }

    /// Open a client on the file-backed store in `options.store_dir`
    ///
    /// A session persisted by an earlier run is restored unless its token
    /// has expired.
    pub async fn open(url: &str, options: ClientOptions) -> Result<Self, Error> {
        let store = OfflineStore::open(&options.store_dir).await?;
        let patrol = Self::with_store(url, options, Arc::new(store));
        patrol.auth.restore_session().await;
        Ok(patrol)
    }

    /// Create a client on an existing store
    pub fn with_store(url: &str, options: ClientOptions, store: Arc<OfflineStore>) -> Self {
        let url = url.trim_end_matches('/').to_string();

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        });

        let token = SessionToken::new();
        let network = Arc::new(NetworkMonitor::default());

        let auth = Auth::new(
            &url,
            http_client.clone(),
            token.clone(),
            store.clone(),
            options.clone(),
        );

        let gateway = VisitsClient::new(&url, http_client.clone(), token.clone(), options.clone());
        let engine = Arc::new(
            SyncEngine::new(store.clone(), Arc::new(gateway), network.clone())
                .with_policy(options.removal_policy),
        );

        Self {
            url,
            http_client,
            auth,
            options,
            store,
            token,
            network,
            engine,
        }
    }

    /// Get a reference to the auth client
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Client for visit validation and submission
    pub fn visits(&self) -> VisitsClient {
        VisitsClient::new(
            &self.url,
            self.http_client.clone(),
            self.token.clone(),
            self.options.clone(),
        )
    }

    /// Client for checkpoint and alert lookups
    pub fn lookups(&self) -> LookupsClient {
        LookupsClient::new(
            &self.url,
            self.http_client.clone(),
            self.token.clone(),
            self.options.clone(),
        )
    }

    /// Capture flow that falls back to the offline queue
    pub fn capture(&self) -> CaptureFlow {
        CaptureFlow::new(self.visits(), self.store.clone(), self.network.clone())
    }

    /// The durable local store
    pub fn store(&self) -> &Arc<OfflineStore> {
        &self.store
    }

    /// Connectivity reported by the host; feed it with `set_online`
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Run one sync attempt now
    pub async fn sync_now(&self) -> SyncOutcome {
        self.engine.sync_now().await
    }

    /// Start the background sync triggers
    ///
    /// Must be called inside a tokio runtime.
    pub fn start_auto_sync(&self) -> SyncHandle {
        self.engine
            .auto_sync()
            .with_interval(self.options.sync_interval)
            .with_network_events(self.network.subscribe())
            .start()
    }

    /// Visits for the history view: server visits plus the pending queue
    ///
    /// A failed server call is logged and leaves `server` empty; pending
    /// visits are always listed.
    pub async fn history(&self, service_id: Option<i64>) -> VisitHistory {
        let pending = self.store.list_queued_visits().await;

        let server = if self.network.is_online() {
            match self.visits().list_visits(service_id).await {
                Ok(visits) => visits,
                Err(e) => {
                    warn!("Could not load visits from the server: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        VisitHistory { server, pending }
    }
}

/// Visits shown in the history view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitHistory {
    /// Visits the server already has
    pub server: Vec<ServerVisit>,
    /// Visits still waiting in the offline queue
    pub pending: Vec<QueuedVisit>,
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::capture::{CaptureOutcome, VisitDraft};
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::{Patrol, VisitHistory};
    pub use patrol_rust_storage::{CachedUser, QueuedVisit, Role, VisitRecord, VisitType};
    pub use patrol_rust_sync::{RemovalPolicy, SyncOutcome, SyncStatus};
}
