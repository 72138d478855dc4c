//! Visit validation, submission and batch sync

mod types;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::auth::SessionToken;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::{Fetch, FetchBuilder};
use patrol_rust_storage::{QueuedVisit, VisitRecord};
use patrol_rust_sync::{BatchGateway, SyncError, SyncResult};

pub use types::*;

/// Client for the visit endpoints
#[derive(Debug, Clone)]
pub struct VisitsClient {
    /// The base URL of the backend
    url: String,

    /// HTTP client used for requests
    client: Client,

    /// Token shared with `Auth`
    token: SessionToken,

    /// Client options
    options: ClientOptions,
}

impl VisitsClient {
    /// Create a new VisitsClient
    pub(crate) fn new(url: &str, client: Client, token: SessionToken, options: ClientOptions) -> Self {
        Self {
            url: url.to_string(),
            client,
            token,
            options,
        }
    }

    fn get_url(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }

    fn with_headers<'a>(&self, builder: FetchBuilder<'a>) -> FetchBuilder<'a> {
        let token = self.token.get();
        builder
            .header("X-Client-Info", &self.options.client_info)
            .maybe_bearer_auth(token.as_deref())
    }

    /// Check a scanned QR payload
    ///
    /// A refused code is a normal answer with `valid == false`, not an error.
    pub async fn validate_qr(&self, qr_data: &str, user_id: i64) -> Result<QrValidation, Error> {
        let url = self.get_url("/qr/validate");

        let result = self
            .with_headers(Fetch::post(&self.client, &url))
            .json(&QrValidationRequest { qr_data, user_id })?
            .execute::<QrValidation>()
            .await?;

        Ok(result)
    }

    /// Check that the device is close enough to the checkpoint
    pub async fn validate_gps(
        &self,
        checkpoint_lat: f64,
        checkpoint_lng: f64,
        device_lat: f64,
        device_lng: f64,
    ) -> Result<GpsValidation, Error> {
        let url = self.get_url("/visits/validate-gps");
        let body = GpsValidationRequest {
            checkpoint_lat,
            checkpoint_lng,
            device_lat,
            device_lng,
        };

        let result = self
            .with_headers(Fetch::post(&self.client, &url))
            .json(&body)?
            .execute::<GpsValidation>()
            .await?;

        Ok(result)
    }

    /// Submit a single visit
    pub async fn submit_visit(&self, record: &VisitRecord) -> Result<ServerVisit, Error> {
        let url = self.get_url("/visits/");

        let result = self
            .with_headers(Fetch::post(&self.client, &url))
            .json(record)?
            .execute::<ServerVisit>()
            .await?;

        debug!("Visit stored by the server with id {}", result.id);
        Ok(result)
    }

    /// List visits known to the server, optionally for one service
    pub async fn list_visits(&self, service_id: Option<i64>) -> Result<Vec<ServerVisit>, Error> {
        let url = self.get_url("/visits/");

        let mut builder = self.with_headers(Fetch::get(&self.client, &url));
        if let Some(service_id) = service_id {
            builder = builder.query("service_id", &service_id.to_string());
        }

        builder.execute::<Vec<ServerVisit>>().await
    }

    /// Submit queued visits in one request
    ///
    /// The answer may accept some records and refuse others. No retries.
    pub async fn sync_batch(&self, visits: &[QueuedVisit]) -> Result<SyncResult, Error> {
        let url = self.get_url("/visits/sync");

        let result = self
            .with_headers(Fetch::post(&self.client, &url))
            .json(visits)?
            .execute::<SyncResult>()
            .await?;

        debug!(
            "Batch of {} answered: {} accepted, {} refused",
            visits.len(),
            result.success.len(),
            result.failed.len()
        );
        Ok(result)
    }
}

#[async_trait]
impl BatchGateway for VisitsClient {
    async fn sync_batch(&self, visits: &[QueuedVisit]) -> patrol_rust_sync::Result<SyncResult> {
        VisitsClient::sync_batch(self, visits)
            .await
            .map_err(|e| SyncError::new(e.to_string()))
    }
}
