//! Read-only lookups: checkpoints and unvisited-checkpoint alerts

mod types;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::auth::SessionToken;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::Fetch;

pub use types::*;

/// Client for checkpoint and alert lookups
#[derive(Debug, Clone)]
pub struct LookupsClient {
    url: String,
    client: Client,
    token: SessionToken,
    options: ClientOptions,
}

impl LookupsClient {
    pub(crate) fn new(url: &str, client: Client, token: SessionToken, options: ClientOptions) -> Self {
        Self {
            url: url.to_string(),
            client,
            token,
            options,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, service_id: Option<i64>) -> Result<T, Error> {
        let url = format!("{}{}", self.url, path);
        let token = self.token.get();

        let mut builder = Fetch::get(&self.client, &url)
            .header("X-Client-Info", &self.options.client_info)
            .maybe_bearer_auth(token.as_deref());
        if let Some(service_id) = service_id {
            builder = builder.query("service_id", &service_id.to_string());
        }

        builder.execute::<T>().await
    }

    /// List checkpoints, optionally for one service
    pub async fn checkpoints(&self, service_id: Option<i64>) -> Result<Vec<Checkpoint>, Error> {
        self.get("/checkpoints/", service_id).await
    }

    /// Get one checkpoint
    pub async fn checkpoint(&self, id: i64) -> Result<Checkpoint, Error> {
        self.get(&format!("/checkpoints/{}", id), None).await
    }

    /// Checkpoints that went unvisited for too long
    pub async fn alerts(&self, service_id: Option<i64>) -> Result<Vec<Alert>, Error> {
        self.get("/alerts/", service_id).await
    }

    /// Alert totals per priority
    pub async fn alerts_count(&self, service_id: Option<i64>) -> Result<AlertCount, Error> {
        self.get("/alerts/count", service_id).await
    }
}
