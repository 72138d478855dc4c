//! Remote side of a batch synchronization

use async_trait::async_trait;
use patrol_rust_storage::QueuedVisit;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Submits the offline queue to the server in one call
///
/// Implementations must not retry; retry policy belongs to the engine.
#[async_trait]
pub trait BatchGateway: Send + Sync {
    async fn sync_batch(&self, visits: &[QueuedVisit]) -> Result<SyncResult>;
}

/// Server answer to a batch submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Local ids the server durably accepted
    #[serde(default, deserialize_with = "ids_as_strings")]
    pub success: Vec<String>,

    /// Records the server refused
    #[serde(default, alias = "failures")]
    pub failed: Vec<SyncFailure>,
}

impl SyncResult {
    /// Result accepting every given visit
    pub fn accept_all(visits: &[QueuedVisit]) -> Self {
        Self {
            success: visits.iter().map(|v| v.local_id.clone()).collect(),
            failed: Vec::new(),
        }
    }

    /// Whether the server reported at least one accepted record
    pub fn has_accepted(&self) -> bool {
        !self.success.is_empty()
    }
}

/// One refused record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,

    pub error: String,

    /// Echo of the submitted record, when the server sends it back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit: Option<Value>,
}

impl SyncFailure {
    /// Local id of the refused record, from the failure or its echoed visit
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref().or_else(|| {
            self.visit
                .as_ref()
                .and_then(|visit| visit.get("local_id"))
                .and_then(Value::as_str)
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

fn ids_as_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<RawId>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|id| match id {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        })
        .collect())
}
