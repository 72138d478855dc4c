//! Records persisted by the offline store

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of checkpoint visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitType {
    /// Routine round, nothing to report
    #[default]
    Normal,
    /// Something worth noting, not an incident
    #[serde(alias = "observacion")]
    Observation,
    /// Incident at the checkpoint
    #[serde(alias = "incidencia")]
    Incident,
}

/// A single checkpoint-visit event as captured on the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    #[serde(alias = "servicio_id")]
    pub service_id: i64,
    #[serde(alias = "punto_qr_id")]
    pub checkpoint_id: i64,
    #[serde(alias = "guardia_id")]
    pub guard_id: i64,
    #[serde(default, alias = "tipo")]
    pub visit_type: VisitType,
    #[serde(default, alias = "observacion", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(alias = "latitud")]
    pub latitude: f64,
    #[serde(alias = "longitud")]
    pub longitude: f64,
    /// Client clock at capture time
    #[serde(alias = "fecha_hora", deserialize_with = "utc_timestamp")]
    pub occurred_at: DateTime<Utc>,
}

/// RFC 3339 timestamp; one without an offset is read as UTC
fn utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl VisitRecord {
    /// Create a normal visit captured now
    pub fn new(
        service_id: i64,
        checkpoint_id: i64,
        guard_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            service_id,
            checkpoint_id,
            guard_id,
            visit_type: VisitType::Normal,
            note: None,
            latitude,
            longitude,
            occurred_at: Utc::now(),
        }
    }

    /// Set the visit type
    pub fn with_visit_type(mut self, visit_type: VisitType) -> Self {
        self.visit_type = visit_type;
        self
    }

    /// Attach a note; blank notes are dropped
    pub fn with_note(mut self, note: &str) -> Self {
        let trimmed = note.trim();
        self.note = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Override the capture timestamp
    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

/// A visit waiting in the offline queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedVisit {
    #[serde(flatten)]
    pub visit: VisitRecord,

    /// Client generated identifier, only meaningful on this device
    pub local_id: String,

    /// False until the server has durably accepted the record
    #[serde(default)]
    pub synced: bool,

    /// When the record was persisted locally
    pub queued_at: DateTime<Utc>,
}

impl QueuedVisit {
    pub(crate) fn new(visit: VisitRecord, local_id: String) -> Self {
        Self {
            visit,
            local_id,
            synced: false,
            queued_at: Utc::now(),
        }
    }
}

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "guardia")]
    Guard,
    Supervisor,
    #[serde(alias = "administrator", alias = "administrador")]
    Admin,
}

impl Role {
    /// Whether the role can see back-office screens
    pub fn is_back_office(&self) -> bool {
        matches!(self, Self::Supervisor | Self::Admin)
    }
}

/// Last known authenticated profile, kept for offline display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedUser {
    pub id: i64,
    pub email: String,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "rol")]
    pub role: Role,
    #[serde(default, alias = "servicio_id")]
    pub service_id: Option<i64>,
    #[serde(default, alias = "servicio_nombre")]
    pub service_name: Option<String>,
}
