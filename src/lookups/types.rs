//! Types for checkpoint and alert lookups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A QR checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: i64,

    #[serde(alias = "nombre")]
    pub name: String,

    #[serde(default, alias = "descripcion")]
    pub description: Option<String>,

    #[serde(alias = "latitud")]
    pub latitude: f64,

    #[serde(alias = "longitud")]
    pub longitude: f64,

    #[serde(alias = "servicio_id")]
    pub service_id: i64,

    #[serde(default, alias = "servicio_nombre")]
    pub service_name: Option<String>,

    /// Payload encoded in the printed QR code
    #[serde(default, alias = "codigo_qr")]
    pub qr_code: Option<String>,

    /// Allowed distance for GPS validation, in meters
    #[serde(default, alias = "radio_validacion")]
    pub validation_radius: Option<u32>,

    #[serde(default = "default_active", alias = "activo")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Urgency of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    #[serde(alias = "alta")]
    High,
    #[serde(alias = "media")]
    Medium,
    #[serde(alias = "baja")]
    Low,
}

/// A checkpoint that needs attention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(alias = "punto_id")]
    pub checkpoint_id: i64,

    #[serde(alias = "punto_nombre")]
    pub checkpoint_name: String,

    /// None when the checkpoint was never visited
    #[serde(default, alias = "ultima_visita")]
    pub last_visit_at: Option<DateTime<Utc>>,

    #[serde(default, alias = "minutos_sin_visitar")]
    pub minutes_unvisited: Option<i64>,

    #[serde(alias = "tipo")]
    pub alert_type: String,

    #[serde(alias = "prioridad")]
    pub priority: AlertPriority,
}

/// Alert totals per priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCount {
    pub total: u32,

    #[serde(default, alias = "alta")]
    pub high: u32,

    #[serde(default, alias = "media")]
    pub medium: u32,

    #[serde(default, alias = "baja")]
    pub low: u32,
}
