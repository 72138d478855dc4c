//! Types for visit capture and validation

use chrono::{DateTime, Utc};
use patrol_rust_storage::VisitRecord;
use serde::{Deserialize, Serialize};

/// QR validation request body
#[derive(Debug, Clone, Serialize)]
pub struct QrValidationRequest<'a> {
    pub qr_data: &'a str,
    pub user_id: i64,
}

/// Answer to a QR validation
///
/// The checkpoint fields are only present when `valid` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrValidation {
    pub valid: bool,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default, alias = "servicio_id")]
    pub service_id: Option<i64>,

    #[serde(default, alias = "servicio_nombre")]
    pub service_name: Option<String>,

    #[serde(default, alias = "punto_id")]
    pub checkpoint_id: Option<i64>,

    #[serde(default, alias = "punto_nombre")]
    pub checkpoint_name: Option<String>,

    #[serde(default, alias = "punto_lat")]
    pub checkpoint_lat: Option<f64>,

    #[serde(default, alias = "punto_lng")]
    pub checkpoint_lng: Option<f64>,
}

impl QrValidation {
    /// The scanned checkpoint, when the code was accepted and complete
    pub fn into_checkpoint(self) -> Option<ScannedCheckpoint> {
        if !self.valid {
            return None;
        }

        Some(ScannedCheckpoint {
            service_id: self.service_id?,
            service_name: self.service_name,
            checkpoint_id: self.checkpoint_id?,
            checkpoint_name: self.checkpoint_name,
            latitude: self.checkpoint_lat?,
            longitude: self.checkpoint_lng?,
        })
    }
}

/// Checkpoint identified by a valid QR code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedCheckpoint {
    pub service_id: i64,
    pub service_name: Option<String>,
    pub checkpoint_id: i64,
    pub checkpoint_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// GPS validation request body
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GpsValidationRequest {
    pub checkpoint_lat: f64,
    pub checkpoint_lng: f64,
    pub device_lat: f64,
    pub device_lng: f64,
}

/// Answer to a GPS proximity check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsValidation {
    pub valid: bool,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub distance_meters: Option<f64>,

    #[serde(default)]
    pub max_allowed_meters: Option<f64>,
}

/// A visit as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerVisit {
    pub id: i64,

    #[serde(flatten)]
    pub visit: VisitRecord,

    #[serde(default = "default_synced", alias = "sincronizado")]
    pub synced: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_synced() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use patrol_rust_storage::VisitType;
    use serde_json::json;

    #[test]
    fn test_valid_qr_yields_checkpoint() {
        let validation: QrValidation = serde_json::from_value(json!({
            "valid": true,
            "servicio_id": 3,
            "servicio_nombre": "Planta Norte",
            "punto_id": 17,
            "punto_nombre": "Gate A",
            "punto_lat": -33.45,
            "punto_lng": -70.66,
            "message": "ok"
        }))
        .unwrap();

        let checkpoint = validation.into_checkpoint().unwrap();
        assert_eq!(checkpoint.service_id, 3);
        assert_eq!(checkpoint.checkpoint_id, 17);
        assert_eq!(checkpoint.checkpoint_name.as_deref(), Some("Gate A"));
        assert_eq!(checkpoint.latitude, -33.45);
    }

    #[test]
    fn test_invalid_or_incomplete_qr_has_no_checkpoint() {
        let refused: QrValidation = serde_json::from_value(json!({
            "valid": false,
            "message": "QR point not found"
        }))
        .unwrap();
        assert_eq!(refused.message.as_deref(), Some("QR point not found"));
        assert!(refused.into_checkpoint().is_none());

        let incomplete: QrValidation = serde_json::from_value(json!({
            "valid": true,
            "service_id": 3,
            "checkpoint_id": 17
        }))
        .unwrap();
        assert!(incomplete.into_checkpoint().is_none());
    }

    #[test]
    fn test_server_visit_is_flat() {
        let visit: ServerVisit = serde_json::from_value(json!({
            "id": 501,
            "service_id": 3,
            "checkpoint_id": 17,
            "guard_id": 42,
            "visit_type": "observation",
            "latitude": -33.45,
            "longitude": -70.66,
            "occurred_at": "2024-05-01T10:00:00Z",
            "created_at": "2024-05-01T10:00:02Z"
        }))
        .unwrap();

        assert_eq!(visit.id, 501);
        assert_eq!(visit.visit.checkpoint_id, 17);
        assert!(visit.synced);
        assert!(visit.created_at.is_some());
    }

    #[test]
    fn test_server_visit_accepts_backend_field_names() {
        let visit: ServerVisit = serde_json::from_value(json!({
            "id": 502,
            "servicio_id": 3,
            "punto_qr_id": 17,
            "guardia_id": 42,
            "tipo": "incidencia",
            "observacion": null,
            "latitud": -33.45,
            "longitud": -70.66,
            "fecha_hora": "2024-05-01T10:00:00",
            "sincronizado": false,
            "created_at": "2024-05-01T10:00:02Z"
        }))
        .unwrap();

        assert_eq!(visit.visit.service_id, 3);
        assert_eq!(visit.visit.checkpoint_id, 17);
        assert_eq!(visit.visit.visit_type, VisitType::Incident);
        assert_eq!(visit.visit.note, None);
        assert!(!visit.synced);
    }
}
