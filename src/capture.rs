//! Visit capture: validate the scan and the location, then submit or queue

use log::{info, warn};
use patrol_rust_storage::{OfflineStore, QueuedVisit, VisitRecord, VisitType};
use patrol_rust_sync::Connectivity;
use std::sync::Arc;

use crate::error::Error;
use crate::visits::{GpsValidation, ScannedCheckpoint, ServerVisit, VisitsClient};

/// What happened to a captured visit
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The server stored the visit
    Submitted(ServerVisit),
    /// The visit waits in the offline queue
    SavedOffline(QueuedVisit),
}

impl CaptureOutcome {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::SavedOffline(_))
    }
}

/// Everything the guard entered for one visit
#[derive(Debug, Clone, PartialEq)]
pub struct VisitDraft {
    pub qr_data: String,
    pub guard_id: i64,
    pub device_lat: f64,
    pub device_lng: f64,
    pub visit_type: VisitType,
    pub note: Option<String>,
}

impl VisitDraft {
    pub fn new(qr_data: &str, guard_id: i64, device_lat: f64, device_lng: f64) -> Self {
        Self {
            qr_data: qr_data.to_string(),
            guard_id,
            device_lat,
            device_lng,
            visit_type: VisitType::Normal,
            note: None,
        }
    }

    pub fn with_visit_type(mut self, visit_type: VisitType) -> Self {
        self.visit_type = visit_type;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// Capture flow for one device
pub struct CaptureFlow {
    visits: VisitsClient,
    store: Arc<OfflineStore>,
    connectivity: Arc<dyn Connectivity>,
}

impl CaptureFlow {
    pub(crate) fn new(
        visits: VisitsClient,
        store: Arc<OfflineStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            visits,
            store,
            connectivity,
        }
    }

    /// Validate a scanned QR code
    ///
    /// A refused or incomplete answer becomes `Error::Validation` carrying
    /// the server's message.
    pub async fn validate_scan(&self, qr_data: &str, user_id: i64) -> Result<ScannedCheckpoint, Error> {
        let validation = self.visits.validate_qr(qr_data, user_id).await?;
        let message = validation
            .message
            .clone()
            .unwrap_or_else(|| "Invalid QR code".to_string());

        validation
            .into_checkpoint()
            .ok_or_else(|| Error::validation(message))
    }

    /// Check the device position against the scanned checkpoint
    pub async fn check_location(
        &self,
        checkpoint: &ScannedCheckpoint,
        device_lat: f64,
        device_lng: f64,
    ) -> Result<GpsValidation, Error> {
        let validation = self
            .visits
            .validate_gps(checkpoint.latitude, checkpoint.longitude, device_lat, device_lng)
            .await?;

        if !validation.valid {
            let message = match (&validation.message, validation.distance_meters) {
                (Some(message), _) => message.clone(),
                (None, Some(distance)) => format!("Too far from the checkpoint ({:.0} m)", distance),
                (None, None) => "Location outside the allowed radius".to_string(),
            };
            return Err(Error::validation(message));
        }

        Ok(validation)
    }

    /// Submit a visit, falling back to the offline queue
    ///
    /// The visit is queued when the device is offline or the submission
    /// fails with a transient error. Any other error is returned and nothing
    /// is queued.
    pub async fn submit(&self, record: VisitRecord) -> Result<CaptureOutcome, Error> {
        if !self.connectivity.is_online() {
            return self.save_offline(record).await;
        }

        match self.visits.submit_visit(&record).await {
            Ok(visit) => Ok(CaptureOutcome::Submitted(visit)),
            Err(e) if e.is_transient() => {
                warn!("Submitting visit failed, saving offline: {}", e);
                self.save_offline(record).await
            }
            Err(e) => Err(e),
        }
    }

    /// Run the whole flow for one draft: scan, location, submission
    pub async fn record_visit(&self, draft: VisitDraft) -> Result<CaptureOutcome, Error> {
        let checkpoint = self.validate_scan(&draft.qr_data, draft.guard_id).await?;
        self.check_location(&checkpoint, draft.device_lat, draft.device_lng)
            .await?;

        let mut record = VisitRecord::new(
            checkpoint.service_id,
            checkpoint.checkpoint_id,
            draft.guard_id,
            draft.device_lat,
            draft.device_lng,
        )
        .with_visit_type(draft.visit_type);
        if let Some(note) = &draft.note {
            record = record.with_note(note);
        }

        self.submit(record).await
    }

    async fn save_offline(&self, record: VisitRecord) -> Result<CaptureOutcome, Error> {
        let queued = self.store.append_visit(record).await?;
        info!("Visit saved offline as {}", queued.local_id);
        Ok(CaptureOutcome::SavedOffline(queued))
    }
}
