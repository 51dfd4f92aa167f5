//! Idempotent attendance marking.
//!
//! Read-then-conditionally-write: an existing marker short-circuits with its
//! original time and nothing is written. The check and the write are not
//! atomic; two devices scanning the same card at the same instant both write,
//! and because markers are keyed by person id the later write wins.

use chrono::Utc;
use common::protocol::{ScanResponse, ScanStatus};
use common::records::{AttendanceMarker, Person, ScanEntry};
use common::ServiceError;
use tracing::{info, warn};

use super::AttendanceService;
use crate::store::photo_key;

/// Result of a mark-attendance call.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// A new marker was written.
    Recorded {
        person: Person,
        marker: AttendanceMarker,
    },
    /// A marker already existed; nothing changed.
    AlreadyRecorded {
        person: Person,
        marker: AttendanceMarker,
    },
}

impl MarkOutcome {
    pub fn person(&self) -> &Person {
        match self {
            MarkOutcome::Recorded { person, .. } | MarkOutcome::AlreadyRecorded { person, .. } => {
                person
            }
        }
    }

    pub fn marker(&self) -> &AttendanceMarker {
        match self {
            MarkOutcome::Recorded { marker, .. } | MarkOutcome::AlreadyRecorded { marker, .. } => {
                marker
            }
        }
    }

    pub fn status(&self) -> ScanStatus {
        match self {
            MarkOutcome::Recorded { .. } => ScanStatus::Recorded,
            MarkOutcome::AlreadyRecorded { .. } => ScanStatus::AlreadyRecorded,
        }
    }

    /// Status line shown to the lecturer.
    pub fn message(&self) -> String {
        match self {
            MarkOutcome::Recorded { person, marker } => {
                format!("Attendance recorded for {} at {}", person.name, marker.time)
            }
            MarkOutcome::AlreadyRecorded { person, marker } => {
                format!("{} already recorded at {}", person.name, marker.time)
            }
        }
    }
}

impl From<&MarkOutcome> for ScanResponse {
    fn from(outcome: &MarkOutcome) -> Self {
        Self {
            status: outcome.status(),
            message: outcome.message(),
            person_name: outcome.person().name.clone(),
            time: outcome.marker().time.clone(),
        }
    }
}

impl AttendanceService {
    /// Record `identifier` as present in `session_id`, at most once.
    ///
    /// The scan-history append that follows a new marker is best-effort: its
    /// failure is logged and does not fail or roll back the marker.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for an unknown session,
    /// [`ServiceError::UnknownIdentifier`] when no person matches, and
    /// [`ServiceError::Backend`] when the marker read or write fails.
    pub async fn mark_attendance(
        &self,
        session_id: &str,
        identifier: &str,
    ) -> Result<MarkOutcome, ServiceError> {
        self.connectivity.ensure_online()?;

        if self.stores.sessions.session(session_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("session {session_id}")));
        }
        let person = self.find_person(identifier).await?;

        if let Some(marker) = self.stores.markers.marker(session_id, &person.id).await? {
            info!(session_id, person_id = %person.id, "attendance already recorded");
            return Ok(MarkOutcome::AlreadyRecorded { person, marker });
        }

        let time = self.format_time(Utc::now());
        let marker = self
            .stores
            .markers
            .set_marker(session_id, &person.id, &time)
            .await?;
        info!(session_id, person_id = %person.id, time = %marker.time, "attendance recorded");

        let entry = ScanEntry {
            name: person.name.clone(),
            identifier: identifier.to_owned(),
            photo_url: self.scan_photo(&person).await,
            time: marker.time.clone(),
            captured_at: marker.captured_at,
        };
        if let Err(e) = self.stores.scans.append_scan(session_id, &entry).await {
            warn!(session_id, error = %e, "scan history append failed; marker kept");
        }

        Ok(MarkOutcome::Recorded { person, marker })
    }

    /// Recent scan history for a session, newest first.
    pub async fn recent_scans(&self, session_id: &str) -> Result<Vec<ScanEntry>, ServiceError> {
        self.connectivity.ensure_online()?;
        Ok(self
            .stores
            .scans
            .recent_scans(session_id, self.settings.recent_scan_limit)
            .await?)
    }

    /// Fresh photo URL for the scan entry. A URL recorded on the person may
    /// have expired, so the blob store is always asked.
    async fn scan_photo(&self, person: &Person) -> Option<String> {
        let key = photo_key(&self.settings.photo_category, &person.id);
        match self.stores.photos.photo_url(&key).await {
            Ok(url) => url,
            Err(e) => {
                warn!(person_id = %person.id, error = %e, "photo lookup failed");
                None
            }
        }
    }
}
