//! Request and response types exchanged with the tracker's HTTP API.
//!
//! All bodies are JSON with camelCase field names, matching the field naming
//! of the backend documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::records::{clock, AttendanceType, ScanEntry, Session};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Request body for `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub date: NaiveDate,
    pub subject: String,
    pub lecturer: String,
    #[serde(default)]
    pub sections: Vec<String>,
    pub attendance_type: AttendanceType,
    #[serde(with = "clock")]
    pub start_time: chrono::NaiveTime,
    #[serde(with = "clock")]
    pub end_time: chrono::NaiveTime,
    /// Use a backend-assigned id instead of `<date>_<subject>_<type>`.
    #[serde(default)]
    pub auto_id: bool,
}

/// A session as returned by the API, with its derived duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub duration_hours: f64,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        let duration_hours = session.duration_hours();
        Self {
            session,
            duration_hours,
        }
    }
}

/// Query string for `GET /sessions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionQuery {
    pub subject: Option<String>,
    pub lecturer: Option<String>,
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Request body for `POST /sessions/:id/scan`.
///
/// `payload` is whatever the reader produced: an encoded wire string, a bare
/// identifier, or the tag's hardware serial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub payload: String,
}

/// Whether a scan created a marker or found an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Recorded,
    AlreadyRecorded,
}

/// Response body for `POST /sessions/:id/scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: ScanStatus,
    pub message: String,
    pub person_name: String,
    pub time: String,
}

/// Response body for `GET /sessions/:id/scans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentScansResponse {
    pub scans: Vec<ScanEntry>,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Request body for `POST /cards/encode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeCardRequest {
    pub identifier: String,
}

/// Response body for `POST /cards/encode`: the text to write to the tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeCardResponse {
    pub wire: String,
}

/// Request body for `POST /cards/decode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeCardRequest {
    pub payload: String,
}

/// Response body for `POST /cards/decode`.
///
/// `decrypted` is `false` when the payload could not be decoded and was
/// taken as the identifier verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeCardResponse {
    pub identifier: String,
    pub decrypted: bool,
}

// ---------------------------------------------------------------------------
// Attendance history
// ---------------------------------------------------------------------------

/// Query string for `GET /people/:identifier/attendance`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    pub subject: Option<String>,
}

/// Presence for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPresence {
    pub session_id: String,
    pub date: NaiveDate,
    pub attendance_type: AttendanceType,
    pub present: bool,
}

/// Reconciled attendance for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject: String,
    pub present: usize,
    pub total: usize,
    pub percent: u32,
    pub perfect: bool,
    pub sessions: Vec<SessionPresence>,
}

/// Response body for `GET /people/:identifier/attendance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub identifier: String,
    pub name: String,
    pub subjects: Vec<SubjectAttendance>,
}

/// Request body for `POST /people/:identifier/warnings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRequest {
    pub subject: String,
    pub date: NaiveDate,
}

/// Response body for `POST /people/:identifier/warnings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningResponse {
    pub warnings: Vec<String>,
}

/// Response body for `GET /people/:identifier/photo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoUrlResponse {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"unknown_identifier"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::ServiceError> for ErrorResponse {
    fn from(err: &crate::ServiceError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the last backend probe succeeded.
    pub online: bool,
    /// Wire format used for newly written cards.
    pub card_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_session_request_accepts_short_times() {
        let req: CreateSessionRequest = serde_json::from_value(json!({
            "date": "2026-10-18",
            "subject": "CS101",
            "lecturer": "Dr. Lim",
            "attendanceType": "Lecture",
            "startTime": "08:00",
            "endTime": "10:00",
        }))
        .unwrap();
        assert!(req.sections.is_empty());
        assert!(!req.auto_id);
        assert_eq!(req.attendance_type, AttendanceType::Lecture);
    }

    #[test]
    fn scan_status_is_snake_case() {
        let v = serde_json::to_value(ScanStatus::AlreadyRecorded).unwrap();
        assert_eq!(v, "already_recorded");
    }

    #[test]
    fn error_response_from_service_error() {
        let e = ErrorResponse::from(&crate::ServiceError::UnknownIdentifier("X1".into()));
        assert_eq!(e.code, "unknown_identifier");
        assert!(e.message.contains("X1"));
    }
}
