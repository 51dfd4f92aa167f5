//! Typed records persisted in the hosted backend.
//!
//! The backend stores schema-less documents. Each record type has a single
//! `from_document` boundary that applies every default once and fails with a
//! [`DecodeError`] when a required field is absent or malformed; business
//! logic only ever sees the typed records.

use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// A raw backend document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Date format used in documents and deterministic session ids.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time-of-day format used for session start/end times.
pub const CLOCK_FORMAT: &str = "%H:%M";

/// Errors raised at the document boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A required field is absent or empty.
    #[error("{record} {id}: missing field `{field}`")]
    MissingField {
        record: &'static str,
        id: String,
        field: String,
    },

    /// A field is present but has the wrong shape.
    #[error("{record} {id}: invalid field `{field}`: {reason}")]
    InvalidField {
        record: &'static str,
        id: String,
        field: String,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Kind of class meeting a session records attendance for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceType {
    Lecture,
    Laboratory,
    Program,
    Exam,
}

impl AttendanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceType::Lecture => "Lecture",
            AttendanceType::Laboratory => "Laboratory",
            AttendanceType::Program => "Program",
            AttendanceType::Exam => "Exam",
        }
    }
}

impl fmt::Display for AttendanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lecture" => Ok(AttendanceType::Lecture),
            "laboratory" | "lab" => Ok(AttendanceType::Laboratory),
            "program" => Ok(AttendanceType::Program),
            "exam" => Ok(AttendanceType::Exam),
            other => Err(format!("unknown attendance type `{other}`")),
        }
    }
}

/// Role of a person record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Lecturer,
}

// ---------------------------------------------------------------------------
// Person
// ---------------------------------------------------------------------------

/// A student or lecturer, keyed by the backend-assigned document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub name: String,
    /// Matriculation, IC, or staff number depending on deployment.
    pub identifier: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub photo_url: Option<String>,
    /// Free-text warnings appended over time; never deduplicated.
    pub warnings: Vec<String>,
}

impl Person {
    /// Decode a person document. `identifier_field` names the document field
    /// holding the deployment's identifier.
    pub fn from_document(
        id: &str,
        doc: &Document,
        identifier_field: &str,
    ) -> Result<Self, DecodeError> {
        const RECORD: &str = "person";

        let role = match optional_str(doc, "role") {
            None => Role::default(),
            Some(r) if r.eq_ignore_ascii_case("lecturer") => Role::Lecturer,
            Some(r) if r.eq_ignore_ascii_case("student") => Role::Student,
            Some(r) => {
                return Err(invalid(RECORD, id, "role", format!("unknown role `{r}`")));
            }
        };

        Ok(Self {
            id: id.to_owned(),
            name: optional_str(doc, "name")
                .unwrap_or("Unknown")
                .to_owned(),
            identifier: optional_str(doc, identifier_field).map(str::to_owned),
            email: optional_str(doc, "email").map(str::to_owned),
            role,
            photo_url: optional_str(doc, "photoUrl").map(str::to_owned),
            warnings: string_list(doc, RECORD, id, "warnings")?,
        })
    }

    pub fn to_document(&self, identifier_field: &str) -> Document {
        let mut doc = object(json!({
            "name": self.name,
            "role": match self.role {
                Role::Student => "student",
                Role::Lecturer => "lecturer",
            },
            "warnings": self.warnings,
        }));
        if let Some(identifier) = &self.identifier {
            doc.insert(identifier_field.to_owned(), json!(identifier));
        }
        if let Some(email) = &self.email {
            doc.insert("email".into(), json!(email));
        }
        if let Some(url) = &self.photo_url {
            doc.insert("photoUrl".into(), json!(url));
        }
        doc
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One scheduled, attendance-tracked class meeting.
///
/// Immutable once created apart from additive merges into `sections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub date: NaiveDate,
    pub subject: String,
    pub lecturer: String,
    pub sections: Vec<String>,
    pub attendance_type: AttendanceType,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
}

impl Session {
    /// `<date>_<subject>_<attendanceType>`, e.g. `2026-10-18_CS101_Lecture`.
    pub fn deterministic_id(date: NaiveDate, subject: &str, kind: AttendanceType) -> String {
        format!("{}_{}_{}", date.format(DATE_FORMAT), subject, kind)
    }

    /// Length of the session in hours, never negative.
    pub fn duration_hours(&self) -> f64 {
        let minutes = (self.end_time - self.start_time).num_minutes().max(0);
        minutes as f64 / 60.0
    }

    pub fn from_document(id: &str, doc: &Document) -> Result<Self, DecodeError> {
        const RECORD: &str = "session";

        let date = required_str(doc, RECORD, id, "date")?;
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|e| invalid(RECORD, id, "date", e.to_string()))?;

        let attendance_type = match optional_str(doc, "attendanceType") {
            None => AttendanceType::Lecture,
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid(RECORD, id, "attendanceType", e))?,
        };

        let start_time = parse_clock(required_str(doc, RECORD, id, "startTime")?)
            .map_err(|e| invalid(RECORD, id, "startTime", e.to_string()))?;
        let end_time = parse_clock(required_str(doc, RECORD, id, "endTime")?)
            .map_err(|e| invalid(RECORD, id, "endTime", e.to_string()))?;

        Ok(Self {
            id: id.to_owned(),
            date,
            subject: required_str(doc, RECORD, id, "subject")?.to_owned(),
            lecturer: optional_str(doc, "lecturer").unwrap_or_default().to_owned(),
            sections: string_list(doc, RECORD, id, "sections")?,
            attendance_type,
            start_time,
            end_time,
        })
    }

    pub fn to_document(&self) -> Document {
        object(json!({
            "date": self.date.format(DATE_FORMAT).to_string(),
            "subject": self.subject,
            "lecturer": self.lecturer,
            "sections": self.sections,
            "attendanceType": self.attendance_type.as_str(),
            "startTime": self.start_time.format(CLOCK_FORMAT).to_string(),
            "endTime": self.end_time.format(CLOCK_FORMAT).to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Attendance marker
// ---------------------------------------------------------------------------

/// Presence record for one (session, person) pair. Its existence is the only
/// signal of presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMarker {
    pub session_id: String,
    pub person_id: String,
    pub captured_at: DateTime<Utc>,
    /// Formatted time of day shown back to the lecturer.
    pub time: String,
}

impl AttendanceMarker {
    pub fn from_document(
        session_id: &str,
        person_id: &str,
        doc: &Document,
    ) -> Result<Self, DecodeError> {
        const RECORD: &str = "marker";
        let id = format!("{session_id}/{person_id}");

        Ok(Self {
            session_id: session_id.to_owned(),
            person_id: person_id.to_owned(),
            captured_at: timestamp(doc, RECORD, &id)?,
            time: optional_str(doc, "time").unwrap_or_default().to_owned(),
        })
    }

    pub fn to_document(&self) -> Document {
        object(json!({
            "timestamp": self.captured_at.to_rfc3339(),
            "time": self.time,
        }))
    }
}

// ---------------------------------------------------------------------------
// Scan history
// ---------------------------------------------------------------------------

/// Append-only recent-activity entry. Not authoritative for presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanEntry {
    pub name: String,
    pub identifier: String,
    pub photo_url: Option<String>,
    pub time: String,
    pub captured_at: DateTime<Utc>,
}

impl ScanEntry {
    pub fn from_document(id: &str, doc: &Document) -> Result<Self, DecodeError> {
        const RECORD: &str = "scan";

        Ok(Self {
            name: optional_str(doc, "name").unwrap_or("Unknown").to_owned(),
            identifier: required_str(doc, RECORD, id, "identifier")?.to_owned(),
            photo_url: optional_str(doc, "photoUrl").map(str::to_owned),
            time: optional_str(doc, "time").unwrap_or_default().to_owned(),
            captured_at: timestamp(doc, RECORD, id)?,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = object(json!({
            "name": self.name,
            "identifier": self.identifier,
            "time": self.time,
            "timestamp": self.captured_at.to_rfc3339(),
        }));
        if let Some(url) = &self.photo_url {
            doc.insert("photoUrl".into(), json!(url));
        }
        doc
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Parse `HH:MM`, also accepting `HH:MM:SS`. Seconds are dropped: session
/// times are stored at minute precision.
pub fn parse_clock(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, CLOCK_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(whole_minutes)
}

/// `time` with seconds and sub-seconds cleared.
pub fn whole_minutes(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// Serde adapter writing times as `HH:MM`.
pub mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&time.format(super::CLOCK_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_clock(&raw).map_err(serde::de::Error::custom)
    }
}

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn optional_str<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn required_str<'a>(
    doc: &'a Document,
    record: &'static str,
    id: &str,
    field: &str,
) -> Result<&'a str, DecodeError> {
    optional_str(doc, field).ok_or_else(|| DecodeError::MissingField {
        record,
        id: id.to_owned(),
        field: field.to_owned(),
    })
}

fn string_list(
    doc: &Document,
    record: &'static str,
    id: &str,
    field: &str,
) -> Result<Vec<String>, DecodeError> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| invalid(record, id, field, "expected a list of strings"))
            })
            .collect(),
        Some(_) => Err(invalid(record, id, field, "expected a list of strings")),
    }
}

fn timestamp(doc: &Document, record: &'static str, id: &str) -> Result<DateTime<Utc>, DecodeError> {
    let raw = required_str(doc, record, id, "timestamp")?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| invalid(record, id, "timestamp", e.to_string()))
}

fn invalid(record: &'static str, id: &str, field: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidField {
        record,
        id: id.to_owned(),
        field: field.to_owned(),
        reason: reason.into(),
    }
}
