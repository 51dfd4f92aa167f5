//! Repository traits for the hosted backend.
//!
//! The backend owns every record's lifetime; the tracker only holds transient
//! typed projections. Implementations decode documents through the record
//! boundary functions in [`common::records`], so callers never see raw
//! documents.
//!
//! There are no transactions. Attendance marking is read-then-write, and a
//! marker write keyed by person id overwrites rather than duplicates, so two
//! racing scans of the same card leave one marker.

pub mod memory;
pub mod photos;

pub use memory::MemoryStore;
pub use photos::{MemoryPhotoStore, S3PhotoStore};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::records::{AttendanceMarker, DecodeError, Person, ScanEntry, Session};
use common::ServiceError;
use thiserror::Error;

/// Errors returned by repository implementations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A stored document failed the record boundary.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The addressed document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected or failed the request.
    #[error("backend request failed: {0}")]
    Request(String),
}

impl From<BackendError> for ServiceError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { entity, id } => ServiceError::NotFound(format!("{entity} {id}")),
            other => ServiceError::Backend(other.to_string()),
        }
    }
}

/// Filter for [`SessionRepository::list_sessions`]. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub subject: Option<String>,
    pub lecturer: Option<String>,
}

#[async_trait]
pub trait PersonRepository: Send + Sync {
    async fn person(&self, id: &str) -> Result<Option<Person>, BackendError>;

    /// Exact-match lookup on the deployment's identifier field.
    async fn person_by_identifier(&self, identifier: &str) -> Result<Option<Person>, BackendError>;

    async fn person_by_email(&self, email: &str) -> Result<Option<Person>, BackendError>;

    /// Append a free-text warning to the person's permanent record.
    async fn append_warning(&self, id: &str, warning: &str) -> Result<Person, BackendError>;

    async fn set_photo_url(&self, id: &str, url: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn session(&self, id: &str) -> Result<Option<Session>, BackendError>;

    async fn put_session(&self, session: &Session) -> Result<(), BackendError>;

    /// Union `sections` into the stored section list, preserving order.
    async fn merge_sections(&self, id: &str, sections: &[String]) -> Result<Session, BackendError>;

    /// Sessions matching `filter`, ordered by date then start time.
    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, BackendError>;
}

#[async_trait]
pub trait MarkerRepository: Send + Sync {
    async fn marker(
        &self,
        session_id: &str,
        person_id: &str,
    ) -> Result<Option<AttendanceMarker>, BackendError>;

    /// Write the marker for `person_id` under `session_id`, overwriting any
    /// existing one. The backend assigns the capture timestamp.
    async fn set_marker(
        &self,
        session_id: &str,
        person_id: &str,
        time: &str,
    ) -> Result<AttendanceMarker, BackendError>;

    /// The subset of `session_ids` for which `person_id` has a marker.
    async fn attended_sessions(
        &self,
        person_id: &str,
        session_ids: &[String],
    ) -> Result<HashSet<String>, BackendError>;
}

#[async_trait]
pub trait ScanLog: Send + Sync {
    async fn append_scan(&self, session_id: &str, entry: &ScanEntry) -> Result<(), BackendError>;

    /// Up to `limit` entries, newest first.
    async fn recent_scans(&self, session_id: &str, limit: usize)
        -> Result<Vec<ScanEntry>, BackendError>;
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn put_photo(&self, key: &str, body: Bytes) -> Result<(), BackendError>;

    /// A retrievable URL for `key`, or `None` if no blob is stored there.
    async fn photo_url(&self, key: &str) -> Result<Option<String>, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}

/// Reachability check for the document backend.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Blob key for a person's photo: `<category>/<id>.jpg`.
pub fn photo_key(category: &str, person_id: &str) -> String {
    format!("{category}/{person_id}.jpg")
}

/// Every repository the tracker talks to.
#[derive(Clone)]
pub struct Stores {
    pub people: Arc<dyn PersonRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub markers: Arc<dyn MarkerRepository>,
    pub scans: Arc<dyn ScanLog>,
    pub photos: Arc<dyn PhotoStore>,
    pub probe: Arc<dyn Probe>,
}

impl Stores {
    /// Back every document repository with one [`MemoryStore`].
    pub fn from_memory(memory: MemoryStore, photos: Arc<dyn PhotoStore>) -> Self {
        let memory = Arc::new(memory);
        Self {
            people: memory.clone(),
            sessions: memory.clone(),
            markers: memory.clone(),
            scans: memory.clone(),
            photos,
            probe: memory,
        }
    }

    /// Ping the document backend and the photo store.
    pub async fn ping(&self) -> Result<(), BackendError> {
        self.probe.ping().await?;
        self.photos.ping().await
    }
}
