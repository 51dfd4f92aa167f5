//! Attendance operations: sessions, marking, reconciliation, and the
//! per-person actions built on them.
//!
//! Every operation checks connectivity before touching the backend and is
//! terminal on failure: nothing is retried and nothing partially applied is
//! resumed.

pub mod marking;
pub mod people;
pub mod reconciler;
pub mod report;
pub mod sessions;

pub use marking::MarkOutcome;
pub use reconciler::{Reconciliation, Tally};

use chrono::{DateTime, FixedOffset, Utc};
use common::records::Person;
use common::ServiceError;

use crate::config::Config;
use crate::connectivity::ConnectivityMonitor;
use crate::store::Stores;

/// Format used for time-of-day strings on markers and scan entries.
pub const TIME_OF_DAY_FORMAT: &str = "%I:%M %p";

/// Operation settings derived from [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub display_offset: FixedOffset,
    pub recent_scan_limit: usize,
    pub photo_category: String,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            display_offset: cfg.display_offset(),
            recent_scan_limit: cfg.recent_scan_limit,
            photo_category: cfg.photo_category.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Attendance service over the backend repositories.
#[derive(Clone)]
pub struct AttendanceService {
    stores: Stores,
    connectivity: ConnectivityMonitor,
    settings: Settings,
}

impl AttendanceService {
    pub fn new(stores: Stores, connectivity: ConnectivityMonitor, settings: Settings) -> Self {
        Self {
            stores,
            connectivity,
            settings,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Resolve an identifier to its person record.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownIdentifier`] when no record matches exactly.
    pub async fn resolve_person(&self, identifier: &str) -> Result<Person, ServiceError> {
        self.connectivity.ensure_online()?;
        self.find_person(identifier).await
    }

    async fn find_person(&self, identifier: &str) -> Result<Person, ServiceError> {
        self.stores
            .people
            .person_by_identifier(identifier)
            .await?
            .ok_or_else(|| ServiceError::UnknownIdentifier(identifier.to_owned()))
    }

    fn format_time(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.settings.display_offset)
            .format(TIME_OF_DAY_FORMAT)
            .to_string()
    }
}
