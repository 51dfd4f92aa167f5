//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::attendance::AttendanceService;
use crate::connectivity::ConnectivityMonitor;
use crate::crypto::CardCodec;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so that Axum can clone the state for
/// each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Attendance operations over the backend repositories.
    pub service: AttendanceService,
    /// Card payload codec holding the card key.
    pub codec: Arc<CardCodec>,
}

impl AppState {
    pub fn new(service: AttendanceService, codec: CardCodec) -> Self {
        Self {
            service,
            codec: Arc::new(codec),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        self.service.connectivity()
    }
}

impl Default for AppState {
    /// In-memory backend with the built-in card key, suitable for tests.
    fn default() -> Self {
        use crate::attendance::Settings;
        use crate::card_key::CardKey;
        use crate::config::CardFormat;
        use crate::store::{MemoryPhotoStore, MemoryStore, Stores};

        let stores = Stores::from_memory(MemoryStore::new("matricNo"), Arc::new(MemoryPhotoStore::new()));
        let service = AttendanceService::new(stores, ConnectivityMonitor::new(), Settings::default());
        Self::new(service, CardCodec::new(CardKey::legacy(), CardFormat::Legacy, false))
    }
}
