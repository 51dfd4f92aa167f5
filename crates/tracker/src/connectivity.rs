//! Backend reachability.
//!
//! Every operation checks [`ConnectivityMonitor::ensure_online`] before
//! touching the backend and fails fast with [`ServiceError::Offline`]. A
//! background task ([`probe_task`]) pings the backend on an interval and
//! swaps in the new status. Nothing is queued or retried while offline.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use common::ServiceError;
use tokio::time;
use tracing::{info, warn};

use crate::store::{BackendError, Stores};

/// Result of the most recent probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub online: bool,
    /// `None` until the first probe completes.
    pub checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Shared, lock-free connectivity flag.
///
/// Starts online; the first failed probe flips it.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<ArcSwap<ConnectivityStatus>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ConnectivityStatus {
                online: true,
                checked_at: None,
                last_error: None,
            })),
        }
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.inner.load().as_ref().clone()
    }

    pub fn is_online(&self) -> bool {
        self.inner.load().online
    }

    /// Pre-flight check.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Offline`] when the last probe failed.
    pub fn ensure_online(&self) -> Result<(), ServiceError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ServiceError::Offline)
        }
    }

    pub fn mark_online(&self) {
        self.record(Ok(()));
    }

    pub fn mark_offline(&self, reason: &str) {
        self.record(Err(reason.to_owned()));
    }

    /// Store a probe result, logging transitions only.
    pub fn record(&self, result: Result<(), String>) {
        let was_online = self.is_online();
        let status = match result {
            Ok(()) => ConnectivityStatus {
                online: true,
                checked_at: Some(Utc::now()),
                last_error: None,
            },
            Err(e) => ConnectivityStatus {
                online: false,
                checked_at: Some(Utc::now()),
                last_error: Some(e),
            },
        };
        match (was_online, status.online) {
            (true, false) => warn!(error = ?status.last_error, "backend unreachable; going offline"),
            (false, true) => info!("backend reachable again"),
            _ => {}
        }
        self.inner.store(Arc::new(status));
    }

    /// Ping `stores` once and record the outcome.
    pub async fn probe(&self, stores: &Stores) -> bool {
        let result = stores.ping().await.map_err(|e: BackendError| e.to_string());
        self.record(result);
        self.is_online()
    }
}

/// Spawn a background task that probes the backend every `interval`.
///
/// The first probe runs immediately so a backend that is down at startup is
/// reported before the first request.
pub fn probe_task(
    stores: Stores,
    monitor: ConnectivityMonitor,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            monitor.probe(&stores).await;
        }
    })
}
