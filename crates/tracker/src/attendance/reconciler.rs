//! Presence and aggregate percentages for one person over a list of sessions.
//!
//! A marker's existence is the only signal of presence; a session without
//! one counts as absent. Nothing is cached: every call re-queries.

use std::collections::HashSet;

use crate::store::{BackendError, MarkerRepository};

/// Present/total counts for one grouping of sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub present: usize,
    pub total: usize,
    /// `round(present / total * 100)`, or 0 when `total` is 0.
    pub percent: u32,
}

impl Tally {
    pub fn is_perfect(&self) -> bool {
        self.percent == 100
    }
}

/// Result of reconciling one person against a session list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub attended: HashSet<String>,
    pub tally: Tally,
}

impl Reconciliation {
    pub fn is_present(&self, session_id: &str) -> bool {
        self.attended.contains(session_id)
    }
}

/// Count `session_ids` against the set of sessions the person attended.
///
/// Duplicate ids count once toward the total.
pub fn tally(attended: &HashSet<String>, session_ids: &[String]) -> Tally {
    let unique: HashSet<&str> = session_ids.iter().map(String::as_str).collect();
    let total = unique.len();
    let present = unique.iter().filter(|id| attended.contains(**id)).count();
    let percent = if total == 0 {
        0
    } else {
        (present as f64 / total as f64 * 100.0).round() as u32
    };
    Tally {
        present,
        total,
        percent,
    }
}

/// Query the person's markers for exactly `session_ids` and tally them.
///
/// # Errors
///
/// Propagates the repository error; there is no partial result.
pub async fn reconcile(
    markers: &dyn MarkerRepository,
    person_id: &str,
    session_ids: &[String],
) -> Result<Reconciliation, BackendError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(session_ids.len());
    let unique: Vec<String> = session_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let attended = if unique.is_empty() {
        HashSet::new()
    } else {
        markers.attended_sessions(person_id, &unique).await?
    };
    let tally = tally(&attended, &unique);
    Ok(Reconciliation { attended, tally })
}
