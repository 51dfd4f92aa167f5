//! Per-person attendance history and absence warnings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use common::protocol::{AttendanceReport, SessionPresence, SubjectAttendance};
use common::records::{Person, Session};
use common::ServiceError;
use tracing::info;

use super::reconciler::reconcile;
use super::AttendanceService;
use crate::store::SessionFilter;

impl AttendanceService {
    /// Reconcile `identifier`'s markers against every session, grouped by
    /// subject. `subject` narrows the report to one subject.
    pub async fn attendance_report(
        &self,
        identifier: &str,
        subject: Option<&str>,
    ) -> Result<AttendanceReport, ServiceError> {
        self.connectivity.ensure_online()?;
        let person = self.find_person(identifier).await?;

        let filter = SessionFilter {
            subject: subject.map(str::to_owned),
            lecturer: None,
        };
        let sessions = self.stores.sessions.list_sessions(&filter).await?;

        let mut subjects = Vec::new();
        for (name, group) in group_by_subject(sessions) {
            subjects.push(self.subject_attendance(&person, name, group).await?);
        }

        Ok(AttendanceReport {
            identifier: identifier.to_owned(),
            name: person.name,
            subjects,
        })
    }

    /// Append `"Absent without excuse on <date>"` to the person's record.
    ///
    /// # Errors
    ///
    /// [`ServiceError::BadRequest`] when the subject has no sessions or the
    /// person's attendance for it is already perfect.
    pub async fn issue_absence_warning(
        &self,
        identifier: &str,
        subject: &str,
        date: NaiveDate,
    ) -> Result<Vec<String>, ServiceError> {
        self.connectivity.ensure_online()?;
        let person = self.find_person(identifier).await?;

        let filter = SessionFilter {
            subject: Some(subject.to_owned()),
            lecturer: None,
        };
        let sessions = self.stores.sessions.list_sessions(&filter).await?;
        if sessions.is_empty() {
            return Err(ServiceError::BadRequest(format!(
                "no sessions recorded for {subject}"
            )));
        }
        let ids: Vec<String> = sessions.into_iter().map(|s| s.id).collect();
        let reconciliation = reconcile(self.stores.markers.as_ref(), &person.id, &ids).await?;
        if reconciliation.tally.is_perfect() {
            return Err(ServiceError::BadRequest(format!(
                "{} has perfect attendance for {subject}",
                person.name
            )));
        }

        let warning = absence_warning(date);
        let updated = self.stores.people.append_warning(&person.id, &warning).await?;
        info!(person_id = %person.id, subject, percent = reconciliation.tally.percent, "absence warning issued");
        Ok(updated.warnings)
    }

    async fn subject_attendance(
        &self,
        person: &Person,
        subject: String,
        sessions: Vec<Session>,
    ) -> Result<SubjectAttendance, ServiceError> {
        let ids: Vec<String> = sessions.iter().map(|s| s.id.clone()).collect();
        let reconciliation = reconcile(self.stores.markers.as_ref(), &person.id, &ids).await?;

        let sessions = sessions
            .into_iter()
            .map(|s| SessionPresence {
                present: reconciliation.is_present(&s.id),
                session_id: s.id,
                date: s.date,
                attendance_type: s.attendance_type,
            })
            .collect();

        Ok(SubjectAttendance {
            subject,
            present: reconciliation.tally.present,
            total: reconciliation.tally.total,
            percent: reconciliation.tally.percent,
            perfect: reconciliation.tally.is_perfect(),
            sessions,
        })
    }
}

/// Warning text appended to a person's record.
pub fn absence_warning(date: NaiveDate) -> String {
    format!("Absent without excuse on {}", date.format("%Y-%m-%d"))
}

/// Sessions grouped by subject, subjects in lexical order, each group
/// keeping the repository's date order.
fn group_by_subject(sessions: Vec<Session>) -> BTreeMap<String, Vec<Session>> {
    let mut groups: BTreeMap<String, Vec<Session>> = BTreeMap::new();
    for session in sessions {
        groups.entry(session.subject.clone()).or_default().push(session);
    }
    groups
}
