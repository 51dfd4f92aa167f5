//! Session creation and listing.

use common::protocol::CreateSessionRequest;
use common::records::{whole_minutes, Session};
use common::ServiceError;
use tracing::info;
use uuid::Uuid;

use super::AttendanceService;
use crate::store::SessionFilter;

impl AttendanceService {
    /// Create a session, or merge sections into the existing one with the
    /// same deterministic id.
    ///
    /// # Errors
    ///
    /// [`ServiceError::BadRequest`] when subject or lecturer is empty or the
    /// end time is not strictly after the start time.
    pub async fn create_session(
        &self,
        mut req: CreateSessionRequest,
    ) -> Result<Session, ServiceError> {
        // Stored at minute precision; validate what will be stored.
        req.start_time = whole_minutes(req.start_time);
        req.end_time = whole_minutes(req.end_time);
        validate(&req)?;
        self.connectivity.ensure_online()?;

        let subject = req.subject.trim().to_owned();
        let id = if req.auto_id {
            Uuid::new_v4().to_string()
        } else {
            Session::deterministic_id(req.date, &subject, req.attendance_type)
        };

        if !req.auto_id {
            if let Some(existing) = self.stores.sessions.session(&id).await? {
                let merged = self.stores.sessions.merge_sections(&existing.id, &req.sections).await?;
                info!(session_id = %id, sections = merged.sections.len(), "session exists; sections merged");
                return Ok(merged);
            }
        }

        let mut sections: Vec<String> = Vec::with_capacity(req.sections.len());
        for section in req.sections {
            if !sections.contains(&section) {
                sections.push(section);
            }
        }

        let session = Session {
            id,
            date: req.date,
            subject,
            lecturer: req.lecturer.trim().to_owned(),
            sections,
            attendance_type: req.attendance_type,
            start_time: req.start_time,
            end_time: req.end_time,
        };
        self.stores.sessions.put_session(&session).await?;
        info!(session_id = %session.id, subject = %session.subject, "session created");
        Ok(session)
    }

    /// Sessions matching `filter`, ordered by date then start time.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, ServiceError> {
        self.connectivity.ensure_online()?;
        Ok(self.stores.sessions.list_sessions(filter).await?)
    }

    /// Look up one session.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`] when no session has this id.
    pub async fn session(&self, id: &str) -> Result<Session, ServiceError> {
        self.connectivity.ensure_online()?;
        self.stores
            .sessions
            .session(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session {id}")))
    }
}

fn validate(req: &CreateSessionRequest) -> Result<(), ServiceError> {
    if req.subject.trim().is_empty() {
        return Err(ServiceError::BadRequest("subject must not be empty".into()));
    }
    if req.lecturer.trim().is_empty() {
        return Err(ServiceError::BadRequest("lecturer must not be empty".into()));
    }
    if req.end_time <= req.start_time {
        return Err(ServiceError::BadRequest(
            "end time must be after start time".into(),
        ));
    }
    Ok(())
}
