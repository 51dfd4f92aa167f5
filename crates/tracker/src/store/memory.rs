//! In-memory document backend.
//!
//! Stores raw [`Document`]s the way the hosted backend does and decodes them
//! on the way out, so the record boundary is exercised exactly as in
//! production. Used by the binary when no hosted backend adapter is wired in,
//! and by tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::records::{AttendanceMarker, Document, Person, ScanEntry, Session};
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{
    BackendError, MarkerRepository, PersonRepository, Probe, ScanLog, SessionFilter,
    SessionRepository,
};

#[derive(Debug, Default)]
struct Collections {
    people: BTreeMap<String, Document>,
    sessions: BTreeMap<String, Document>,
    /// session id → person id → marker document.
    markers: HashMap<String, BTreeMap<String, Document>>,
    /// session id → append-only scan documents.
    scans: HashMap<String, Vec<Document>>,
}

/// Thread-safe in-memory backend.
///
/// Cloning yields another handle to the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    identifier_field: Arc<str>,
    inner: Arc<RwLock<Collections>>,
    available: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store that resolves identifiers via `identifier_field`.
    pub fn new(identifier_field: &str) -> Self {
        Self {
            identifier_field: Arc::from(identifier_field),
            inner: Arc::new(RwLock::new(Collections::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert or replace a person record.
    pub async fn insert_person(&self, person: &Person) {
        let doc = person.to_document(&self.identifier_field);
        self.insert_person_document(&person.id, doc).await;
    }

    /// Insert a raw person document, bypassing the record boundary.
    pub async fn insert_person_document(&self, id: &str, doc: Document) {
        self.inner.write().await.people.insert(id.to_owned(), doc);
    }

    /// Number of markers stored under `session_id`.
    pub async fn marker_count(&self, session_id: &str) -> usize {
        self.inner
            .read()
            .await
            .markers
            .get(session_id)
            .map_or(0, BTreeMap::len)
    }

    fn ensure_available(&self) -> Result<(), BackendError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("memory store offline".into()))
        }
    }

    fn decode_person(&self, id: &str, doc: &Document) -> Result<Person, BackendError> {
        Ok(Person::from_document(id, doc, &self.identifier_field)?)
    }
}

#[async_trait]
impl PersonRepository for MemoryStore {
    async fn person(&self, id: &str) -> Result<Option<Person>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        data.people
            .get(id)
            .map(|doc| self.decode_person(id, doc))
            .transpose()
    }

    async fn person_by_identifier(&self, identifier: &str) -> Result<Option<Person>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        data.people
            .iter()
            .find(|(_, doc)| {
                doc.get(self.identifier_field.as_ref()).and_then(Value::as_str) == Some(identifier)
            })
            .map(|(id, doc)| self.decode_person(id, doc))
            .transpose()
    }

    async fn person_by_email(&self, email: &str) -> Result<Option<Person>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        data.people
            .iter()
            .find(|(_, doc)| doc.get("email").and_then(Value::as_str) == Some(email))
            .map(|(id, doc)| self.decode_person(id, doc))
            .transpose()
    }

    async fn append_warning(&self, id: &str, warning: &str) -> Result<Person, BackendError> {
        self.ensure_available()?;
        let mut data = self.inner.write().await;
        let doc = data.people.get_mut(id).ok_or_else(|| BackendError::NotFound {
            entity: "person",
            id: id.to_owned(),
        })?;

        match doc.get_mut("warnings") {
            Some(Value::Array(items)) => items.push(json!(warning)),
            _ => {
                doc.insert("warnings".into(), json!([warning]));
            }
        }
        self.decode_person(id, doc)
    }

    async fn set_photo_url(&self, id: &str, url: &str) -> Result<(), BackendError> {
        self.ensure_available()?;
        let mut data = self.inner.write().await;
        let doc = data.people.get_mut(id).ok_or_else(|| BackendError::NotFound {
            entity: "person",
            id: id.to_owned(),
        })?;
        doc.insert("photoUrl".into(), json!(url));
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn session(&self, id: &str) -> Result<Option<Session>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        data.sessions
            .get(id)
            .map(|doc| Session::from_document(id, doc).map_err(BackendError::from))
            .transpose()
    }

    async fn put_session(&self, session: &Session) -> Result<(), BackendError> {
        self.ensure_available()?;
        self.inner
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session.to_document());
        Ok(())
    }

    async fn merge_sections(&self, id: &str, sections: &[String]) -> Result<Session, BackendError> {
        self.ensure_available()?;
        let mut data = self.inner.write().await;
        let doc = data.sessions.get_mut(id).ok_or_else(|| BackendError::NotFound {
            entity: "session",
            id: id.to_owned(),
        })?;

        let mut session = Session::from_document(id, doc)?;
        for section in sections {
            if !session.sections.contains(section) {
                session.sections.push(section.clone());
            }
        }
        doc.insert("sections".into(), json!(session.sections));
        Ok(session)
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        let mut sessions = Vec::new();
        for (id, doc) in &data.sessions {
            let session = Session::from_document(id, doc)?;
            let subject_ok = filter.subject.as_ref().map_or(true, |s| *s == session.subject);
            let lecturer_ok = filter.lecturer.as_ref().map_or(true, |l| *l == session.lecturer);
            if subject_ok && lecturer_ok {
                sessions.push(session);
            }
        }
        sessions.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(sessions)
    }
}

#[async_trait]
impl MarkerRepository for MemoryStore {
    async fn marker(
        &self,
        session_id: &str,
        person_id: &str,
    ) -> Result<Option<AttendanceMarker>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        data.markers
            .get(session_id)
            .and_then(|by_person| by_person.get(person_id))
            .map(|doc| {
                AttendanceMarker::from_document(session_id, person_id, doc).map_err(BackendError::from)
            })
            .transpose()
    }

    async fn set_marker(
        &self,
        session_id: &str,
        person_id: &str,
        time: &str,
    ) -> Result<AttendanceMarker, BackendError> {
        self.ensure_available()?;
        let marker = AttendanceMarker {
            session_id: session_id.to_owned(),
            person_id: person_id.to_owned(),
            captured_at: Utc::now(),
            time: time.to_owned(),
        };
        self.inner
            .write()
            .await
            .markers
            .entry(session_id.to_owned())
            .or_default()
            .insert(person_id.to_owned(), marker.to_document());
        Ok(marker)
    }

    async fn attended_sessions(
        &self,
        person_id: &str,
        session_ids: &[String],
    ) -> Result<HashSet<String>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        Ok(session_ids
            .iter()
            .filter(|id| {
                data.markers
                    .get(id.as_str())
                    .is_some_and(|by_person| by_person.contains_key(person_id))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScanLog for MemoryStore {
    async fn append_scan(&self, session_id: &str, entry: &ScanEntry) -> Result<(), BackendError> {
        self.ensure_available()?;
        self.inner
            .write()
            .await
            .scans
            .entry(session_id.to_owned())
            .or_default()
            .push(entry.to_document());
        Ok(())
    }

    async fn recent_scans(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ScanEntry>, BackendError> {
        self.ensure_available()?;
        let data = self.inner.read().await;
        let Some(docs) = data.scans.get(session_id) else {
            return Ok(Vec::new());
        };
        let mut entries = docs
            .iter()
            .enumerate()
            .map(|(i, doc)| ScanEntry::from_document(&format!("{session_id}/{i}"), doc))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait]
impl Probe for MemoryStore {
    async fn ping(&self) -> Result<(), BackendError> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use common::records::{AttendanceType, Role};

    fn person(id: &str, identifier: &str) -> Person {
        Person {
            id: id.into(),
            name: format!("Student {id}"),
            identifier: Some(identifier.into()),
            email: Some(format!("{id}@example.edu")),
            role: Role::Student,
            photo_url: None,
            warnings: Vec::new(),
        }
    }

    fn session(day: u32, subject: &str, start: u32) -> Session {
        let date = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        Session {
            id: Session::deterministic_id(date, subject, AttendanceType::Lecture),
            date,
            subject: subject.into(),
            lecturer: "Dr. Lim".into(),
            sections: vec!["A".into()],
            attendance_type: AttendanceType::Lecture,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(start + 2, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn lookup_by_identifier_is_exact() {
        let store = MemoryStore::new("matricNo");
        store.insert_person(&person("u1", "DI230101")).await;

        let found = store.person_by_identifier("DI230101").await.unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert!(store.person_by_identifier("di230101").await.unwrap().is_none());
        assert!(store.person_by_identifier("DI23010").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_by_email() {
        let store = MemoryStore::new("matricNo");
        store.insert_person(&person("u1", "DI230101")).await;
        assert!(store.person_by_email("u1@example.edu").await.unwrap().is_some());
        assert!(store.person_by_email("nobody@example.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_document_surfaces_decode_error() {
        let store = MemoryStore::new("matricNo");
        let Value::Object(doc) = json!({"matricNo": "X1", "warnings": 5}) else {
            unreachable!()
        };
        store.insert_person_document("bad", doc).await;
        let err = store.person("bad").await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn warnings_are_appended_without_dedup() {
        let store = MemoryStore::new("matricNo");
        store.insert_person(&person("u1", "DI230101")).await;
        store.append_warning("u1", "late").await.unwrap();
        let p = store.append_warning("u1", "late").await.unwrap();
        assert_eq!(p.warnings, vec!["late", "late"]);
    }

    #[tokio::test]
    async fn merge_sections_is_additive_and_ordered() {
        let store = MemoryStore::new("matricNo");
        let s = session(18, "CS101", 8);
        store.put_session(&s).await.unwrap();
        let merged = store
            .merge_sections(&s.id, &["B".into(), "A".into(), "C".into()])
            .await
            .unwrap();
        assert_eq!(merged.sections, vec!["A", "B", "C"]);
        assert_eq!(store.session(&s.id).await.unwrap().unwrap().sections, merged.sections);
    }

    #[tokio::test]
    async fn merge_sections_on_missing_session() {
        let store = MemoryStore::new("matricNo");
        let err = store.merge_sections("nope", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { entity: "session", .. }));
    }

    #[tokio::test]
    async fn list_sessions_filters_and_orders() {
        let store = MemoryStore::new("matricNo");
        store.put_session(&session(20, "CS101", 8)).await.unwrap();
        store.put_session(&session(18, "CS101", 14)).await.unwrap();
        store.put_session(&session(18, "MA201", 8)).await.unwrap();

        let filter = SessionFilter {
            subject: Some("CS101".into()),
            lecturer: None,
        };
        let listed = store.list_sessions(&filter).await.unwrap();
        let days: Vec<u32> = listed.iter().map(|s| chrono::Datelike::day(&s.date)).collect();
        assert_eq!(days, vec![18, 20]);
        assert_eq!(store.list_sessions(&SessionFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn set_marker_overwrites_rather_than_duplicates() {
        let store = MemoryStore::new("matricNo");
        store.set_marker("s1", "u1", "08:05 AM").await.unwrap();
        store.set_marker("s1", "u1", "08:06 AM").await.unwrap();
        assert_eq!(store.marker_count("s1").await, 1);
        let m = store.marker("s1", "u1").await.unwrap().unwrap();
        assert_eq!(m.time, "08:06 AM");
    }

    #[tokio::test]
    async fn attended_sessions_is_scoped_to_person_and_ids() {
        let store = MemoryStore::new("matricNo");
        store.set_marker("A", "u1", "t").await.unwrap();
        store.set_marker("C", "u1", "t").await.unwrap();
        store.set_marker("B", "u2", "t").await.unwrap();
        store.set_marker("D", "u1", "t").await.unwrap();

        let ids = vec!["A".to_string(), "B".into(), "C".into()];
        let attended = store.attended_sessions("u1", &ids).await.unwrap();
        assert_eq!(attended, HashSet::from(["A".to_string(), "C".to_string()]));
    }

    #[tokio::test]
    async fn recent_scans_newest_first_with_limit() {
        let store = MemoryStore::new("matricNo");
        let base = Utc::now();
        for i in 0..20 {
            let entry = ScanEntry {
                name: format!("n{i}"),
                identifier: format!("id{i}"),
                photo_url: None,
                time: String::new(),
                captured_at: base + Duration::seconds(i),
            };
            store.append_scan("s1", &entry).await.unwrap();
        }
        let recent = store.recent_scans("s1", 15).await.unwrap();
        assert_eq!(recent.len(), 15);
        assert_eq!(recent[0].identifier, "id19");
        assert_eq!(recent[14].identifier, "id5");
        assert!(store.recent_scans("other", 15).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_rejects_calls() {
        let store = MemoryStore::new("matricNo");
        store.set_available(false);
        assert!(matches!(store.ping().await, Err(BackendError::Unavailable(_))));
        assert!(store.person("u1").await.is_err());
        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
