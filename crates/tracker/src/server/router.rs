//! Axum router construction.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route("/sessions/:id/scan", post(handlers::scan))
        .route("/sessions/:id/scans", get(handlers::recent_scans))
        .route("/cards/encode", post(handlers::encode_card))
        .route("/cards/decode", post(handlers::decode_card))
        .route(
            "/people/:identifier/attendance",
            get(handlers::attendance_report),
        )
        .route("/people/:identifier/warnings", post(handlers::issue_warning))
        .route(
            "/people/:identifier/photo",
            get(handlers::photo_url).put(handlers::upload_photo),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(middleware::BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use axum_test::TestServer;
    use bytes::Bytes;
    use common::protocol::{
        AttendanceReport, DecodeCardResponse, EncodeCardResponse, ErrorResponse,
        PhotoUrlResponse, RecentScansResponse, ScanResponse, ScanStatus, SessionResponse,
        WarningResponse,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use crate::attendance::fixtures::student;
    use crate::attendance::{AttendanceService, Settings};
    use crate::card_key::CardKey;
    use crate::config::CardFormat;
    use crate::connectivity::ConnectivityMonitor;
    use crate::crypto::CardCodec;
    use crate::store::{MemoryPhotoStore, MemoryStore, Stores};

    struct Fixture {
        server: TestServer,
        memory: MemoryStore,
        connectivity: ConnectivityMonitor,
    }

    async fn fixture() -> Fixture {
        let memory = MemoryStore::new("matricNo");
        memory.insert_person(&student("u1", "Alice Tan", "DI230101")).await;
        let connectivity = ConnectivityMonitor::new();
        let stores = Stores::from_memory(memory.clone(), std::sync::Arc::new(MemoryPhotoStore::new()));
        let service = AttendanceService::new(stores, connectivity.clone(), Settings::default());
        let state = AppState::new(
            service,
            CardCodec::new(CardKey::legacy(), CardFormat::Legacy, false),
        );
        Fixture {
            server: TestServer::new(build(state)).unwrap(),
            memory,
            connectivity,
        }
    }

    fn session_body(date: &str) -> serde_json::Value {
        json!({
            "date": date,
            "subject": "CS101",
            "lecturer": "Dr. Lim",
            "sections": ["A"],
            "attendanceType": "Lecture",
            "startTime": "08:00",
            "endTime": "10:00",
        })
    }

    async fn create_session(f: &Fixture, date: &str) -> SessionResponse {
        let resp = f.server.post("/sessions").json(&session_body(date)).await;
        resp.assert_status(StatusCode::CREATED);
        resp.json::<SessionResponse>()
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build(AppState::default());
        let req = Request::builder()
            .uri("/unknown")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn health_route_exists() {
        let app = build(AppState::default());
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn create_and_list_sessions() {
        let f = fixture().await;
        let created = create_session(&f, "2026-10-18").await;
        assert_eq!(created.session.id, "2026-10-18_CS101_Lecture");
        assert_eq!(created.duration_hours, 2.0);

        let listed = f
            .server
            .get("/sessions")
            .add_query_param("subject", "CS101")
            .await
            .json::<Vec<SessionResponse>>();
        assert_eq!(listed.len(), 1);

        let none = f
            .server
            .get("/sessions")
            .add_query_param("lecturer", "Dr. Nobody")
            .await
            .json::<Vec<SessionResponse>>();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn invalid_session_is_bad_request() {
        let f = fixture().await;
        let mut body = session_body("2026-10-18");
        body["endTime"] = json!("07:00");
        let resp = f.server.post("/sessions").json(&body).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(resp.json::<ErrorResponse>().code, "bad_request");
    }

    #[tokio::test]
    async fn encoded_card_scan_marks_once() {
        let f = fixture().await;
        let session = create_session(&f, "2026-10-18").await;

        let wire = f
            .server
            .post("/cards/encode")
            .json(&json!({ "identifier": "DI230101" }))
            .await
            .json::<EncodeCardResponse>()
            .wire;
        assert!(wire.starts_with("AAAAAAAAAAAAAAAAAAAAAA==:"), "{wire}");

        let path = format!("/sessions/{}/scan", session.session.id);
        let first = f
            .server
            .post(&path)
            .json(&json!({ "payload": wire }))
            .await
            .json::<ScanResponse>();
        assert_eq!(first.status, ScanStatus::Recorded);
        assert_eq!(first.person_name, "Alice Tan");

        let second = f
            .server
            .post(&path)
            .json(&json!({ "payload": wire }))
            .await
            .json::<ScanResponse>();
        assert_eq!(second.status, ScanStatus::AlreadyRecorded);
        assert_eq!(second.time, first.time);
        assert_eq!(f.memory.marker_count(&session.session.id).await, 1);

        let scans = f
            .server
            .get(&format!("/sessions/{}/scans", session.session.id))
            .await
            .json::<RecentScansResponse>();
        assert_eq!(scans.scans.len(), 1);
    }

    #[tokio::test]
    async fn raw_identifier_scan_falls_back() {
        let f = fixture().await;
        let session = create_session(&f, "2026-10-18").await;
        let resp = f
            .server
            .post(&format!("/sessions/{}/scan", session.session.id))
            .json(&json!({ "payload": "DI230101" }))
            .await;
        resp.assert_status_ok();
    }

    #[tokio::test]
    async fn unknown_card_is_404() {
        let f = fixture().await;
        let session = create_session(&f, "2026-10-18").await;
        let resp = f
            .server
            .post(&format!("/sessions/{}/scan", session.session.id))
            .json(&json!({ "payload": "04:A2:19:7C" }))
            .await;
        resp.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(resp.json::<ErrorResponse>().code, "unknown_identifier");
    }

    #[tokio::test]
    async fn offline_scan_is_503() {
        let f = fixture().await;
        let session = create_session(&f, "2026-10-18").await;
        f.connectivity.mark_offline("probe failed");
        let resp = f
            .server
            .post(&format!("/sessions/{}/scan", session.session.id))
            .json(&json!({ "payload": "DI230101" }))
            .await;
        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.json::<ErrorResponse>().code, "offline");
    }

    #[tokio::test]
    async fn decode_reports_fallback() {
        let f = fixture().await;
        let resp = f
            .server
            .post("/cards/decode")
            .json(&json!({ "payload": "not-a-wire-string" }))
            .await
            .json::<DecodeCardResponse>();
        assert_eq!(resp.identifier, "not-a-wire-string");
        assert!(!resp.decrypted);
    }

    #[tokio::test]
    async fn empty_identifier_cannot_be_encoded() {
        let f = fixture().await;
        let resp = f
            .server
            .post("/cards/encode")
            .json(&json!({ "identifier": "" }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_and_warning() {
        let f = fixture().await;
        let attended = create_session(&f, "2026-10-18").await;
        create_session(&f, "2026-10-19").await;
        create_session(&f, "2026-10-20").await;
        f.server
            .post(&format!("/sessions/{}/scan", attended.session.id))
            .json(&json!({ "payload": "DI230101" }))
            .await
            .assert_status_ok();

        let report = f
            .server
            .get("/people/DI230101/attendance")
            .add_query_param("subject", "CS101")
            .await
            .json::<AttendanceReport>();
        assert_eq!(report.subjects.len(), 1);
        assert_eq!(report.subjects[0].percent, 33);

        let resp = f
            .server
            .post("/people/DI230101/warnings")
            .json(&json!({ "subject": "CS101", "date": "2026-10-19" }))
            .await;
        resp.assert_status(StatusCode::CREATED);
        assert_eq!(
            resp.json::<WarningResponse>().warnings,
            vec!["Absent without excuse on 2026-10-19".to_string()]
        );
    }

    #[tokio::test]
    async fn photo_upload_and_lookup() {
        let f = fixture().await;
        f.server
            .get("/people/DI230101/photo")
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let uploaded = f
            .server
            .put("/people/DI230101/photo")
            .bytes(Bytes::from_static(b"\xFF\xD8jpeg"))
            .await
            .json::<PhotoUrlResponse>();
        assert_eq!(uploaded.url, "memory://students/u1.jpg");

        let fetched = f
            .server
            .get("/people/DI230101/photo")
            .await
            .json::<PhotoUrlResponse>();
        assert_eq!(fetched.url, uploaded.url);
    }
}
