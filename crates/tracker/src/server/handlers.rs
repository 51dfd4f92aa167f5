//! Axum request handlers for all service endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    AttendanceReport, CreateSessionRequest, DecodeCardRequest, DecodeCardResponse,
    EncodeCardRequest, EncodeCardResponse, ErrorResponse, HealthResponse, PhotoUrlResponse,
    RecentScansResponse, ReportQuery, ScanRequest, ScanResponse, SessionQuery, SessionResponse,
    WarningRequest, WarningResponse,
};
use common::ServiceError;
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::store::SessionFilter;

type ApiResult<T> = Result<T, ApiError>;

/// `GET /health`: liveness plus backend reachability.
///
/// Returns `503 Service Unavailable` while the backend probe is failing.
pub async fn health(State(state): State<AppState>) -> Response {
    let online = state.connectivity().is_online();
    let (status_code, status_str) = if online {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        online,
        card_format: state.codec.format().as_str().into(),
    };
    (status_code, Json(body)).into_response()
}

/// `POST /sessions`
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let session = state.service.create_session(req).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// `GET /sessions?subject=&lecturer=`
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let filter = SessionFilter {
        subject: query.subject.filter(|s| !s.is_empty()),
        lecturer: query.lecturer.filter(|s| !s.is_empty()),
    };
    let sessions = state.service.list_sessions(&filter).await?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// `POST /sessions/:id/scan`: resolve the tag payload and mark attendance.
///
/// The payload may be a wire string, a bare identifier, or a tag serial;
/// anything that does not decode is used as the identifier verbatim.
pub async fn scan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let payload = req.payload.trim();
    if payload.is_empty() {
        return Err(ServiceError::BadRequest("empty card payload".into()).into());
    }
    let resolved = state.codec.resolve(payload);
    debug!(decrypted = resolved.decrypted, "card payload resolved");

    let outcome = state
        .service
        .mark_attendance(&session_id, &resolved.identifier)
        .await?;
    Ok(Json(ScanResponse::from(&outcome)))
}

/// `GET /sessions/:id/scans`
pub async fn recent_scans(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<RecentScansResponse>> {
    let scans = state.service.recent_scans(&session_id).await?;
    Ok(Json(RecentScansResponse { scans }))
}

/// `POST /cards/encode`: the text to write to a new card.
pub async fn encode_card(
    State(state): State<AppState>,
    Json(req): Json<EncodeCardRequest>,
) -> ApiResult<Json<EncodeCardResponse>> {
    let wire = state.codec.encode(&req.identifier)?;
    Ok(Json(EncodeCardResponse { wire }))
}

/// `POST /cards/decode`
pub async fn decode_card(
    State(state): State<AppState>,
    Json(req): Json<DecodeCardRequest>,
) -> Json<DecodeCardResponse> {
    let resolved = state.codec.resolve(&req.payload);
    Json(DecodeCardResponse {
        identifier: resolved.identifier,
        decrypted: resolved.decrypted,
    })
}

/// `GET /people/:identifier/attendance?subject=`
pub async fn attendance_report(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<AttendanceReport>> {
    let subject = query.subject.as_deref().filter(|s| !s.is_empty());
    let report = state.service.attendance_report(&identifier, subject).await?;
    Ok(Json(report))
}

/// `POST /people/:identifier/warnings`
pub async fn issue_warning(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(req): Json<WarningRequest>,
) -> ApiResult<(StatusCode, Json<WarningResponse>)> {
    let warnings = state
        .service
        .issue_absence_warning(&identifier, &req.subject, req.date)
        .await?;
    Ok((StatusCode::CREATED, Json(WarningResponse { warnings })))
}

/// `PUT /people/:identifier/photo`: raw JPEG body.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    body: Bytes,
) -> ApiResult<Json<PhotoUrlResponse>> {
    let url = state.service.upload_photo(&identifier, body).await?;
    Ok(Json(PhotoUrlResponse { url }))
}

/// `GET /people/:identifier/photo`
pub async fn photo_url(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<PhotoUrlResponse>> {
    let url = state.service.photo_url(&identifier).await?;
    Ok(Json(PhotoUrlResponse { url }))
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
