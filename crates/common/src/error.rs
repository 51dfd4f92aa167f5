//! Common error types shared across crates.

use thiserror::Error;

/// Top-level service error type.
///
/// Every variant is terminal for the operation in flight; callers return to
/// an idle state and the user re-triggers the action. Variants map to HTTP
/// status codes returned to callers:
/// - [`ServiceError::BadRequest`] → 400
/// - [`ServiceError::UnknownIdentifier`], [`ServiceError::MissingEmail`],
///   [`ServiceError::NotFound`] → 404
/// - [`ServiceError::EncryptionFailure`], [`ServiceError::Internal`] → 500
/// - [`ServiceError::Nfc`], [`ServiceError::Backend`] → 502
/// - [`ServiceError::Offline`] → 503
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The backend is unreachable; detected before the operation was attempted.
    #[error("no network connection")]
    Offline,

    /// No person record carries the scanned or typed identifier.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// No person record is registered under the given email address.
    #[error("no profile registered for email: {0}")]
    MissingEmail(String),

    /// A session, photo, or other addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or violates a record invariant.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Poll timeout, non-writable tag, or reader failure.
    #[error("nfc error: {0}")]
    Nfc(String),

    /// Encoding a card payload failed.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// A backend read or write failed.
    #[error("operation failed: {0}")]
    Backend(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::UnknownIdentifier(_)
            | ServiceError::MissingEmail(_)
            | ServiceError::NotFound(_) => 404,
            ServiceError::EncryptionFailure(_) | ServiceError::Internal(_) => 500,
            ServiceError::Nfc(_) | ServiceError::Backend(_) => 502,
            ServiceError::Offline => 503,
        }
    }

    /// Short machine-readable code used in [`crate::protocol::ErrorResponse`].
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Offline => "offline",
            ServiceError::UnknownIdentifier(_) => "unknown_identifier",
            ServiceError::MissingEmail(_) => "missing_email",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::Nfc(_) => "nfc_error",
            ServiceError::EncryptionFailure(_) => "encryption_failure",
            ServiceError::Backend(_) => "operation_failed",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
