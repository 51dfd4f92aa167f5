//! Card payload encryption.
//!
//! Two wire formats are understood:
//!
//! ```text
//! <base64(iv)>:<base64(ciphertext)>                 legacy, AES-256-CBC
//! v2.<base64url(nonce)>.<base64url(ciphertext+tag)>  AES-256-GCM-SIV
//! ```
//!
//! Every card in circulation uses the legacy format. The `v2` format is
//! opt-in for new writes; decoding always accepts both. A standard-base64 IV
//! never contains `.`, so the prefix check is unambiguous.

pub mod cipher;
pub mod codec;
pub mod legacy;

pub use codec::{CardCodec, Resolved};

use common::ServiceError;
use thiserror::Error;

/// Errors produced by the codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Identifiers are never empty.
    #[error("cannot encode an empty identifier")]
    EmptyPlaintext,

    /// The string is not a wire string of either format.
    #[error("invalid card payload format: {0}")]
    InvalidFormat(&'static str),

    /// Bad padding, wrong key, or failed authentication.
    #[error("card payload could not be decrypted")]
    Decryption,

    /// The decrypted bytes are not a UTF-8 identifier.
    #[error("decrypted card payload is not valid UTF-8")]
    InvalidUtf8,

    /// The cipher could not be set up or run.
    #[error("cipher failure: {0}")]
    Cipher(&'static str),
}

impl From<CodecError> for ServiceError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::EmptyPlaintext => ServiceError::BadRequest(err.to_string()),
            other => ServiceError::EncryptionFailure(other.to_string()),
        }
    }
}
