//! NFC attendance tracker.
//!
//! Lecturers create class sessions and scan student cards; each scan is
//! resolved to an identifier through the card codec and marked at most once
//! per session. Attendance history is reconciled per person and subject.

pub mod attendance;
pub mod auth;
pub mod aws;
pub mod card_key;
pub mod config;
pub mod connectivity;
pub mod crypto;
pub mod nfc;
pub mod server;
pub mod store;
pub mod telemetry;
