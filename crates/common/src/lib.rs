//! Common records, protocol definitions, and errors shared across the
//! attendance tracker crates.

pub mod error;
pub mod protocol;
pub mod records;

pub use error::ServiceError;
