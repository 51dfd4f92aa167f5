//! AWS SDK client initialisation for KMS, Secrets Manager, and S3.
//!
//! AWS is optional: it is only initialised when the deployment provisions its
//! own card key or keeps photos in S3.

pub mod clients;

pub use clients::AwsClients;
