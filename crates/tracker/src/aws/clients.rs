//! AWS SDK client bundle.

use anyhow::Result;
use aws_config::BehaviorVersion;

use crate::config::Config;

/// Bundle of AWS SDK clients sharing one [`aws_config::SdkConfig`] so that
/// credentials are resolved once and reused.
#[derive(Clone)]
pub struct AwsClients {
    /// KMS client used to decrypt the envelope-encrypted card key.
    pub kms: aws_sdk_kms::Client,
    /// Secrets Manager client used to fetch the encrypted card key.
    pub secretsmanager: aws_sdk_secretsmanager::Client,
    /// S3 client used for photo blobs.
    pub s3: aws_sdk_s3::Client,
}

impl AwsClients {
    /// Whether `cfg` needs any AWS service.
    pub fn required(cfg: &Config) -> bool {
        cfg.provisioned_card_key().is_some() || cfg.photo_bucket.is_some()
    }

    /// Initialise all AWS SDK clients.
    ///
    /// Credentials come from the standard AWS credential chain. When
    /// `AWS_ENDPOINT_URL` is configured every client targets it, with S3 in
    /// path-style addressing so local emulators work.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK config cannot be loaded.
    pub async fn init(cfg: &Config) -> Result<Self> {
        let sdk = aws_config::defaults(BehaviorVersion::latest()).load().await;

        let mut kms = aws_sdk_kms::config::Builder::from(&sdk);
        let mut secretsmanager = aws_sdk_secretsmanager::config::Builder::from(&sdk);
        let mut s3 = aws_sdk_s3::config::Builder::from(&sdk);

        if let Some(endpoint) = &cfg.aws_endpoint_url {
            kms = kms.endpoint_url(endpoint);
            secretsmanager = secretsmanager.endpoint_url(endpoint);
            s3 = s3.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            kms: aws_sdk_kms::Client::from_conf(kms.build()),
            secretsmanager: aws_sdk_secretsmanager::Client::from_conf(secretsmanager.build()),
            s3: aws_sdk_s3::Client::from_conf(s3.build()),
        })
    }
}
