//! Card-key provisioning.
//!
//! By default the codec uses the built-in legacy key so that every card
//! already in circulation keeps decoding. A deployment may instead provision
//! its own key: the envelope-encrypted key is fetched from AWS Secrets
//! Manager and decrypted via AWS KMS once at startup.
//!
//! # Security invariants
//!
//! - Key material is never written to disk, logged, or included in traces.
//! - Keys are not rotated in place: every card written under a key must stay
//!   readable, so changing the key is a card migration, not a refresh.

pub mod key;

pub use key::{CardKey, CardKeyError, KEY_LEN};

use anyhow::{Context, Result};
use tracing::info;

use crate::aws::AwsClients;
use crate::config::Config;

/// Resolve the key the codec should use for this deployment.
///
/// # Errors
///
/// Returns an error if a key is configured but cannot be fetched or decrypted.
pub async fn load(aws: Option<&AwsClients>, cfg: &Config) -> Result<CardKey> {
    match (cfg.provisioned_card_key(), aws) {
        (Some((secret_arn, kms_key_id)), Some(aws)) => {
            fetch(aws, secret_arn, kms_key_id).await
        }
        (Some(_), None) => anyhow::bail!("card key is configured but AWS clients are unavailable"),
        (None, _) => {
            info!("using built-in card key");
            Ok(CardKey::legacy())
        }
    }
}

/// Fetch the envelope-encrypted card key from Secrets Manager and decrypt it
/// via KMS.
///
/// # Errors
///
/// Returns an error if the Secrets Manager call fails, if KMS decryption fails,
/// or if the decrypted key material is not exactly 32 bytes.
pub async fn fetch(aws: &AwsClients, secret_arn: &str, kms_key_id: &str) -> Result<CardKey> {
    let secret = aws
        .secretsmanager
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .context("failed to fetch card key from Secrets Manager")?;

    let ciphertext_bytes = secret
        .secret_binary()
        .context("card key secret must be stored as binary in Secrets Manager")?
        .as_ref()
        .to_vec();

    let decrypt_resp = aws
        .kms
        .decrypt()
        .key_id(kms_key_id)
        .ciphertext_blob(aws_sdk_kms::primitives::Blob::new(ciphertext_bytes))
        .send()
        .await
        .context("failed to decrypt card key via KMS")?;

    let plaintext = decrypt_resp
        .plaintext()
        .context("KMS decrypt response contained no plaintext")?;

    let key = CardKey::from_slice(plaintext.as_ref())
        .context("decrypted card key has an unexpected length")?;

    info!("provisioned card key loaded");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_legacy_key() {
        let key = load(None, &Config::default()).await.unwrap();
        assert_eq!(key.as_bytes(), CardKey::legacy().as_bytes());
    }

    #[tokio::test]
    async fn configured_key_without_aws_is_an_error() {
        let cfg = Config {
            card_key_secret_arn: Some("arn".into()),
            card_key_kms_key_id: Some("key".into()),
            ..Config::default()
        };
        assert!(load(None, &cfg).await.is_err());
    }
}
