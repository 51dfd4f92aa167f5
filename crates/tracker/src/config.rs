//! Configuration loading and validation for the tracker service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;

/// Wire format used when writing new cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardFormat {
    /// `base64(iv):base64(ciphertext)`, AES-256-CBC. Readable by every
    /// deployed reader.
    #[default]
    Legacy,
    /// `v2.<nonce>.<ciphertext+tag>`, AES-256-GCM-SIV.
    V2,
}

impl CardFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardFormat::Legacy => "legacy",
            CardFormat::V2 => "v2",
        }
    }
}

/// Validated tracker service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP server listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Person document field holding the deployment's identifier
    /// (`matricNo`, `icNo`, or `staffNo`).
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// Photo blob category; photos live at `<category>/<id>.jpg`.
    #[serde(default = "default_photo_category")]
    pub photo_category: String,

    /// S3 bucket holding photos. Unset keeps photos in memory.
    #[serde(default)]
    pub photo_bucket: Option<String>,

    /// Lifetime of resolved photo URLs.
    #[serde(default = "default_photo_url_ttl")]
    pub photo_url_ttl_secs: u64,

    /// Endpoint override for all AWS clients (e.g. a local emulator).
    #[serde(default)]
    pub aws_endpoint_url: Option<String>,

    /// Secrets Manager ARN of the envelope-encrypted card key.
    #[serde(default)]
    pub card_key_secret_arn: Option<String>,

    /// KMS key ID used to decrypt the card key.
    #[serde(default)]
    pub card_key_kms_key_id: Option<String>,

    /// Format used for newly written cards.
    #[serde(default)]
    pub card_format: CardFormat,

    /// Randomize the legacy CBC IV per write. Off by default so newly written
    /// cards stay byte-identical to cards written by existing devices.
    #[serde(default)]
    pub card_random_iv: bool,

    /// Number of scan-history entries returned for recent activity.
    #[serde(default = "default_recent_scan_limit")]
    pub recent_scan_limit: usize,

    /// How long an NFC poll waits for a tag. Read by
    /// [`crate::nfc::NfcReader::from_config`]; the HTTP binary takes card
    /// payloads over the wire and drives no reader of its own.
    #[serde(default = "default_nfc_poll_timeout")]
    pub nfc_poll_timeout_secs: u64,

    /// How often (seconds) the backend reachability probe runs.
    #[serde(default = "default_connectivity_probe_interval")]
    pub connectivity_probe_interval_secs: u64,

    /// UTC offset used to format time-of-day strings on markers and scans.
    #[serde(default)]
    pub display_utc_offset_minutes: i32,

    /// OTLP endpoint for span export. Unset disables export.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_port() -> u16 {
    8080
}
fn default_identifier_field() -> String {
    "matricNo".into()
}
fn default_photo_category() -> String {
    "students".into()
}
fn default_photo_url_ttl() -> u64 {
    3600
}
fn default_recent_scan_limit() -> usize {
    15
}
fn default_nfc_poll_timeout() -> u64 {
    10
}
fn default_connectivity_probe_interval() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Offset applied when formatting times of day.
    pub fn display_offset(&self) -> FixedOffset {
        // Validated to lie within ±24h.
        FixedOffset::east_opt(self.display_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn nfc_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.nfc_poll_timeout_secs)
    }

    /// Whether a per-deployment card key is configured.
    pub fn provisioned_card_key(&self) -> Option<(&str, &str)> {
        match (&self.card_key_secret_arn, &self.card_key_kms_key_id) {
            (Some(arn), Some(key_id)) => Some((arn.as_str(), key_id.as_str())),
            _ => None,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.identifier_field, "IDENTIFIER_FIELD")?;
        ensure_non_empty(&self.photo_category, "PHOTO_CATEGORY")?;

        if self.card_key_secret_arn.is_some() != self.card_key_kms_key_id.is_some() {
            anyhow::bail!("CARD_KEY_SECRET_ARN and CARD_KEY_KMS_KEY_ID must be set together");
        }
        if let Some(bucket) = &self.photo_bucket {
            ensure_non_empty(bucket, "PHOTO_BUCKET")?;
        }
        if self.recent_scan_limit == 0 {
            anyhow::bail!("RECENT_SCAN_LIMIT must be > 0");
        }
        if self.nfc_poll_timeout_secs == 0 {
            anyhow::bail!("NFC_POLL_TIMEOUT_SECS must be > 0");
        }
        if self.connectivity_probe_interval_secs == 0 {
            anyhow::bail!("CONNECTIVITY_PROBE_INTERVAL_SECS must be > 0");
        }
        if self.photo_url_ttl_secs == 0 {
            anyhow::bail!("PHOTO_URL_TTL_SECS must be > 0");
        }
        if self.display_utc_offset_minutes.abs() >= 24 * 60 {
            anyhow::bail!("DISPLAY_UTC_OFFSET_MINUTES must lie strictly within ±1440");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            identifier_field: default_identifier_field(),
            photo_category: default_photo_category(),
            photo_bucket: None,
            photo_url_ttl_secs: default_photo_url_ttl(),
            aws_endpoint_url: None,
            card_key_secret_arn: None,
            card_key_kms_key_id: None,
            card_format: CardFormat::default(),
            card_random_iv: false,
            recent_scan_limit: default_recent_scan_limit(),
            nfc_poll_timeout_secs: default_nfc_poll_timeout(),
            connectivity_probe_interval_secs: default_connectivity_probe_interval(),
            display_utc_offset_minutes: 0,
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.identifier_field, "matricNo");
        assert_eq!(cfg.photo_category, "students");
        assert_eq!(cfg.recent_scan_limit, 15);
        assert_eq!(cfg.nfc_poll_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.card_format, CardFormat::Legacy);
        assert!(!cfg.card_random_iv);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_half_configured_card_key() {
        let cfg = Config {
            card_key_secret_arn: Some("arn:aws:secretsmanager:x".into()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_identifier_field() {
        let cfg = Config {
            identifier_field: "  ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_scan_limit() {
        let cfg = Config {
            recent_scan_limit: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn provisioned_key_requires_both_halves() {
        let cfg = Config {
            card_key_secret_arn: Some("arn".into()),
            card_key_kms_key_id: Some("key".into()),
            ..Config::default()
        };
        assert_eq!(cfg.provisioned_card_key(), Some(("arn", "key")));
        assert_eq!(Config::default().provisioned_card_key(), None);
    }

    #[test]
    fn display_offset_uses_minutes() {
        let cfg = Config {
            display_utc_offset_minutes: 480,
            ..Config::default()
        };
        assert_eq!(cfg.display_offset().local_minus_utc(), 8 * 3600);
    }
}
