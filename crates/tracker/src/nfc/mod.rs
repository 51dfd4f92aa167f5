//! NFC tag flows.
//!
//! The reader hardware sits behind [`NfcAdapter`]. A flow polls for one tag
//! (bounded by the configured timeout), does its read or write, and always
//! releases the tag session through [`NfcAdapter::finish`] with a success or
//! failure message, whatever happened in between. Nothing is retried; the
//! user presents the card again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::ServiceError;
use thiserror::Error;
use tokio::time;
use tracing::{info, warn};

use crate::attendance::{AttendanceService, MarkOutcome};
use crate::config::Config;
use crate::crypto::{CardCodec, Resolved};

/// A tag presented to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Hardware serial, used as the payload when the tag carries no text.
    pub serial: String,
}

/// One NDEF text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub text: String,
}

impl TextRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Message handed to the reader when a tag session is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    Success(String),
    Failure(String),
}

#[derive(Debug, Error)]
pub enum NfcError {
    #[error("no tag presented within {0:?}")]
    Timeout(Duration),

    #[error("tag is not writable")]
    NotWritable,

    #[error("reader failure: {0}")]
    Platform(String),
}

impl From<NfcError> for ServiceError {
    fn from(err: NfcError) -> Self {
        ServiceError::Nfc(err.to_string())
    }
}

/// Platform NFC reader.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NfcAdapter: Send + Sync {
    /// Wait for a tag. Callers bound this with their own timeout.
    async fn poll(&self) -> Result<Tag, NfcError>;

    async fn read_records(&self, tag: &Tag) -> Result<Vec<TextRecord>, NfcError>;

    async fn write_records(&self, tag: &Tag, records: Vec<TextRecord>) -> Result<(), NfcError>;

    /// Release the tag session.
    async fn finish(&self, outcome: FinishOutcome);
}

/// Card read and write flows over an [`NfcAdapter`].
#[derive(Clone)]
pub struct NfcReader {
    adapter: Arc<dyn NfcAdapter>,
    codec: Arc<CardCodec>,
    poll_timeout: Duration,
}

impl NfcReader {
    pub fn new(adapter: Arc<dyn NfcAdapter>, codec: Arc<CardCodec>, poll_timeout: Duration) -> Self {
        Self {
            adapter,
            codec,
            poll_timeout,
        }
    }

    /// Reader bounded by the configured `NFC_POLL_TIMEOUT_SECS`.
    pub fn from_config(adapter: Arc<dyn NfcAdapter>, codec: Arc<CardCodec>, cfg: &Config) -> Self {
        Self::new(adapter, codec, cfg.nfc_poll_timeout())
    }

    /// Raw payload of the next tag: its first text record, or its serial
    /// when it has none.
    pub async fn read_payload(&self) -> Result<String, ServiceError> {
        let result = self.read_inner().await;
        self.release(&result, "Card read").await;
        Ok(result?)
    }

    /// Read the next tag and resolve it to an identifier, decoding the
    /// payload when it is a wire string.
    pub async fn read_identifier(&self) -> Result<Resolved, ServiceError> {
        let payload = self.read_payload().await?;
        Ok(self.codec.resolve(&payload))
    }

    /// Encode `identifier` and write it to the next tag as a single text
    /// record. Returns the wire string written.
    pub async fn write_identifier(&self, identifier: &str) -> Result<String, ServiceError> {
        let result = self.write_inner(identifier).await;
        self.release(&result, "Card written").await;
        let wire = result?;
        info!(wire_len = wire.len(), "card written");
        Ok(wire)
    }

    /// Read the next tag and mark its holder present in `session_id`.
    ///
    /// Connectivity is checked before the reader is engaged.
    pub async fn scan_and_mark(
        &self,
        service: &AttendanceService,
        session_id: &str,
    ) -> Result<MarkOutcome, ServiceError> {
        service.connectivity().ensure_online()?;
        let resolved = self.read_identifier().await?;
        service.mark_attendance(session_id, &resolved.identifier).await
    }

    async fn poll(&self) -> Result<Tag, NfcError> {
        match time::timeout(self.poll_timeout, self.adapter.poll()).await {
            Ok(tag) => tag,
            Err(_) => Err(NfcError::Timeout(self.poll_timeout)),
        }
    }

    async fn read_inner(&self) -> Result<String, NfcError> {
        let tag = self.poll().await?;
        let records = self.adapter.read_records(&tag).await?;
        Ok(match records.into_iter().next() {
            Some(record) if !record.text.is_empty() => record.text,
            _ => tag.serial,
        })
    }

    async fn write_inner(&self, identifier: &str) -> Result<String, WriteError> {
        let tag = self.poll().await?;
        let wire = self.codec.encode(identifier).map_err(ServiceError::from)?;
        self.adapter
            .write_records(&tag, vec![TextRecord::new(wire.clone())])
            .await?;
        Ok(wire)
    }

    async fn release<T, E: std::fmt::Display>(&self, result: &Result<T, E>, success: &str) {
        let outcome = match result {
            Ok(_) => FinishOutcome::Success(success.to_owned()),
            Err(e) => {
                warn!(error = %e, "nfc flow failed");
                FinishOutcome::Failure(e.to_string())
            }
        };
        self.adapter.finish(outcome).await;
    }
}

/// Failure of the write flow: either the reader or the encoder.
#[derive(Debug, Error)]
enum WriteError {
    #[error(transparent)]
    Nfc(#[from] NfcError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<WriteError> for ServiceError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Nfc(e) => e.into(),
            WriteError::Service(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common::records::AttendanceType;
    use mockall::predicate::eq;

    use super::*;
    use crate::attendance::fixtures::{harness, session_request, student};
    use crate::card_key::CardKey;
    use crate::config::{CardFormat, Config};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn codec() -> Arc<CardCodec> {
        Arc::new(CardCodec::new(CardKey::legacy(), CardFormat::Legacy, false))
    }

    fn tag() -> Tag {
        Tag {
            serial: "04:A2:19:7C".into(),
        }
    }

    fn expect_finish(mock: &mut MockNfcAdapter, success: bool) {
        mock.expect_finish()
            .withf(move |outcome| matches!(outcome, FinishOutcome::Success(_)) == success)
            .times(1)
            .returning(|_| ());
    }

    #[tokio::test]
    async fn read_identifier_decodes_text_record() {
        let codec = codec();
        let wire = codec.encode("DI230101").unwrap();

        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().times(1).returning(|| Ok(tag()));
        mock.expect_read_records()
            .with(eq(tag()))
            .times(1)
            .returning(move |_| Ok(vec![TextRecord::new(wire.clone())]));
        expect_finish(&mut mock, true);

        let reader = NfcReader::new(Arc::new(mock), codec, TIMEOUT);
        let resolved = reader.read_identifier().await.unwrap();
        assert_eq!(resolved.identifier, "DI230101");
        assert!(resolved.decrypted);
    }

    #[tokio::test]
    async fn blank_tag_falls_back_to_serial() {
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_read_records().returning(|_| Ok(Vec::new()));
        expect_finish(&mut mock, true);

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        let resolved = reader.read_identifier().await.unwrap();
        assert_eq!(resolved.identifier, "04:A2:19:7C");
        assert!(!resolved.decrypted);
    }

    #[tokio::test]
    async fn plain_text_record_passes_through() {
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_read_records()
            .returning(|_| Ok(vec![TextRecord::new("DI230101"), TextRecord::new("ignored")]));
        expect_finish(&mut mock, true);

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        assert_eq!(reader.read_payload().await.unwrap(), "DI230101");
    }

    #[tokio::test]
    async fn read_failure_still_finishes() {
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_read_records()
            .returning(|_| Err(NfcError::Platform("tag lost".into())));
        expect_finish(&mut mock, false);

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        let err = reader.read_payload().await.unwrap_err();
        assert!(matches!(err, ServiceError::Nfc(ref m) if m.contains("tag lost")));
    }

    #[tokio::test]
    async fn write_identifier_writes_one_decodable_record() {
        let codec = codec();
        let check = codec.clone();

        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_write_records()
            .withf(move |_, records| {
                records.len() == 1 && check.decode(&records[0].text).ok().as_deref() == Some("DI230101")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        expect_finish(&mut mock, true);

        let reader = NfcReader::new(Arc::new(mock), codec.clone(), TIMEOUT);
        let wire = reader.write_identifier("DI230101").await.unwrap();
        assert_eq!(codec.decode(&wire).unwrap(), "DI230101");
    }

    #[tokio::test]
    async fn write_to_read_only_tag_fails() {
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_write_records()
            .returning(|_, _| Err(NfcError::NotWritable));
        expect_finish(&mut mock, false);

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        assert!(matches!(
            reader.write_identifier("DI230101").await,
            Err(ServiceError::Nfc(_))
        ));
    }

    #[tokio::test]
    async fn encode_failure_aborts_write() {
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_write_records().never();
        expect_finish(&mut mock, false);

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        assert!(reader.write_identifier("").await.is_err());
    }

    /// Adapter whose poll never sees a tag.
    #[derive(Default)]
    struct SilentAdapter {
        finished: Mutex<Vec<FinishOutcome>>,
    }

    #[async_trait]
    impl NfcAdapter for SilentAdapter {
        async fn poll(&self) -> Result<Tag, NfcError> {
            std::future::pending().await
        }
        async fn read_records(&self, _: &Tag) -> Result<Vec<TextRecord>, NfcError> {
            Ok(Vec::new())
        }
        async fn write_records(&self, _: &Tag, _: Vec<TextRecord>) -> Result<(), NfcError> {
            Ok(())
        }
        async fn finish(&self, outcome: FinishOutcome) {
            self.finished.lock().unwrap().push(outcome);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_and_finishes() {
        let adapter = Arc::new(SilentAdapter::default());
        let reader = NfcReader::new(adapter.clone(), codec(), TIMEOUT);

        let err = reader.read_payload().await.unwrap_err();
        assert!(matches!(err, ServiceError::Nfc(ref m) if m.contains("no tag presented")));
        let finished = adapter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0], FinishOutcome::Failure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_poll_timeout_bounds_the_wait() {
        let cfg = Config {
            nfc_poll_timeout_secs: 3,
            ..Config::default()
        };
        let adapter = Arc::new(SilentAdapter::default());
        let reader = NfcReader::from_config(adapter.clone(), codec(), &cfg);

        let started = time::Instant::now();
        assert!(reader.read_payload().await.is_err());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4), "{waited:?}");
        assert_eq!(adapter.finished.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scan_and_mark_records_attendance() {
        let h = harness();
        h.memory.insert_person(&student("u1", "Alice Tan", "DI230101")).await;
        let session = h
            .service
            .create_session(session_request(18, "CS101", AttendanceType::Lecture))
            .await
            .unwrap();

        let codec = codec();
        let wire = codec.encode("DI230101").unwrap();
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().returning(|| Ok(tag()));
        mock.expect_read_records()
            .returning(move |_| Ok(vec![TextRecord::new(wire.clone())]));
        expect_finish(&mut mock, true);

        let reader = NfcReader::new(Arc::new(mock), codec, TIMEOUT);
        let outcome = reader.scan_and_mark(&h.service, &session.id).await.unwrap();
        assert_eq!(outcome.person().name, "Alice Tan");
        assert_eq!(h.memory.marker_count(&session.id).await, 1);
    }

    #[tokio::test]
    async fn scan_and_mark_offline_never_polls() {
        let h = harness();
        h.connectivity.mark_offline("probe failed");
        let mut mock = MockNfcAdapter::new();
        mock.expect_poll().never();
        mock.expect_finish().never();

        let reader = NfcReader::new(Arc::new(mock), codec(), TIMEOUT);
        assert!(matches!(
            reader.scan_and_mark(&h.service, "s1").await,
            Err(ServiceError::Offline)
        ));
    }
}
