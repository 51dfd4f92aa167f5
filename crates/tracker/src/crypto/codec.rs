//! [`CardCodec`]: identifier ⇄ tag-writable wire string.

use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};
use tracing::debug;

use super::{cipher, legacy, CodecError};
use crate::card_key::CardKey;
use crate::config::CardFormat;

/// Outcome of resolving a raw tag payload to an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub identifier: String,
    /// `false` when the payload was not a decodable wire string and was
    /// taken verbatim.
    pub decrypted: bool,
}

/// Encodes identifiers for writing to cards and decodes what readers return.
///
/// Decoding accepts both wire formats regardless of which one is configured
/// for writing.
#[derive(Debug, Clone)]
pub struct CardCodec {
    key: CardKey,
    format: CardFormat,
    random_iv: bool,
}

impl CardCodec {
    pub fn new(key: CardKey, format: CardFormat, random_iv: bool) -> Self {
        Self {
            key,
            format,
            random_iv,
        }
    }

    pub fn format(&self) -> CardFormat {
        self.format
    }

    /// Encode a plaintext identifier.
    ///
    /// Legacy writes use an all-zero IV unless random IVs are enabled, so
    /// the same identifier always produces the same card payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EmptyPlaintext`] for an empty identifier and
    /// [`CodecError::Cipher`] if the cipher cannot be initialised. Either is
    /// fatal to the card write.
    pub fn encode(&self, plaintext: &str) -> Result<String, CodecError> {
        if plaintext.is_empty() {
            return Err(CodecError::EmptyPlaintext);
        }
        match self.format {
            CardFormat::Legacy => {
                let mut iv = legacy::ZERO_IV;
                if self.random_iv {
                    OsRng.fill_bytes(&mut iv);
                }
                legacy::encrypt(plaintext.as_bytes(), &self.key, &iv)
            }
            CardFormat::V2 => Ok(cipher::seal(plaintext.as_bytes(), &self.key)?.to_wire()),
        }
    }

    /// Decode a wire string back to the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] for strings that are not wire
    /// strings, and [`CodecError::Decryption`] / [`CodecError::InvalidUtf8`]
    /// when the ciphertext does not decrypt under this key.
    pub fn decode(&self, wire: &str) -> Result<String, CodecError> {
        let plaintext = if cipher::SealedPayload::is_sealed(wire) {
            cipher::open(&cipher::SealedPayload::parse(wire)?, &self.key)?
        } else {
            let (iv, ciphertext) = legacy::parse(wire)?;
            legacy::decrypt(&iv, &ciphertext, &self.key)?
        };
        String::from_utf8(plaintext).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Decode `raw`, falling back to `raw` itself when it is not a decodable
    /// wire string. Never fails: bare identifiers and tag serials pass
    /// through unchanged.
    pub fn resolve(&self, raw: &str) -> Resolved {
        match self.decode(raw) {
            Ok(identifier) if !identifier.is_empty() => Resolved {
                identifier,
                decrypted: true,
            },
            Ok(_) => Resolved {
                identifier: raw.to_owned(),
                decrypted: false,
            },
            Err(e) => {
                debug!(reason = %e, "card payload not decodable; using raw payload");
                Resolved {
                    identifier: raw.to_owned(),
                    decrypted: false,
                }
            }
        }
    }
}
