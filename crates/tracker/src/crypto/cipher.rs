//! Authenticated card payloads: AES-256-GCM-SIV.
//!
//! AES-GCM-SIV is nonce-misuse-resistant, so a reader with a weak RNG cannot
//! break confidentiality or authentication by repeating a nonce. Each payload
//! carries its own random 96-bit nonce.

use aes_gcm_siv::{
    aead::{Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use super::CodecError;
use crate::card_key::CardKey;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Prefix that appears at the start of every authenticated payload.
pub const VERSION_PREFIX: &str = "v2";

/// A parsed, authenticated card payload.
///
/// The string representation is `v2.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl SealedPayload {
    /// Encode this value to its canonical string representation.
    pub fn to_wire(&self) -> String {
        format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }

    /// Whether `wire` claims to be an authenticated payload.
    pub fn is_sealed(wire: &str) -> bool {
        wire.strip_prefix(VERSION_PREFIX)
            .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Parse a `v2.<nonce>.<ciphertext>` string.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidFormat`] if the string does not match the
    /// expected structure.
    pub fn parse(wire: &str) -> Result<Self, CodecError> {
        let parts: Vec<&str> = wire.splitn(3, '.').collect();
        if parts.len() != 3 || parts[0] != VERSION_PREFIX {
            return Err(CodecError::InvalidFormat("expected v2.<nonce>.<ciphertext>"));
        }
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CodecError::InvalidFormat("nonce is not base64url"))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CodecError::InvalidFormat("nonce has the wrong length"))?;

        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CodecError::InvalidFormat("ciphertext is not base64url"))?;

        Ok(Self { nonce, ciphertext })
    }
}

/// Encrypt and authenticate `plaintext` under a fresh random nonce.
///
/// # Errors
///
/// Returns [`CodecError::Cipher`] on an internal AEAD error (unreachable with
/// a valid key).
pub fn seal(plaintext: &[u8], key: &CardKey) -> Result<SealedPayload, CodecError> {
    let cipher = build_cipher(key)?;

    use aes_gcm_siv::aead::rand_core::RngCore;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CodecError::Cipher("aead encryption failed"))?;

    Ok(SealedPayload {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Verify and decrypt a [`SealedPayload`].
///
/// # Errors
///
/// Returns [`CodecError::Decryption`] if authentication fails (wrong key or
/// tampered data).
pub fn open(payload: &SealedPayload, key: &CardKey) -> Result<Vec<u8>, CodecError> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(&payload.nonce);
    cipher
        .decrypt(nonce, payload.ciphertext.as_ref())
        .map_err(|_| CodecError::Decryption)
}

fn build_cipher(key: &CardKey) -> Result<Aes256GcmSiv, CodecError> {
    Aes256GcmSiv::new_from_slice(key.as_bytes())
        .map_err(|_| CodecError::Cipher("invalid key length"))
}
