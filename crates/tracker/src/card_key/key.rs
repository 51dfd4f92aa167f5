//! [`CardKey`]: the 32-byte symmetric key protecting card payloads.

use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Key compiled into every reader and writer that predates per-deployment
/// provisioning. Cards written with it must keep decoding.
const LEGACY_KEY: &[u8; KEY_LEN] = b"nfc-attendance-card-key-00000001";

/// Errors produced by the card-key layer.
#[derive(Debug, Error)]
pub enum CardKeyError {
    /// The key material has an unexpected length.
    #[error("card key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// The memory is overwritten with zeroes on drop.
#[derive(Clone)]
pub struct CardKey(Box<[u8; KEY_LEN]>);

impl CardKey {
    /// The built-in key shared by all existing cards.
    pub fn legacy() -> Self {
        Self(Box::new(*LEGACY_KEY))
    }

    /// Copy key material from a slice.
    ///
    /// # Errors
    ///
    /// Returns [`CardKeyError::InvalidLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CardKeyError> {
        if bytes.len() != KEY_LEN {
            return Err(CardKeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for CardKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for CardKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CardKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_key_is_32_utf8_bytes() {
        let key = CardKey::legacy();
        assert_eq!(key.as_bytes().len(), KEY_LEN);
        assert!(std::str::from_utf8(key.as_bytes()).is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            CardKey::from_slice(&[0u8; 16]),
            Err(CardKeyError::InvalidLength(16))
        ));
    }

    #[test]
    fn from_slice_copies_material() {
        let key = CardKey::from_slice(&[0x42u8; KEY_LEN]).unwrap();
        assert_eq!(key.as_bytes(), &[0x42u8; KEY_LEN]);
    }

    #[test]
    fn redacted_in_debug() {
        assert!(format!("{:?}", CardKey::legacy()).contains("REDACTED"));
    }
}
