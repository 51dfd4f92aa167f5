//! The original card wire format: AES-256-CBC with PKCS#7 padding.
//!
//! ```text
//! base64(iv) ":" base64(ciphertext)
//! ```
//!
//! Standard base64 with padding. There is no authentication tag, so a
//! modified card either fails to unpad or decodes to a different string.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::CodecError;
use crate::card_key::CardKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Byte length of a CBC initialisation vector.
pub const IV_LEN: usize = 16;

/// AES block size; every ciphertext is a whole number of blocks.
const BLOCK_LEN: usize = 16;

/// IV written by existing card writers.
pub const ZERO_IV: [u8; IV_LEN] = [0u8; IV_LEN];

/// Encrypt `plaintext` and render it as a wire string.
pub fn encrypt(plaintext: &[u8], key: &CardKey, iv: &[u8; IV_LEN]) -> Result<String, CodecError> {
    let ciphertext = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CodecError::Cipher("invalid key or iv length"))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(format!("{}:{}", STANDARD.encode(iv), STANDARD.encode(ciphertext)))
}

/// Split a wire string on its first `:` and base64-decode both halves.
///
/// # Errors
///
/// Returns [`CodecError::InvalidFormat`] unless the split yields two non-empty
/// parts that decode to a 16-byte IV and a block-aligned ciphertext.
pub fn parse(wire: &str) -> Result<([u8; IV_LEN], Vec<u8>), CodecError> {
    let (iv_part, ct_part) = wire
        .split_once(':')
        .filter(|(iv, ct)| !iv.is_empty() && !ct.is_empty())
        .ok_or(CodecError::InvalidFormat("expected <iv>:<ciphertext>"))?;

    let iv: [u8; IV_LEN] = STANDARD
        .decode(iv_part)
        .map_err(|_| CodecError::InvalidFormat("iv is not base64"))?
        .try_into()
        .map_err(|_| CodecError::InvalidFormat("iv must be 16 bytes"))?;

    let ciphertext = STANDARD
        .decode(ct_part)
        .map_err(|_| CodecError::InvalidFormat("ciphertext is not base64"))?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CodecError::InvalidFormat("ciphertext is not block aligned"));
    }

    Ok((iv, ciphertext))
}

/// Decrypt a parsed wire string.
///
/// # Errors
///
/// Returns [`CodecError::Decryption`] on bad padding (which includes most
/// wrong-key cases).
pub fn decrypt(iv: &[u8; IV_LEN], ciphertext: &[u8], key: &CardKey) -> Result<Vec<u8>, CodecError> {
    Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CodecError::Cipher("invalid key or iv length"))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CodecError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iv_is_visible_on_the_wire() {
        let wire = encrypt(b"DI230101", &CardKey::legacy(), &ZERO_IV).unwrap();
        let (iv, ct) = wire.split_once(':').unwrap();
        assert_eq!(iv, "AAAAAAAAAAAAAAAAAAAAAA==");
        // 8 bytes of plaintext pad to a single block.
        assert_eq!(STANDARD.decode(ct).unwrap().len(), 16);
    }

    #[test]
    fn block_aligned_plaintext_gains_a_full_padding_block() {
        let wire = encrypt(&[b'x'; 16], &CardKey::legacy(), &ZERO_IV).unwrap();
        let (_, ct) = parse(&wire).unwrap();
        assert_eq!(ct.len(), 32);
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = CardKey::legacy();
        let iv = [9u8; IV_LEN];
        let wire = encrypt("Ünïcode-ID".as_bytes(), &key, &iv).unwrap();
        let (parsed_iv, ct) = parse(&wire).unwrap();
        assert_eq!(parsed_iv, iv);
        assert_eq!(decrypt(&parsed_iv, &ct, &key).unwrap(), "Ünïcode-ID".as_bytes());
    }

    #[test]
    fn parse_splits_on_first_colon_only() {
        // A second colon lands in the ciphertext half and breaks base64.
        assert!(matches!(
            parse("AAAAAAAAAAAAAAAAAAAAAA==:abc:def"),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(parse("no-colon-here").is_err());
        assert!(parse(":AAAA").is_err());
        assert!(parse("AAAAAAAAAAAAAAAAAAAAAA==:").is_err());
    }

    #[test]
    fn parse_rejects_short_iv() {
        assert!(parse("AAAA:AAAAAAAAAAAAAAAAAAAAAA==").is_err());
    }
}
