//! Cryptographic primitives used by the codecs.
//!
//! - SHA-256 digests for integrity checks
//! - A keyed ChaCha20 keystream that encrypts and decrypts in place
//! - Base64 text encoding for identifiers in the metadata file

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher as _};
use sha2::{Digest as _, Sha256};

use crate::Error;

/// Width in bytes of every digest produced by [`digest`].
pub const DIGEST_LEN: usize = 32;

/// A fixed-width SHA-256 digest.
pub type Digest = [u8; DIGEST_LEN];

const NONCE: [u8; 12] = [0; 12];

/// Compute the SHA-256 digest of a buffer.
pub fn digest(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Keyed stream cipher. Applying it twice with the same key is the identity.
#[derive(Clone)]
pub struct StreamCipher {
    key: [u8; 32],
}

impl StreamCipher {
    /// Derive a cipher from caller-supplied key material of any length.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        Ok(Self { key: digest(key) })
    }

    /// Encrypt or decrypt `buf` in place.
    pub fn apply(&self, buf: &mut [u8]) {
        let mut cipher = ChaCha20::new(&self.key.into(), &NONCE.into());
        cipher.apply_keystream(buf);
    }
}

impl std::fmt::Debug for StreamCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCipher").finish_non_exhaustive()
    }
}

/// Encode bytes as single-line base64 text.
pub fn encode_text(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 text produced by [`encode_text`].
pub fn decode_text(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_stability() {
        assert_eq!(digest(b"payload"), digest(b"payload"));
    }

    #[test]
    fn test_digest_detects_single_byte_change() {
        let original = b"23\nfad\0hAppd".to_vec();
        let mut modified = original.clone();
        modified[7] = modified[7].wrapping_add(1);
        assert_ne!(digest(&original), digest(&modified));
    }

    #[test]
    fn test_digest_of_empty_buffer() {
        assert_eq!(hex::encode(digest(b"")), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
    }

    #[test]
    fn test_cipher_round_trip() {
        let cipher = StreamCipher::new(b"dummykey").unwrap();
        let original: Vec<u8> = (0..=255).collect();

        let mut buf = original.clone();
        cipher.apply(&mut buf);
        assert_ne!(buf, original);

        cipher.apply(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_cipher_keys_differ() {
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];
        StreamCipher::new(b"first").unwrap().apply(&mut a);
        StreamCipher::new(b"second").unwrap().apply(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cipher_rejects_empty_key() {
        assert!(matches!(StreamCipher::new(b""), Err(Error::EmptyKey)));
    }

    #[test]
    fn test_cipher_debug_hides_key() {
        let cipher = StreamCipher::new(b"secret").unwrap();
        assert!(!format!("{cipher:?}").contains("secret"));
    }

    #[test]
    fn test_text_encoding() {
        let bytes = [0u8, 1, 2, 253, 254, 255];
        let text = encode_text(&bytes);
        assert!(!text.contains(char::is_whitespace));
        assert_eq!(decode_text(&text).unwrap(), bytes);
    }

    #[test]
    fn test_text_decoding_rejects_garbage() {
        assert!(decode_text("not base64!").is_err());
    }
}
