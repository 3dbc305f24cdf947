//! On-disk representation of a single cached object.
//!
//! A file holds `encrypt(digest(value) || id || value)` and is named after
//! the hex of the identifier, so distinct identifiers never share a file.

use super::ObjectId;
use crate::IntegrityError;
use crate::crypto::{DIGEST_LEN, StreamCipher, digest};

/// Extension of every object file.
pub const OBJECT_EXTENSION: &str = ".CDF";

/// File name of the object stored under `id`.
pub fn file_name(id: &ObjectId) -> String {
    format!("{}{OBJECT_EXTENSION}", id.to_hex())
}

/// Recover the identifier from an object file name, if it is one.
pub fn id_from_file_name(name: &str) -> Option<ObjectId> {
    let stem = name.strip_suffix(OBJECT_EXTENSION)?;
    if stem.is_empty() {
        return None;
    }
    ObjectId::from_hex(stem).ok()
}

/// Build the encrypted file contents for `value`.
pub fn encode(cipher: &StreamCipher, id: &ObjectId, value: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(DIGEST_LEN + id.len() + value.len());
    buf.extend_from_slice(&digest(value));
    buf.extend_from_slice(id.as_bytes());
    buf.extend_from_slice(value);
    cipher.apply(&mut buf);
    buf
}

/// Decrypt and verify file contents read back for `id`.
pub fn decode(cipher: &StreamCipher, id: &ObjectId, mut raw: Vec<u8>) -> Result<Vec<u8>, IntegrityError> {
    let header = DIGEST_LEN + id.len();
    if raw.len() < header {
        return Err(IntegrityError::Truncated { len: raw.len(), needed: header });
    }

    cipher.apply(&mut raw);

    if &raw[DIGEST_LEN..header] != id.as_bytes() {
        return Err(IntegrityError::IdMismatch);
    }

    let value = raw.split_off(header);
    if raw[..DIGEST_LEN] != digest(&value) {
        return Err(IntegrityError::HashMismatch);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> StreamCipher {
        StreamCipher::new(b"dummykey").unwrap()
    }

    #[test]
    fn test_file_name() {
        let id = ObjectId::new(vec![0x00, 0x1f, 0xab]);
        assert_eq!(file_name(&id), "001fab.CDF");
        assert_eq!(id_from_file_name("001fab.CDF"), Some(id));
    }

    #[test]
    fn test_id_from_foreign_file_names() {
        assert_eq!(id_from_file_name("cache.db"), None);
        assert_eq!(id_from_file_name(".CDF"), None);
        assert_eq!(id_from_file_name("xyz.CDF"), None);
        assert_eq!(id_from_file_name("001fab.CDF.tmp"), None);
    }

    #[test]
    fn test_decode_encoded() {
        let id = ObjectId::from("object-1");
        let raw = encode(&cipher(), &id, b"some value");

        assert_eq!(raw.len(), DIGEST_LEN + id.len() + 10);
        assert_eq!(decode(&cipher(), &id, raw).unwrap(), b"some value");
    }

    #[test]
    fn test_payload_is_not_plaintext() {
        let id = ObjectId::from("object-1");
        let raw = encode(&cipher(), &id, b"plaintext marker");
        assert!(!raw.windows(16).any(|w| w == b"plaintext marker"));
        assert!(!raw.windows(8).any(|w| w == b"object-1"));
    }

    #[test]
    fn test_empty_value() {
        let id = ObjectId::from("empty");
        let raw = encode(&cipher(), &id, b"");
        assert_eq!(decode(&cipher(), &id, raw).unwrap(), b"");
    }

    #[test]
    fn test_truncated() {
        let id = ObjectId::from("object-1");
        let mut raw = encode(&cipher(), &id, b"value");
        raw.truncate(DIGEST_LEN + 3);

        let err = decode(&cipher(), &id, raw).unwrap_err();
        assert_eq!(err, IntegrityError::Truncated { len: DIGEST_LEN + 3, needed: DIGEST_LEN + 8 });
    }

    #[test]
    fn test_identifier_substitution() {
        let stored = ObjectId::from("object-A");
        let requested = ObjectId::from("object-B");
        let raw = encode(&cipher(), &stored, b"value");

        assert_eq!(decode(&cipher(), &requested, raw).unwrap_err(), IntegrityError::IdMismatch);
    }

    #[test]
    fn test_every_flipped_byte_is_detected() {
        let id = ObjectId::from("id");
        let raw = encode(&cipher(), &id, b"tamper me");

        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            assert!(decode(&cipher(), &id, tampered).is_err(), "flip at {i} went unnoticed");
        }
    }

    #[test]
    fn test_wrong_key() {
        let id = ObjectId::from("id");
        let raw = encode(&cipher(), &id, b"value");
        let other = StreamCipher::new(b"other key").unwrap();
        assert!(decode(&other, &id, raw).is_err());
    }
}
