//! Persisted index of cached objects.
//!
//! An empty index is stored as an empty file. Otherwise the file holds
//! `encrypt(digest(body) || body)`, where `body` repeats
//! `"<written_at micros> <size> <base64 id> "` per entry, oldest first.

use chrono::{DateTime, Utc};

use super::ObjectId;
use crate::IntegrityError;
use crate::crypto::{self, DIGEST_LEN, StreamCipher, digest};

/// File name of the metadata file inside the cache directory.
pub const METADATA_FILE: &str = "cache.db";

/// One persisted index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub written_at: DateTime<Utc>,
    pub size: u64,
    pub id: ObjectId,
}

/// Records recovered from a metadata file.
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<Record>,
    /// False when parsing stopped at a malformed record.
    pub complete: bool,
}

/// Serialize records, which must already be in ascending write order.
pub fn encode<'a>(
    cipher: &StreamCipher, records: impl IntoIterator<Item = (&'a ObjectId, DateTime<Utc>, u64)>,
) -> Vec<u8> {
    let mut body = String::new();
    for (id, written_at, size) in records {
        body.push_str(&written_at.timestamp_micros().to_string());
        body.push(' ');
        body.push_str(&size.to_string());
        body.push(' ');
        body.push_str(&crypto::encode_text(id.as_bytes()));
        body.push(' ');
    }
    if body.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(DIGEST_LEN + body.len());
    out.extend_from_slice(&digest(body.as_bytes()));
    out.extend_from_slice(body.as_bytes());
    cipher.apply(&mut out);
    out
}

/// Verify and parse a metadata file.
///
/// An empty file decodes to no records. Parsing stops at the first malformed
/// record and keeps everything before it.
pub fn decode(cipher: &StreamCipher, mut raw: Vec<u8>) -> Result<Decoded, IntegrityError> {
    if raw.is_empty() {
        return Ok(Decoded { records: Vec::new(), complete: true });
    }
    if raw.len() <= DIGEST_LEN {
        return Err(IntegrityError::Truncated { len: raw.len(), needed: DIGEST_LEN + 1 });
    }

    cipher.apply(&mut raw);
    let body = raw.split_off(DIGEST_LEN);
    if raw != digest(&body) {
        return Err(IntegrityError::HashMismatch);
    }

    Ok(parse_body(&String::from_utf8_lossy(&body)))
}

fn parse_body(body: &str) -> Decoded {
    let mut records = Vec::new();
    let mut tokens = body.split_ascii_whitespace();

    loop {
        let Some(first) = tokens.next() else {
            return Decoded { records, complete: true };
        };
        match parse_record(first, tokens.next(), tokens.next()) {
            Some(record) => records.push(record),
            None => {
                tracing::warn!(parsed = records.len(), "Malformed metadata record; keeping entries parsed so far");
                return Decoded { records, complete: false };
            }
        }
    }
}

fn parse_record(written_at: &str, size: Option<&str>, id: Option<&str>) -> Option<Record> {
    let written_at = DateTime::<Utc>::from_timestamp_micros(written_at.parse().ok()?)?;
    let size = size?.parse().ok()?;
    let id = crypto::decode_text(id?).ok()?;
    if id.is_empty() {
        return None;
    }
    Some(Record { written_at, size, id: ObjectId::new(id) })
}
