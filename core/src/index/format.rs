//! On-disk layout.
//!
//! ```text
//! postings.bin    magic "SFPS" | u32 format | u64 version | u64 settings | u32 row refs (LE) ...
//! dictionary.bin  magic "SFDI" | u32 format | u64 version | u64 settings | postcard Vec<DictionaryEntry>
//! meta.version    decimal data version, then decimal settings fingerprint, one per line
//! ```
//!
//! A dictionary entry's `offset` and `count` are measured in row refs from
//! the end of the postings header.

use crate::index::error::IndexError;
use crate::types::DataVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub(crate) const POSTINGS_MAGIC: [u8; 4] = *b"SFPS";
pub(crate) const DICTIONARY_MAGIC: [u8; 4] = *b"SFDI";
pub(crate) const FORMAT_VERSION: u32 = 2;
pub(crate) const HEADER_LEN: usize = 24;
pub(crate) const ROW_REF_LEN: usize = 4;

/// Identity of one committed index generation.
///
/// `settings` fingerprints everything besides the rows that decides which
/// tokens land in the index: the normalizer settings and which columns are
/// opaque. An index is only current when both halves match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexStamp {
    pub version: DataVersion,
    pub settings: u64,
}

impl fmt::Display for IndexStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:016x}", self.version, self.settings)
    }
}

/// One dictionary token and the location of its postings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub token: String,
    pub offset: u64,
    pub count: u32,
}

pub(crate) fn encode_header(magic: [u8; 4], stamp: IndexStamp) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&magic);
    header[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[8..16].copy_from_slice(&stamp.version.as_u64().to_le_bytes());
    header[16..].copy_from_slice(&stamp.settings.to_le_bytes());
    header
}

pub(crate) fn decode_header(
    bytes: &[u8],
    magic: [u8; 4],
    file: &str,
) -> Result<IndexStamp, IndexError> {
    let Some(header) = bytes.get(..HEADER_LEN) else {
        return Err(IndexError::Corrupt(format!("{file}: truncated header")));
    };
    if header[..4] != magic {
        return Err(IndexError::Corrupt(format!("{file}: bad magic")));
    }

    let mut format = [0u8; 4];
    format.copy_from_slice(&header[4..8]);
    let format = u32::from_le_bytes(format);
    if format != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "{file}: unsupported format {format}"
        )));
    }

    Ok(IndexStamp {
        version: DataVersion::from_u64(read_u64(&header[8..16])),
        settings: read_u64(&header[16..]),
    })
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

pub(crate) fn encode_dictionary(
    entries: &[DictionaryEntry],
    stamp: IndexStamp,
) -> Result<Vec<u8>, IndexError> {
    let body = postcard::to_allocvec(entries).map_err(IndexError::Encode)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&encode_header(DICTIONARY_MAGIC, stamp));
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub(crate) fn decode_dictionary(
    bytes: &[u8],
) -> Result<(IndexStamp, Vec<DictionaryEntry>), IndexError> {
    let stamp = decode_header(bytes, DICTIONARY_MAGIC, "dictionary")?;
    let entries = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(IndexError::Decode)?;
    Ok((stamp, entries))
}

pub(crate) fn meta_contents(stamp: IndexStamp) -> String {
    format!("{}\n{}\n", stamp.version, stamp.settings)
}

pub(crate) fn read_meta(path: &Path) -> Result<IndexStamp, IndexError> {
    let content = std::fs::read_to_string(path)?;
    let mut lines = content.lines().map(str::trim);
    let mut field = |name: &str| -> Result<u64, IndexError> {
        lines
            .next()
            .ok_or_else(|| IndexError::Corrupt(format!("meta: missing {name}")))?
            .parse::<u64>()
            .map_err(|e| IndexError::Corrupt(format!("meta: {name}: {e}")))
    };

    Ok(IndexStamp {
        version: DataVersion::from_u64(field("version")?),
        settings: field("settings")?,
    })
}

/// Checks dictionary order and that every postings range is in bounds.
pub(crate) fn validate_dictionary(
    entries: &[DictionaryEntry],
    postings_len: u64,
) -> Result<(), IndexError> {
    for pair in entries.windows(2) {
        if pair[0].token >= pair[1].token {
            return Err(IndexError::Corrupt(format!(
                "dictionary out of order at {:?}",
                pair[1].token
            )));
        }
    }

    for entry in entries {
        let end = entry.offset.checked_add(u64::from(entry.count));
        if entry.count == 0 || end.is_none_or(|end| end > postings_len) {
            return Err(IndexError::Corrupt(format!(
                "postings range of {:?} out of bounds",
                entry.token
            )));
        }
    }

    Ok(())
}
