use crate::types::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content fingerprint of a dataset.
///
/// Equal datasets (same rows, same order, same cells) always produce the
/// same version; any cell edit, insertion, removal or reordering changes
/// it. Cached results are stale once it changes; the index additionally
/// tracks its build settings (see `IndexStamp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataVersion(u64);

impl DataVersion {
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Fingerprints `rows` with BLAKE3, keeping the first 8 bytes.
    ///
    /// Every cell is framed by a presence flag and a length so that
    /// `["ab", "c"]` and `["a", "bc"]` hash differently.
    pub fn of<R: Row>(rows: &[R]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(rows.len() as u64).to_le_bytes());

        for (index, row) in rows.iter().enumerate() {
            let columns = row.column_count();
            hasher.update(&(index as u64).to_le_bytes());
            hasher.update(&(columns as u64).to_le_bytes());

            for column in 0..columns {
                match row.column_value(column) {
                    Some(cell) => {
                        hasher.update(&[1]);
                        hasher.update(&(cell.len() as u64).to_le_bytes());
                        hasher.update(cell.as_bytes());
                    }
                    None => {
                        hasher.update(&[0]);
                    }
                }
            }
        }

        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }
}

impl fmt::Display for DataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
