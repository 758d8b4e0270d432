//! Persistent inverted index.
//!
//! The builder writes a sorted token dictionary and a flat postings file
//! for one dataset version, commits them atomically, and publishes an
//! immutable [`IndexSnapshot`] through the [`IndexStore`]. Readers hold an
//! `Arc` to the snapshot they started with, so a rebuild never disturbs a
//! query in flight.

mod builder;
mod format;
mod snapshot;
mod store;

pub use format::{DictionaryEntry, IndexStamp};
pub use snapshot::{IndexSnapshot, Postings};
pub use store::{IndexStats, IndexStore};

use std::path::{Path, PathBuf};

pub mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum IndexError {
        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Failed to commit {file}: {source}")]
        Commit {
            file: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("Dictionary encoding failed: {0}")]
        Encode(#[source] postcard::Error),
        #[error("Dictionary decoding failed: {0}")]
        Decode(#[source] postcard::Error),
        #[error("Index files are corrupt: {0}")]
        Corrupt(String),
        #[error("Dataset has more rows than a row reference can address")]
        TooManyRows,
    }
}

/// Paths of the three files making up one committed index.
#[derive(Clone, Debug)]
pub struct IndexFiles {
    dir: PathBuf,
}

impl IndexFiles {
    pub const DICTIONARY: &'static str = "dictionary.bin";
    pub const POSTINGS: &'static str = "postings.bin";
    pub const META: &'static str = "meta.version";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dictionary(&self) -> PathBuf {
        self.dir.join(Self::DICTIONARY)
    }

    pub fn postings(&self) -> PathBuf {
        self.dir.join(Self::POSTINGS)
    }

    pub fn meta(&self) -> PathBuf {
        self.dir.join(Self::META)
    }

    /// Staging path a file is written to before the commit rename.
    pub(crate) fn staging(path: &Path) -> PathBuf {
        with_suffix(path, ".tmp")
    }

    /// Where the live file is kept while a commit is in progress.
    pub(crate) fn backup(path: &Path) -> PathBuf {
        with_suffix(path, ".prev")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Whether a column header marks an opaque column, one whose cells are
/// never indexed or scored.
pub fn is_opaque_column(header: &str, markers: &[String]) -> bool {
    let header = header.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && header.contains(&marker.to_lowercase()))
}

#[cfg(test)]
mod tests;
