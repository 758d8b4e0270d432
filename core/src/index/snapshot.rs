use crate::index::IndexFiles;
use crate::index::error::IndexError;
use crate::index::format::{
    self, DictionaryEntry, HEADER_LEN, IndexStamp, POSTINGS_MAGIC, ROW_REF_LEN,
};
use crate::types::{DataVersion, RowRef, RowSet};
use memmap2::Mmap;
use std::fs::File;
use std::iter::FusedIterator;
use std::slice::ChunksExact;

/// One committed index generation, immutable once loaded.
///
/// The dictionary is held in memory for binary search; postings stay on
/// disk behind a read-only memory map.
pub struct IndexSnapshot {
    entries: Vec<DictionaryEntry>,
    postings: Mmap,
    stamp: IndexStamp,
}

impl IndexSnapshot {
    /// Loads and validates the committed files in `files`.
    pub(crate) fn open(files: &IndexFiles) -> Result<Self, IndexError> {
        let meta_stamp = format::read_meta(&files.meta())?;

        let dictionary = std::fs::read(files.dictionary())?;
        let (dictionary_stamp, entries) = format::decode_dictionary(&dictionary)?;

        let file = File::open(files.postings())?;
        // SAFETY: index files are only ever replaced by rename, never written
        // in place, so the mapped inode is not mutated underneath us.
        let postings = unsafe { Mmap::map(&file)? };
        let postings_stamp = format::decode_header(&postings, POSTINGS_MAGIC, "postings")?;

        if meta_stamp != dictionary_stamp || meta_stamp != postings_stamp {
            return Err(IndexError::Corrupt(format!(
                "stamp mismatch: meta={meta_stamp}, dictionary={dictionary_stamp}, postings={postings_stamp}"
            )));
        }

        let body = postings.len() - HEADER_LEN;
        if body % ROW_REF_LEN != 0 {
            return Err(IndexError::Corrupt("postings: truncated row ref".into()));
        }
        format::validate_dictionary(&entries, (body / ROW_REF_LEN) as u64)?;

        Ok(Self {
            entries,
            postings,
            stamp: meta_stamp,
        })
    }

    pub fn version(&self) -> DataVersion {
        self.stamp.version
    }

    /// Data version and settings fingerprint this generation was built for.
    pub fn stamp(&self) -> IndexStamp {
        self.stamp
    }

    /// Dictionary entries in ascending token order.
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn token_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of row refs across all postings lists.
    pub fn postings_len(&self) -> usize {
        (self.postings.len() - HEADER_LEN) / ROW_REF_LEN
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.find(token).is_some()
    }

    /// Postings list of `entry`, ascending and duplicate-free.
    pub fn postings(&self, entry: &DictionaryEntry) -> Postings<'_> {
        let start = HEADER_LEN + entry.offset as usize * ROW_REF_LEN;
        let end = start + entry.count as usize * ROW_REF_LEN;
        let bytes = self.postings.get(start..end).unwrap_or_default();
        Postings {
            chunks: bytes.chunks_exact(ROW_REF_LEN),
        }
    }

    pub fn lookup_exact(&self, token: &str) -> Option<Postings<'_>> {
        self.find(token).map(|entry| self.postings(entry))
    }

    /// Every dictionary entry whose token starts with `prefix`, in token order.
    pub fn lookup_prefix<'s>(
        &'s self,
        prefix: &'s str,
    ) -> impl Iterator<Item = (&'s DictionaryEntry, Postings<'s>)> + 's {
        let start = self
            .entries
            .partition_point(|entry| entry.token.as_str() < prefix);
        self.entries[start..]
            .iter()
            .take_while(move |entry| entry.token.starts_with(prefix))
            .map(move |entry| (entry, self.postings(entry)))
    }

    /// Rows of the exact token as a set. Empty if the token is unknown.
    pub fn exact_rows(&self, token: &str) -> RowSet {
        self.lookup_exact(token)
            .map(Iterator::collect)
            .unwrap_or_default()
    }

    fn find(&self, token: &str) -> Option<&DictionaryEntry> {
        self.entries
            .binary_search_by(|entry| entry.token.as_str().cmp(token))
            .ok()
            .map(|index| &self.entries[index])
    }
}

/// Iterator over one postings list.
#[derive(Clone, Debug)]
pub struct Postings<'a> {
    chunks: ChunksExact<'a, u8>,
}

impl Iterator for Postings<'_> {
    type Item = RowRef;

    fn next(&mut self) -> Option<RowRef> {
        self.chunks.next().map(|chunk| {
            let mut bytes = [0u8; ROW_REF_LEN];
            bytes.copy_from_slice(chunk);
            RowRef::from_le_bytes(bytes)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Postings<'_> {}

impl FusedIterator for Postings<'_> {}
