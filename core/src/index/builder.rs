use crate::index::error::IndexError;
use crate::index::format::{self, DictionaryEntry, IndexStamp, POSTINGS_MAGIC};
use crate::index::snapshot::IndexSnapshot;
use crate::index::{IndexFiles, is_opaque_column};
use crate::normalize::Normalizer;
use crate::types::{Row, RowRef};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Moves a staged file over its committed path.
pub(crate) type RenameFn = fn(&Path, &Path) -> io::Result<()>;

/// Builds, commits, and reloads one index generation.
pub(crate) struct IndexBuilder<'a> {
    files: &'a IndexFiles,
    normalizer: &'a dyn Normalizer,
    opaque_markers: &'a [String],
    rename: RenameFn,
}

impl<'a> IndexBuilder<'a> {
    pub(crate) fn new(
        files: &'a IndexFiles,
        normalizer: &'a dyn Normalizer,
        opaque_markers: &'a [String],
        rename: RenameFn,
    ) -> Self {
        Self {
            files,
            normalizer,
            opaque_markers,
            rename,
        }
    }

    pub(crate) fn build<R: Row>(
        &self,
        rows: &[R],
        headers: &[String],
        stamp: IndexStamp,
    ) -> Result<IndexSnapshot, IndexError> {
        let postings = self.collect(rows, headers)?;
        let (entries, postings_bytes) = layout(postings, stamp)?;
        let dictionary_bytes = format::encode_dictionary(&entries, stamp)?;
        let meta = format::meta_contents(stamp);

        self.commit(&[
            (self.files.postings(), postings_bytes.as_slice()),
            (self.files.dictionary(), dictionary_bytes.as_slice()),
            (self.files.meta(), meta.as_bytes()),
        ])?;

        IndexSnapshot::open(self.files)
    }

    fn collect<R: Row>(
        &self,
        rows: &[R],
        headers: &[String],
    ) -> Result<HashMap<String, Vec<RowRef>>, IndexError> {
        let opaque: Vec<bool> = headers
            .iter()
            .map(|header| is_opaque_column(header, self.opaque_markers))
            .collect();

        let mut postings: HashMap<String, Vec<RowRef>> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            let row_ref = RowRef::try_from(index).map_err(|_| IndexError::TooManyRows)?;

            for column in 0..row.column_count() {
                if opaque.get(column).copied().unwrap_or(false) {
                    continue;
                }
                let Some(cell) = row.column_value(column) else {
                    continue;
                };

                for token in self.normalizer.index_tokens(cell) {
                    let list = postings.entry(token).or_default();
                    // Rows are visited in order, so checking the tail dedups.
                    if list.last() != Some(&row_ref) {
                        list.push(row_ref);
                    }
                }
            }
        }

        Ok(postings)
    }

    /// Stages every file, then renames them into place in order.
    ///
    /// Live files are hard-linked to a backup name first. If any rename
    /// fails, the files already replaced are restored from their backups,
    /// so the previously committed generation stays intact on disk.
    fn commit(&self, targets: &[(PathBuf, &[u8])]) -> Result<(), IndexError> {
        fs::create_dir_all(self.files.dir())?;

        for (index, (path, bytes)) in targets.iter().enumerate() {
            if let Err(e) = write_staged(path, bytes) {
                discard(&targets[..=index], IndexFiles::staging);
                return Err(e.into());
            }
        }

        let had_live = match back_up(targets) {
            Ok(had_live) => had_live,
            Err(e) => {
                discard(targets, IndexFiles::staging);
                discard(targets, IndexFiles::backup);
                return Err(e.into());
            }
        };

        for (index, (path, _)) in targets.iter().enumerate() {
            if let Err(source) = (self.rename)(&IndexFiles::staging(path), path) {
                restore(&targets[..index], &had_live[..index]);
                discard(&targets[index..], IndexFiles::staging);
                discard(targets, IndexFiles::backup);
                return Err(IndexError::Commit {
                    file: path.clone(),
                    source,
                });
            }
        }
        discard(targets, IndexFiles::backup);

        if let Err(e) = sync_dir(self.files.dir()) {
            warn!(
                dir = %self.files.dir().display(),
                error = %e,
                "Failed to sync index directory"
            );
        }
        Ok(())
    }
}

fn layout(
    postings: HashMap<String, Vec<RowRef>>,
    stamp: IndexStamp,
) -> Result<(Vec<DictionaryEntry>, Vec<u8>), IndexError> {
    let mut tokens: Vec<(String, Vec<RowRef>)> = postings.into_iter().collect();
    tokens.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let total: usize = tokens.iter().map(|(_, rows)| rows.len()).sum();
    let mut bytes = Vec::with_capacity(format::HEADER_LEN + total * format::ROW_REF_LEN);
    bytes.extend_from_slice(&format::encode_header(POSTINGS_MAGIC, stamp));

    let mut entries = Vec::with_capacity(tokens.len());
    let mut offset = 0u64;
    for (token, rows) in tokens {
        let count = u32::try_from(rows.len()).map_err(|_| IndexError::TooManyRows)?;
        for row in &rows {
            bytes.extend_from_slice(&row.to_le_bytes());
        }
        entries.push(DictionaryEntry {
            token,
            offset,
            count,
        });
        offset += u64::from(count);
    }

    Ok((entries, bytes))
}

fn write_staged(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(IndexFiles::staging(path))?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Links every existing live file to its backup name. Returns, per
/// target, whether there was a live file.
fn back_up(targets: &[(PathBuf, &[u8])]) -> io::Result<Vec<bool>> {
    targets
        .iter()
        .map(|(path, _)| {
            let backup = IndexFiles::backup(path);
            if let Err(e) = fs::remove_file(&backup)
                && e.kind() != io::ErrorKind::NotFound
            {
                return Err(e);
            }
            match fs::hard_link(path, &backup) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                // Filesystems without hard links get a copy instead.
                Err(_) => fs::copy(path, &backup).map(|_| true),
            }
        })
        .collect()
}

/// Puts back the live files of `targets`, which were already replaced.
fn restore(targets: &[(PathBuf, &[u8])], had_live: &[bool]) {
    for ((path, _), &live) in targets.iter().zip(had_live) {
        let restored = if live {
            fs::rename(IndexFiles::backup(path), path)
        } else {
            fs::remove_file(path)
        };
        if let Err(e) = restored {
            warn!(file = %path.display(), error = %e, "Failed to restore index file");
        }
    }
}

fn discard(targets: &[(PathBuf, &[u8])], name: fn(&Path) -> PathBuf) {
    for (path, _) in targets {
        let _ = fs::remove_file(name(path));
    }
}

pub(crate) fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
