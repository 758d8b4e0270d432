use crate::index::builder::{IndexBuilder, RenameFn};
use crate::index::error::IndexError;
use crate::index::format::IndexStamp;
use crate::index::snapshot::IndexSnapshot;
use crate::index::{IndexFiles, is_opaque_column};
use crate::normalize::Normalizer;
use crate::types::{DataVersion, IndexConfig, Row, RowSet};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared handle to the on-disk index and its published snapshot.
///
/// Cloning is cheap; every clone sees the same snapshot. Rebuilds are
/// serialized, while readers keep using whichever snapshot they fetched.
#[derive(Clone)]
pub struct IndexStore {
    inner: Arc<Inner>,
}

struct Inner {
    files: IndexFiles,
    opaque_markers: Vec<String>,
    normalizer: Arc<dyn Normalizer>,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    build_lock: Mutex<()>,
    rename: RenameFn,
}

/// Lifecycle operations.
impl IndexStore {
    /// Opens the index directory, loading a previously committed index if
    /// one is present and intact.
    pub fn open(
        dir: impl Into<PathBuf>,
        config: &IndexConfig,
        normalizer: Arc<dyn Normalizer>,
    ) -> Result<Self, IndexError> {
        Self::open_with_rename(dir, config, normalizer, |from, to| std::fs::rename(from, to))
    }

    pub(crate) fn open_with_rename(
        dir: impl Into<PathBuf>,
        config: &IndexConfig,
        normalizer: Arc<dyn Normalizer>,
        rename: RenameFn,
    ) -> Result<Self, IndexError> {
        let files = IndexFiles::new(dir);
        std::fs::create_dir_all(files.dir())?;

        let current = match IndexSnapshot::open(&files) {
            Ok(snapshot) => {
                info!(
                    version = %snapshot.version(),
                    tokens = snapshot.token_count(),
                    "Loaded persisted index"
                );
                Some(Arc::new(snapshot))
            }
            Err(IndexError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %files.dir().display(), "No persisted index");
                None
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable index; it will be rebuilt");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                files,
                opaque_markers: config.opaque_column_markers.clone(),
                normalizer,
                current: RwLock::new(current),
                build_lock: Mutex::new(()),
                rename,
            }),
        })
    }

    /// Builds and commits an index for `rows`, then publishes it.
    ///
    /// On failure the previously published snapshot, if any, stays current.
    pub fn build<R: Row>(
        &self,
        rows: &[R],
        headers: &[String],
        version: DataVersion,
    ) -> Result<Arc<IndexSnapshot>, IndexError> {
        let _guard = self.inner.build_lock.lock();
        let started = Instant::now();
        let stamp = self.stamp_for(headers, version);
        debug!(stamp = %stamp, rows = rows.len(), "Index build started");

        let builder = IndexBuilder::new(
            &self.inner.files,
            self.inner.normalizer.as_ref(),
            &self.inner.opaque_markers,
            self.inner.rename,
        );
        let snapshot = Arc::new(builder.build(rows, headers, stamp)?);
        *self.inner.current.write() = Some(Arc::clone(&snapshot));

        info!(
            version = %version,
            rows = rows.len(),
            tokens = snapshot.token_count(),
            postings = snapshot.postings_len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Index built"
        );
        Ok(snapshot)
    }

    /// Unpublishes the current snapshot. Files on disk are left alone.
    pub fn release(&self) {
        self.inner.current.write().take();
    }
}

/// Read operations.
impl IndexStore {
    pub fn is_ready(&self) -> bool {
        self.inner.current.read().is_some()
    }

    pub fn current_version(&self) -> Option<DataVersion> {
        self.inner.current.read().as_ref().map(|s| s.version())
    }

    pub fn current_stamp(&self) -> Option<IndexStamp> {
        self.inner.current.read().as_ref().map(|s| s.stamp())
    }

    /// The stamp an index of data `version` under `headers` would carry.
    ///
    /// The settings half covers the normalizer fingerprint and which
    /// columns the opaque markers exclude.
    pub fn stamp_for(&self, headers: &[String], version: DataVersion) -> IndexStamp {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.inner.normalizer.fingerprint().to_le_bytes());
        for (column, header) in headers.iter().enumerate() {
            if is_opaque_column(header, &self.inner.opaque_markers) {
                hasher.update(&(column as u64).to_le_bytes());
            }
        }

        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        IndexStamp {
            version,
            settings: u64::from_le_bytes(head),
        }
    }

    /// Whether the published snapshot indexes data `version` under the
    /// current settings and `headers`.
    pub fn is_current(&self, headers: &[String], version: DataVersion) -> bool {
        self.current_stamp() == Some(self.stamp_for(headers, version))
    }

    /// The published snapshot. Holding it keeps that generation alive
    /// across a concurrent rebuild.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner.current.read().clone()
    }

    pub fn lookup_exact(&self, token: &str) -> Option<RowSet> {
        let snapshot = self.snapshot()?;
        snapshot.lookup_exact(token).map(Iterator::collect)
    }

    /// One row set per dictionary token starting with `prefix`.
    pub fn lookup_prefix(&self, prefix: &str) -> Vec<RowSet> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        snapshot
            .lookup_prefix(prefix)
            .map(|(_, postings)| postings.collect())
            .collect()
    }

    pub fn files(&self) -> &IndexFiles {
        &self.inner.files
    }

    pub fn stats(&self) -> IndexStats {
        match self.snapshot() {
            Some(snapshot) => IndexStats {
                ready: true,
                version: Some(snapshot.version()),
                tokens: snapshot.token_count(),
                postings: snapshot.postings_len(),
            },
            None => IndexStats::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub ready: bool,
    pub version: Option<DataVersion>,
    pub tokens: usize,
    pub postings: usize,
}

impl fmt::Display for IndexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dict={}, postings={}, version=", self.tokens, self.postings)?;
        match self.version {
            Some(version) => write!(f, "{version}")?,
            None => write!(f, "none")?,
        }
        write!(f, ", ready={}", self.ready)
    }
}
