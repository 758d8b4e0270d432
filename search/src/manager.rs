//! Search orchestration.

use crate::cache::{CacheStats, Lookup, ResultCache};
use crate::config::SearchConfig;
use crate::engine::QueryEngine;
use crate::error::SearchError;
use crate::history::SearchHistory;
use crate::metrics::SearchMetrics;
use crate::results::{SearchResult, SearchResults};
use crate::scoring::{RowScore, Scorer};
use sift_core::index::{IndexSnapshot, IndexStore, is_opaque_column};
use sift_core::normalize::{Normalizer, StandardNormalizer};
use sift_core::types::{AppConfig, Config, DataVersion, Query, Row, RowRef};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// One `perform_search` call.
#[derive(Debug)]
pub struct SearchRequest<'a, R> {
    pub query: &'a str,
    pub rows: &'a [R],
    pub headers: &'a [String],
    /// Restricts scoring to this column (header compared case-insensitively).
    pub selected_column: Option<&'a str>,
    /// Skips the result cache.
    pub force_refresh: bool,
}

impl<'a, R: Row> SearchRequest<'a, R> {
    pub fn new(query: &'a str, rows: &'a [R], headers: &'a [String]) -> Self {
        Self {
            query,
            rows,
            headers,
            selected_column: None,
            force_refresh: false,
        }
    }

    pub fn with_column(mut self, column: &'a str) -> Self {
        self.selected_column = Some(column);
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Thread-safe handle for signalling that the dataset changed.
///
/// The signal is consumed at the start of the next search.
#[derive(Debug, Clone)]
pub struct DataChangeNotifier {
    pending: Arc<AtomicBool>,
}

impl DataChangeNotifier {
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }
}

struct LastQuery {
    query: Query,
    version: DataVersion,
    rows: Vec<RowRef>,
}

/// Search façade over one dataset.
///
/// Owns the data version, the result cache, the search history and the
/// quick-prefix context, and decides when the index must be rebuilt.
pub struct SearchManager {
    config: SearchConfig,
    normalizer: Arc<dyn Normalizer>,
    store: IndexStore,
    engine: QueryEngine,
    cache: ResultCache<Vec<SearchResult>>,
    history: SearchHistory,
    metrics: SearchMetrics,
    data_version: Option<DataVersion>,
    data_headers: Vec<String>,
    index_stale: bool,
    last_query: Option<LastQuery>,
    pending_change: Arc<AtomicBool>,
}

/// Lifecycle operations.
impl SearchManager {
    /// Loads settings from `config.config_path()`, falling back to defaults
    /// when the file is absent, then initializes as [`SearchManager::init`].
    pub fn open(config: &Config) -> Result<Self, SearchError> {
        let path = config.config_path();
        let app_config = AppConfig::load(&path)?;
        debug!(path = %path.display(), "Search settings loaded");
        Self::init(config, &app_config)
    }

    /// Opens the index under `config.index_dir()` with the standard normalizer.
    pub fn init(config: &Config, app_config: &AppConfig) -> Result<Self, SearchError> {
        let normalizer = StandardNormalizer::new(&app_config.with_defaults_for_invalid().normalizer)?;
        Self::with_normalizer(config, app_config, Arc::new(normalizer))
    }

    pub fn with_normalizer(
        config: &Config,
        app_config: &AppConfig,
        normalizer: Arc<dyn Normalizer>,
    ) -> Result<Self, SearchError> {
        for problem in app_config.validate() {
            warn!(problem = %problem, "Invalid search setting replaced by default");
        }
        let app_config = app_config.with_defaults_for_invalid();
        let search_config = SearchConfig::from(&app_config);

        let store = IndexStore::open(
            config.index_dir(),
            &app_config.index,
            Arc::clone(&normalizer),
        )?;
        info!(
            dir = %config.index_dir().display(),
            ready = store.is_ready(),
            "Search manager initialized"
        );

        Ok(Self {
            engine: QueryEngine::new(search_config.query.clone(), Arc::clone(&normalizer)),
            cache: ResultCache::new(search_config.cache_capacity, search_config.cache_max_age),
            history: SearchHistory::new(search_config.history_limit),
            metrics: SearchMetrics::new(),
            config: search_config,
            normalizer,
            store,
            data_version: None,
            data_headers: Vec::new(),
            index_stale: false,
            last_query: None,
            pending_change: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Drops all in-memory state and unpublishes the index. Files stay on disk.
    pub fn shutdown(&mut self) {
        self.invalidate();
        self.history.clear();
        self.data_version = None;
        self.data_headers.clear();
        self.store.release();
        info!("Search manager shut down");
    }
}

/// Search operations.
impl SearchManager {
    pub fn perform_search<R: Row>(&mut self, request: SearchRequest<'_, R>) -> SearchResults {
        self.perform_search_with(request, |_| {})
    }

    /// Like [`SearchManager::perform_search`], but hands a quick-prefix
    /// answer to `on_provisional` before the full recompute when one is
    /// available. The returned value is always the full result.
    pub fn perform_search_with<R: Row>(
        &mut self,
        request: SearchRequest<'_, R>,
        mut on_provisional: impl FnMut(&SearchResults),
    ) -> SearchResults {
        let started = Instant::now();
        let normalized = self.normalizer.normalize_query(request.query);
        let Ok(query) = Query::try_new(normalized.clone()) else {
            return SearchResults::empty(normalized);
        };

        let version = DataVersion::of(request.rows);
        self.observe(request.headers, version);

        let key = cache_key(&query, request.selected_column);
        if !request.force_refresh
            && let Some(results) = self.cached(&key, version)
        {
            self.history.record(query.as_str());
            self.remember(query, version, &results);
            return SearchResults {
                from_cache: true,
                search_time_ms: elapsed_ms(started),
                ..SearchResults::new(results, normalized)
            };
        }
        self.metrics.record_cache_miss();

        let variants = self.normalizer.variants(query.as_str());

        if let Some(results) = self.quick_prefix(&query, &variants, version, &request) {
            debug!(
                query = query.as_str(),
                rows = results.len(),
                "Quick-prefix provisional results"
            );
            on_provisional(&SearchResults {
                provisional: true,
                search_time_ms: elapsed_ms(started),
                ..SearchResults::new(results, normalized.clone())
            });
        }

        if self.index_needs_build(request.headers, version)
            && let Err(e) = self.rebuild(request.rows, request.headers, version)
        {
            warn!(error = %e, "Index rebuild failed; returning no results");
            return SearchResults {
                search_time_ms: elapsed_ms(started),
                ..SearchResults::empty(normalized)
            };
        }
        let Some(snapshot) = self.store.snapshot() else {
            return SearchResults::empty(normalized);
        };

        let candidates = self.engine.search_variants(&snapshot, &variants);
        let scorer = self.scorer(&variants, &request);
        let mut results: Vec<SearchResult> = candidates
            .iter()
            .filter_map(|&row_ref| {
                let row = request.rows.get(row_ref as usize)?;
                let score = scorer.score(row)?;
                Some(to_result(row_ref, score, row, request.headers))
            })
            .collect();
        // Candidates are ascending, so the stable sort keeps row order on ties.
        results.sort_by(|a, b| b.match_score.cmp(&a.match_score));

        let elapsed = started.elapsed();
        self.metrics.record_search(elapsed);
        debug!(
            query = query.as_str(),
            candidates = candidates.len(),
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Search completed"
        );

        self.cache.put(key, results.clone(), version, Instant::now());
        self.history.record(query.as_str());
        self.remember(query, version, &results);

        SearchResults {
            search_time_ms: elapsed.as_millis() as u64,
            ..SearchResults::new(results, normalized)
        }
    }

    /// Re-runs `query`, bypassing the cache.
    pub fn refresh_search<R: Row>(
        &mut self,
        query: &str,
        rows: &[R],
        headers: &[String],
        selected_column: Option<&str>,
    ) -> SearchResults {
        let request = SearchRequest {
            selected_column,
            ..SearchRequest::new(query, rows, headers).with_force_refresh(true)
        };
        self.perform_search(request)
    }

    /// Builds the index ahead of the first query if it is stale or missing.
    pub fn prewarm_index<R: Row>(
        &mut self,
        rows: &[R],
        headers: &[String],
    ) -> Result<(), SearchError> {
        let version = DataVersion::of(rows);
        self.observe(headers, version);
        if !self.index_needs_build(headers, version) {
            debug!(%version, "Prewarm skipped; index is current");
            return Ok(());
        }
        self.rebuild(rows, headers, version)
    }
}

/// Data change operations.
impl SearchManager {
    /// Invalidates the cache and marks the index stale. Nothing is rebuilt
    /// until the next search.
    pub fn notify_data_changed(&mut self) {
        debug!("Data change notification received");
        self.invalidate();
    }

    /// A handle that other threads can use to signal a data change.
    pub fn data_change_notifier(&self) -> DataChangeNotifier {
        DataChangeNotifier {
            pending: Arc::clone(&self.pending_change),
        }
    }

    /// Clears the result cache and forces a rebuild on the next search.
    pub fn clear_cache(&mut self) {
        debug!("Clearing search cache");
        self.invalidate();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

/// Read operations.
impl SearchManager {
    /// Recent normalized queries, most recent first.
    pub fn get_search_history(&self) -> Vec<String> {
        self.history.entries()
    }

    pub fn get_index_stats(&self) -> String {
        self.store.stats().to_string()
    }

    pub fn get_search_stats(&self) -> String {
        self.metrics.to_string()
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats(Instant::now())
    }

    pub fn is_index_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Shared handle to the index, for querying from other threads.
    pub fn index_handle(&self) -> IndexStore {
        self.store.clone()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

/// Internal state transitions.
impl SearchManager {
    /// Invalidates derived state when the data or the headers changed
    /// since the last call.
    fn observe(&mut self, headers: &[String], version: DataVersion) {
        if self.pending_change.swap(false, Ordering::AcqRel) {
            debug!("Applying pending data change notification");
            self.invalidate();
        }

        match self.data_version {
            Some(previous) if previous != version => {
                info!(%previous, %version, "Data version changed");
                self.invalidate();
            }
            // Results carry header names. The index only follows the
            // opaque-column layout, which its stamp already tracks.
            Some(_) if self.data_headers != headers => {
                info!(columns = headers.len(), "Column headers changed");
                self.forget_results();
            }
            _ => {}
        }
        self.data_version = Some(version);
        if self.data_headers != headers {
            self.data_headers = headers.to_vec();
        }
    }

    fn invalidate(&mut self) {
        self.forget_results();
        self.index_stale = true;
    }

    fn forget_results(&mut self) {
        let removed = self.cache.invalidate_all();
        trace!(removed, "Search cache invalidated");
        self.last_query = None;
    }

    fn index_needs_build(&self, headers: &[String], version: DataVersion) -> bool {
        self.index_stale || !self.store.is_current(headers, version)
    }

    fn rebuild<R: Row>(
        &mut self,
        rows: &[R],
        headers: &[String],
        version: DataVersion,
    ) -> Result<(), SearchError> {
        let started = Instant::now();
        self.store.build(rows, headers, version)?;
        self.index_stale = false;
        self.metrics.record_rebuild(started.elapsed());
        Ok(())
    }

    fn cached(&mut self, key: &str, version: DataVersion) -> Option<Vec<SearchResult>> {
        match self.cache.lookup(key, version, Instant::now()) {
            Lookup::Hit(results) => {
                debug!(key, "Cache hit");
                self.metrics.record_cache_hit();
                Some(results)
            }
            Lookup::Miss => {
                trace!(key, "Cache miss");
                None
            }
            Lookup::Expired => {
                debug!(key, "Cache entry expired");
                None
            }
            Lookup::Stale => {
                debug!(key, "Cache entry stale");
                None
            }
        }
    }

    fn remember(&mut self, query: Query, version: DataVersion, results: &[SearchResult]) {
        self.last_query = Some(LastQuery {
            query,
            version,
            rows: results.iter().map(|result| result.row).collect(),
        });
    }

    fn scorer<'s, R>(
        &'s self,
        variants: &'s [String],
        request: &SearchRequest<'_, R>,
    ) -> Scorer<'s> {
        Scorer::new(
            self.normalizer.as_ref(),
            variants,
            request.headers,
            request.selected_column,
            &self.config,
        )
    }

    /// Re-scores the previous result rows when `query` extends the previous
    /// query over the same data and index.
    ///
    /// A row is only kept if the full index search is certain to produce it
    /// too, so the provisional rows are always a subset of the full result.
    fn quick_prefix<R: Row>(
        &self,
        query: &Query,
        variants: &[String],
        version: DataVersion,
        request: &SearchRequest<'_, R>,
    ) -> Option<Vec<SearchResult>> {
        let last = self.last_query.as_ref()?;
        if !query.strictly_extends(&last.query) || last.rows.is_empty() || last.version != version
        {
            return None;
        }
        let snapshot = self.store.snapshot()?;
        if self.index_stale
            || snapshot.stamp() != self.store.stamp_for(request.headers, version)
        {
            return None;
        }

        let tokens: Vec<&str> = variants
            .iter()
            .flat_map(|variant| self.normalizer.tokenize(variant))
            .collect();
        let scorer = self.scorer(variants, request);

        let mut results: Vec<SearchResult> = last
            .rows
            .iter()
            .filter_map(|&row_ref| {
                let row = request.rows.get(row_ref as usize)?;
                if !self.reachable(row, request.headers, &tokens, &snapshot) {
                    return None;
                }
                let score = scorer.score(row)?;
                Some(to_result(row_ref, score, row, request.headers))
            })
            .collect();
        results.sort_by(|a, b| {
            b.match_score
                .cmp(&a.match_score)
                .then_with(|| a.row.cmp(&b.row))
        });
        Some(results)
    }

    /// Whether the exact or prefix strategy would return `row` for one of
    /// `tokens`.
    fn reachable<R: Row>(
        &self,
        row: &R,
        headers: &[String],
        tokens: &[&str],
        snapshot: &IndexSnapshot,
    ) -> bool {
        let mut row_tokens = Vec::new();
        for column in 0..row.column_count() {
            let opaque = headers
                .get(column)
                .is_some_and(|h| is_opaque_column(h, &self.config.opaque_column_markers));
            if opaque {
                continue;
            }
            if let Some(cell) = row.column_value(column) {
                row_tokens.extend(self.normalizer.index_tokens(cell));
            }
        }

        tokens.iter().any(|&token| {
            if row_tokens.iter().any(|t| t == token) {
                return true;
            }
            !snapshot.contains_token(token) && row_tokens.iter().any(|t| t.starts_with(token))
        })
    }
}

fn to_result<R: Row>(
    row_ref: RowRef,
    score: RowScore,
    row: &R,
    headers: &[String],
) -> SearchResult {
    SearchResult {
        row: row_ref,
        match_score: score.score,
        matched_column: headers.get(score.column).cloned(),
        matched_value: row.column_value(score.column).map(str::to_string),
    }
}

/// Results differ per selected column, so the column is part of the key.
fn cache_key(query: &Query, selected_column: Option<&str>) -> String {
    match selected_column {
        Some(column) => format!("{query}\u{1f}{}", column.to_lowercase()),
        None => query.as_str().to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
