use std::fmt;
use std::time::{Duration, Instant};

/// Running counters for searches, cache use, and index rebuilds.
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    cache_hits: u64,
    cache_misses: u64,
    index_rebuilds: u64,
    searches: u64,
    total_search_time: Duration,
    total_build_time: Duration,
    started: Instant,
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self {
            cache_hits: 0,
            cache_misses: 0,
            index_rebuilds: 0,
            searches: 0,
            total_search_time: Duration::ZERO,
            total_build_time: Duration::ZERO,
            started: Instant::now(),
        }
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn record_cache_miss(&mut self) {
        self.cache_misses += 1;
    }

    pub fn record_rebuild(&mut self, elapsed: Duration) {
        self.index_rebuilds += 1;
        self.total_build_time += elapsed;
    }

    pub fn record_search(&mut self, elapsed: Duration) {
        self.searches += 1;
        self.total_search_time += elapsed;
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses
    }

    pub fn index_rebuilds(&self) -> u64 {
        self.index_rebuilds
    }

    /// Full (non-cached) searches completed.
    pub fn searches(&self) -> u64 {
        self.searches
    }

    /// Percentage of lookups served from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64 * 100.0
    }

    pub fn average_search_time(&self) -> Duration {
        average(self.total_search_time, self.searches)
    }

    pub fn average_build_time(&self) -> Duration {
        average(self.total_build_time, self.index_rebuilds)
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

impl fmt::Display for SearchMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "searches={}, avg_search_ms={:.1}, cache_hits={}, cache_misses={}, hit_rate={:.1}%, rebuilds={}, avg_build_ms={:.1}",
            self.searches,
            self.average_search_time().as_secs_f64() * 1000.0,
            self.cache_hits,
            self.cache_misses,
            self.cache_hit_rate(),
            self.index_rebuilds,
            self.average_build_time().as_secs_f64() * 1000.0,
        )
    }
}
