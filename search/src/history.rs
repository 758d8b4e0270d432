use std::collections::VecDeque;

/// Recent queries, most recent first, without duplicates.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    entries: VecDeque<String>,
    limit: usize,
}

impl SearchHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit: limit.max(1),
        }
    }

    /// Moves `query` to the front, dropping the oldest entry past the limit.
    pub fn record(&mut self, query: &str) {
        if let Some(index) = self.entries.iter().position(|q| q == query) {
            self.entries.remove(index);
        }
        self.entries.push_front(query.to_string());
        self.entries.truncate(self.limit);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
