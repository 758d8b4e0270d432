use nutype::nutype;

/// Hard ceiling on a normalized query, in chars.
///
/// `NormalizerConfig::max_query_chars` truncates below this before a
/// `Query` is ever constructed.
pub const MAX_QUERY_LENGTH: usize = 4096;

/// A normalized, non-empty search query.
///
/// This is the cache key, the history entry, and the quick-prefix anchor.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = MAX_QUERY_LENGTH),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        AsRef,
        Deref,
        TryFrom,
        Into,
        Hash,
        Borrow,
        Display,
    )
)]
pub struct Query(String);

impl Query {
    /// Returns true if `self` extends `previous` by at least one char.
    pub fn strictly_extends(&self, previous: &Query) -> bool {
        self.len() > previous.len() && self.starts_with(previous.as_str())
    }
}
