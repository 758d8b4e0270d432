use std::collections::BTreeSet;

/// Index of a row in the caller-owned row slice.
///
/// Stable for the lifetime of one `DataVersion`.
pub type RowRef = u32;

/// Candidate rows, ascending.
pub type RowSet = BTreeSet<RowRef>;

/// A row of string-valued cells supplied by the data source.
///
/// The engine never copies row content; it reads cells through this trait
/// and refers to rows by `RowRef` only.
pub trait Row {
    fn column_count(&self) -> usize;

    /// Returns `None` for a missing cell or a column past the end of the row.
    fn column_value(&self, column: usize) -> Option<&str>;
}

impl Row for Vec<String> {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn column_value(&self, column: usize) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl Row for Vec<Option<String>> {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn column_value(&self, column: usize) -> Option<&str> {
        self.get(column).and_then(|cell| cell.as_deref())
    }
}

impl Row for Vec<&str> {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn column_value(&self, column: usize) -> Option<&str> {
        self.get(column).copied()
    }
}

impl<const N: usize> Row for [&str; N] {
    fn column_count(&self) -> usize {
        N
    }

    fn column_value(&self, column: usize) -> Option<&str> {
        self.get(column).copied()
    }
}
