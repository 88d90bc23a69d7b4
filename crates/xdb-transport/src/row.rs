//! Push-style row delivery.

/// How many rows a single fetch may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchCount {
    /// At most this many rows.
    Rows(u64),
    /// Every remaining row of the current result set.
    All,
}

impl FetchCount {
    /// Whether this count drains the result set.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether `delivered` rows satisfy this count.
    #[must_use]
    pub fn is_satisfied_by(&self, delivered: u64) -> bool {
        match self {
            Self::Rows(n) => delivered >= *n,
            Self::All => false,
        }
    }
}

/// Receiver of rows pushed by a [`Cursor`](crate::Cursor) during a fetch.
///
/// For every row the cursor calls `row_begin`, then for every non-NULL field
/// `field_begin`, any number of `field_data` chunks and `field_end`, or
/// `field_null` for a NULL field, and finally `row_end`. When the result set
/// has no further rows the cursor calls `end_of_data` once.
///
/// Callbacks run on the thread that called
/// [`Cursor::fetch_rows`](crate::Cursor::fetch_rows), in server order.
pub trait RowProcessor {
    /// A new row starts. Returning `false` asks the cursor to skip it.
    fn row_begin(&mut self, row: u64) -> bool;

    /// A non-NULL field starts; `size_hint` is the announced length, if any.
    fn field_begin(&mut self, column: usize, size_hint: usize);

    /// A chunk of field bytes.
    fn field_data(&mut self, column: usize, data: &[u8]);

    /// The current field is complete.
    fn field_end(&mut self, _column: usize) {}

    /// The field is NULL.
    fn field_null(&mut self, _column: usize) {}

    /// The row is complete.
    fn row_end(&mut self, row: u64);

    /// The result set has no further rows.
    fn end_of_data(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_count_satisfaction() {
        assert!(FetchCount::Rows(3).is_satisfied_by(3));
        assert!(!FetchCount::Rows(3).is_satisfied_by(2));
        assert!(!FetchCount::All.is_satisfied_by(u64::MAX));
        assert!(FetchCount::All.is_all());
    }
}
