//! Raw rows and the column metadata they share.

use std::sync::Arc;

use bytes::Bytes;
use xdb_transport::ColumnInfo;

/// Column metadata of one result set, shared by all of its rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<ColumnInfo>,
}

impl ColumnSet {
    /// Create a column set.
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self { columns }
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column by ordinal.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    /// Ordinal of the column called `name`, compared case-insensitively.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All columns.
    #[must_use]
    pub fn as_slice(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Iterate over the columns.
    pub fn iter(&self) -> std::slice::Iter<'_, ColumnInfo> {
        self.columns.iter()
    }
}

/// One row from a result set, not yet decoded.
///
/// Fields are the raw bytes the transport delivered. NULL fields have no
/// buffer. Decoding into typed values is left to the codec layer.
#[derive(Debug, Clone)]
pub struct RawRow {
    columns: Arc<ColumnSet>,
    fields: Vec<Option<Bytes>>,
}

impl RawRow {
    /// Create a row from its fields.
    pub(crate) fn new(columns: Arc<ColumnSet>, fields: Vec<Option<Bytes>>) -> Self {
        Self { columns, fields }
    }

    /// Get a field by column ordinal.
    ///
    /// Returns `None` for NULL fields and for out-of-range ordinals.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    /// Get a field by column name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Bytes> {
        self.columns.position(name).and_then(|i| self.get(i))
    }

    /// Get a field as UTF-8 text.
    #[must_use]
    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Get a field as UTF-8 text by column name.
    #[must_use]
    pub fn get_str_by_name(&self, name: &str) -> Option<&str> {
        self.columns.position(name).and_then(|i| self.get_str(i))
    }

    /// Check whether a field is NULL.
    ///
    /// Out-of-range ordinals are not NULL, they don't exist.
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.fields.get(index), Some(None))
    }

    /// Get the number of fields in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the row is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get the column metadata.
    #[must_use]
    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Iterate over (column, field) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ColumnInfo, Option<&Bytes>)> {
        self.columns
            .iter()
            .zip(self.fields.iter().map(Option::as_ref))
    }
}

impl IntoIterator for RawRow {
    type Item = Option<Bytes>;
    type IntoIter = std::vec::IntoIter<Option<Bytes>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> RawRow {
        let columns = Arc::new(ColumnSet::new(vec![
            ColumnInfo::new("Id", 8),
            ColumnInfo::new("name", 253),
        ]));
        RawRow::new(columns, vec![Some(Bytes::from_static(b"7")), None])
    }

    #[test]
    fn test_lookup_by_name_ignores_case() {
        let row = row();
        assert_eq!(row.get_str_by_name("ID"), Some("7"));
        assert_eq!(row.get_str_by_name("id"), Some("7"));
        assert!(row.get_by_name("missing").is_none());
    }

    #[test]
    fn test_null_and_out_of_range() {
        let row = row();
        assert!(row.is_null(1));
        assert!(row.get(1).is_none());
        assert!(!row.is_null(5));
        assert_eq!(row.len(), 2);
        assert_eq!(row.iter().filter(|(_, f)| f.is_some()).count(), 1);
    }
}
