//! Scripted server answers.

use bytes::Bytes;
use xdb_transport::{ColumnInfo, Diagnostic, ServerError};

/// Type code used for text columns built by the helpers.
pub const TEXT_TYPE: u16 = 253;
/// Type code used for integer columns built by the helpers.
pub const INT_TYPE: u16 = 8;

/// One row-bearing result set.
#[derive(Debug, Clone, Default)]
pub struct ResultSetScript {
    /// Column metadata.
    pub columns: Vec<ColumnInfo>,
    /// Rows; `None` fields are NULL.
    pub rows: Vec<Vec<Option<Bytes>>>,
    /// Warnings the server reports once this set has been read or discarded.
    pub warnings: Vec<Diagnostic>,
}

impl ResultSetScript {
    /// Create an empty set with the given columns.
    #[must_use]
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// A single integer column holding `values`, encoded as decimal text.
    #[must_use]
    pub fn ints(name: &str, values: impl IntoIterator<Item = i64>) -> Self {
        let mut set = Self::new(vec![ColumnInfo::new(name, INT_TYPE)]);
        for v in values {
            set.rows.push(vec![Some(Bytes::from(v.to_string()))]);
        }
        set
    }

    /// Text columns with the given names.
    #[must_use]
    pub fn text(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|n| ColumnInfo::new(*n, TEXT_TYPE))
                .collect(),
        )
    }

    /// Append a row of optional text fields.
    #[must_use]
    pub fn row(mut self, fields: &[Option<&str>]) -> Self {
        self.rows.push(
            fields
                .iter()
                .map(|f| f.map(|s| Bytes::copy_from_slice(s.as_bytes())))
                .collect(),
        );
        self
    }

    /// Attach a warning reported at the end of this set.
    #[must_use]
    pub fn warning(mut self, warning: Diagnostic) -> Self {
        self.warnings.push(warning);
        self
    }
}

/// One part of a reply, in server order.
#[derive(Debug, Clone)]
pub enum ReplyPart {
    /// A row-bearing result set.
    Rows(ResultSetScript),
    /// A server error; nothing after it is delivered.
    Error(ServerError),
}

/// The full answer to one command.
#[derive(Debug, Clone, Default)]
pub struct ReplyScript {
    /// Parts in server order.
    pub parts: Vec<ReplyPart>,
    /// Warnings reported after the last part.
    pub trailing_warnings: Vec<Diagnostic>,
    /// Affected row count.
    pub affected_rows: u64,
    /// Last insert id.
    pub last_insert_id: u64,
}

impl ReplyScript {
    /// An empty (OK, no rows) reply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result set.
    #[must_use]
    pub fn result_set(mut self, set: ResultSetScript) -> Self {
        self.parts.push(ReplyPart::Rows(set));
        self
    }

    /// Append a server error.
    #[must_use]
    pub fn error(mut self, error: ServerError) -> Self {
        self.parts.push(ReplyPart::Error(error));
        self
    }

    /// Attach a warning reported once all parts were delivered.
    #[must_use]
    pub fn trailing_warning(mut self, warning: Diagnostic) -> Self {
        self.trailing_warnings.push(warning);
        self
    }

    /// Set the affected row count.
    #[must_use]
    pub fn affected(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    /// Set the last insert id.
    #[must_use]
    pub fn insert_id(mut self, id: u64) -> Self {
        self.last_insert_id = id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ints_helper() {
        let set = ResultSetScript::ints("n", [1, 2, 3]);
        assert_eq!(set.columns.len(), 1);
        assert_eq!(set.rows.len(), 3);
        assert_eq!(set.rows[2][0].as_deref(), Some(&b"3"[..]));
    }

    #[test]
    fn test_text_rows_with_null() {
        let set = ResultSetScript::text(&["a", "b"]).row(&[Some("x"), None]);
        assert_eq!(set.rows[0][0].as_deref(), Some(&b"x"[..]));
        assert!(set.rows[0][1].is_none());
    }
}
