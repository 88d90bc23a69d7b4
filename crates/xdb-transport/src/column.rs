//! Column metadata reported by a cursor.

/// Metadata for one column of a result set.
///
/// The runtime treats `type_code` and `flags` as opaque; they are passed
/// through for the codec layer that decodes field bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    /// Column label as seen by the client.
    pub name: String,
    /// Original column name, if the column maps to a table column.
    pub original_name: Option<String>,
    /// Table (or alias) the column belongs to.
    pub table: Option<String>,
    /// Schema of the table.
    pub schema: Option<String>,
    /// Protocol type code.
    pub type_code: u16,
    /// Declared display length.
    pub length: u32,
    /// Protocol column flags.
    pub flags: u32,
    /// Whether the column may contain NULL.
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create column metadata with just a name and type code.
    #[must_use]
    pub fn new(name: impl Into<String>, type_code: u16) -> Self {
        Self {
            name: name.into(),
            type_code,
            nullable: true,
            ..Self::default()
        }
    }

    /// Set the owning table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Mark the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}
