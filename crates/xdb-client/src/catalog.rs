//! Schema object listing.
//!
//! The server answers the `list_objects` admin command with one row per
//! object: its name in column 0 and its type (`TABLE`, `VIEW` or
//! `COLLECTION`) in column 1. Listing by kind runs that command with a row
//! filter on the type column.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use xdb_transport::Command;

use crate::cursor::RowFilter;
use crate::error::{Error, Result};
use crate::row::RawRow;

/// Admin command listing the objects of a schema.
pub const LIST_OBJECTS: &str = "list_objects";

/// Kind of schema object to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Base tables only.
    Table,
    /// Views only.
    View,
    /// Document collections.
    Collection,
    /// Tables and views.
    Relation,
}

impl ObjectKind {
    /// Whether an object reported with `type_name` is of this kind.
    #[must_use]
    pub fn matches(self, type_name: &str) -> bool {
        let is = |name: &str| type_name.eq_ignore_ascii_case(name);
        match self {
            Self::Table => is("TABLE"),
            Self::View => is("VIEW"),
            Self::Collection => is("COLLECTION"),
            Self::Relation => is("TABLE") || is("VIEW"),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Table => "table",
            Self::View => "view",
            Self::Collection => "collection",
            Self::Relation => "relation",
        };
        f.write_str(s)
    }
}

/// Build the listing command for `schema`, optionally restricted to names
/// matching `pattern`.
pub fn list_objects_command(schema: &str, pattern: Option<&str>) -> Result<Command> {
    validate_identifier(schema)?;
    let command = Command::new(LIST_OBJECTS).bind(schema.to_owned());
    Ok(match pattern {
        Some(pattern) => command.bind(pattern.to_owned()),
        None => command,
    })
}

/// Row filter keeping objects of `kind`.
pub(crate) fn kind_filter(kind: ObjectKind) -> RowFilter {
    Arc::new(move |row: &RawRow| row.get_str(1).is_some_and(|t| kind.matches(t)))
}

/// Validate an identifier (schema name, table name, etc.) to prevent SQL injection.
pub fn validate_identifier(name: &str) -> Result<()> {
    #[allow(clippy::expect_used)]
    static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]{0,63}$").expect("identifier pattern is valid")
    });

    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier cannot be empty".into(),
        ));
    }

    if !IDENTIFIER_RE.is_match(name) {
        return Err(Error::InvalidIdentifier(format!(
            "invalid identifier '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/$, and be 1-64 characters"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("shop").is_ok());
        assert!(validate_identifier("Schema123").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("a$b").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("123abc").is_err());
        assert!(validate_identifier("shop; DROP TABLE users").is_err());
        assert!(validate_identifier("shop--").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_kind_matching() {
        assert!(ObjectKind::Table.matches("TABLE"));
        assert!(!ObjectKind::Table.matches("VIEW"));
        assert!(ObjectKind::Relation.matches("view"));
        assert!(ObjectKind::Collection.matches("COLLECTION"));
        assert!(!ObjectKind::Relation.matches("COLLECTION"));
    }

    #[test]
    fn test_list_command_arguments() {
        let cmd = list_objects_command("shop", Some("order%")).unwrap();
        assert_eq!(cmd.statement(), LIST_OBJECTS);
        assert_eq!(cmd.args().len(), 2);
        assert_eq!(cmd.args()[0].as_ref(), b"shop");

        assert!(matches!(
            list_objects_command("bad name", None),
            Err(Error::InvalidIdentifier(_))
        ));
    }
}
