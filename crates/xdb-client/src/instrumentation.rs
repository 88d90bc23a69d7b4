//! Tracing helpers for database operations.
//!
//! Operations log through `tracing` with structured fields. Statement text
//! is sanitized before it reaches a log line: string and numeric literals
//! are replaced by a placeholder and long statements are truncated.
//!
//! ## Field names
//!
//! Command logs carry fields named after the database semantic conventions:
//! - `db.system`: "xdb"
//! - `db.statement`: statement text (sanitized)
//! - `db.operation`: statement kind (SELECT, INSERT, etc.)

/// Database system identifier.
pub const DB_SYSTEM: &str = "xdb";

/// Operation names used for timers and spans.
pub mod span_names {
    /// Session checkout.
    pub const CHECKOUT: &str = "xdb.checkout";
    /// Command execution.
    pub const EXECUTE: &str = "xdb.execute";
    /// Result store.
    pub const STORE: &str = "xdb.store";
    /// Row fetch.
    pub const FETCH: &str = "xdb.fetch";
}

/// Configuration for statement sanitization.
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Whether to replace literals.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for sanitized values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Create a configuration that doesn't sanitize statements.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Sanitize a statement according to the configuration.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate_string(sql, self.max_length);
        }
        let sanitized = replace_literals(sql, &self.placeholder);
        truncate_string(&sanitized, self.max_length)
    }
}

/// Sanitize a statement with the default configuration.
#[must_use]
pub fn sanitize_statement(sql: &str) -> String {
    SanitizationConfig::default().sanitize(sql)
}

/// Replace quoted strings and numeric literals with `placeholder`.
fn replace_literals(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                // doubled quote is an escaped quote
                if chars.peek() == Some(&q) {
                    chars.next();
                    continue;
                }
                quote = None;
                result.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' || c == '"' {
            quote = Some(c);
            continue;
        }

        if c.is_ascii_digit() && !result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_') {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            result.push_str(placeholder);
            continue;
        }

        result.push(c);
    }

    if quote.is_some() {
        result.push_str(placeholder);
    }

    result
}

/// Truncate a string to at most `max_len` bytes, on a char boundary.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Extract the operation kind from a statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let first = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match first.as_str() {
        "SELECT" | "WITH" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "CALL" => "CALL",
        "START" | "BEGIN" => "BEGIN",
        "COMMIT" => "COMMIT",
        "ROLLBACK" => "ROLLBACK",
        "CREATE" => "CREATE",
        "ALTER" => "ALTER",
        "DROP" => "DROP",
        "LIST_OBJECTS" => "LIST",
        _ => "OTHER",
    }
}

/// Helper for timing operations.
///
/// Logs the elapsed time at trace level when finished.
#[derive(Debug, Clone)]
pub struct OperationTimer {
    start: std::time::Instant,
    operation: &'static str,
}

impl OperationTimer {
    /// Start timing an operation.
    #[must_use]
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Finish timing and log the duration.
    pub fn finish(self) {
        tracing::trace!(
            operation = self.operation,
            elapsed_ms = self.start.elapsed().as_millis() as u64,
            "operation finished"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT * FROM users"), "SELECT");
        assert_eq!(extract_operation("  select id from users"), "SELECT");
        assert_eq!(extract_operation("WITH t AS (SELECT 1) SELECT * FROM t"), "SELECT");
        assert_eq!(extract_operation("INSERT INTO users VALUES (1)"), "INSERT");
        assert_eq!(extract_operation("CALL three_sets()"), "CALL");
        assert_eq!(extract_operation("START TRANSACTION"), "BEGIN");
        assert_eq!(extract_operation("list_objects"), "LIST");
        assert_eq!(extract_operation(""), "OTHER");
    }

    #[test]
    fn test_replace_literals() {
        assert_eq!(
            replace_literals("SELECT * FROM users WHERE name = 'Alice'", "?"),
            "SELECT * FROM users WHERE name = ?"
        );
        assert_eq!(
            replace_literals("INSERT INTO t VALUES ('a', \"b\")", "?"),
            "INSERT INTO t VALUES (?, ?)"
        );
        assert_eq!(
            replace_literals("SELECT * WHERE name = 'O''Brien' OR name = 'it\\'s'", "?"),
            "SELECT * WHERE name = ? OR name = ?"
        );
        assert_eq!(
            replace_literals("SELECT * FROM t2 WHERE id = 42.5", "?"),
            "SELECT * FROM t2 WHERE id = ?"
        );
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("héllo world", 5), "h...");
    }

    #[test]
    fn test_no_sanitization_keeps_literals() {
        let config = SanitizationConfig::no_sanitization();
        let sql = "SELECT * FROM users WHERE name = 'Alice'";
        assert_eq!(config.sanitize(sql), sql);
        assert_eq!(sanitize_statement(sql), "SELECT * FROM users WHERE name = ?");
    }
}
