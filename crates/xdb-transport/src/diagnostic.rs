//! Diagnostics and server-reported errors.

use std::fmt;

use thiserror::Error;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note.
    Info,
    /// Warning; the command still succeeded.
    Warning,
    /// Error; the command (or part of it) failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One diagnostic entry attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Entry severity.
    pub severity: Severity,
    /// Server error/warning code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic entry.
    #[must_use]
    pub fn new(severity: Severity, code: u32, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
        }
    }

    /// Create a warning entry.
    #[must_use]
    pub fn warning(code: u32, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

/// A fatal error the server reported for a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {code} ({sql_state}): {message}")]
pub struct ServerError {
    /// Server error code.
    pub code: u32,
    /// Five-character SQL state.
    pub sql_state: String,
    /// Error message.
    pub message: String,
}

impl ServerError {
    /// Create a new server error.
    #[must_use]
    pub fn new(code: u32, sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            sql_state: sql_state.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::warning(1265, "Data truncated");
        assert_eq!(d.to_string(), "warning 1265: Data truncated");

        let e = ServerError::new(1146, "42S02", "Table 't' doesn't exist");
        assert_eq!(
            e.to_string(),
            "server error 1146 (42S02): Table 't' doesn't exist"
        );
    }
}
