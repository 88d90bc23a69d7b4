//! Opaque commands handed to a physical session.

use bytes::Bytes;

/// A command to submit to the server.
///
/// The statement text and arguments are carried as-is. Encoding them into
/// protocol messages is the transport's job, so arguments are kept as
/// already-encoded byte buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    statement: String,
    args: Vec<Bytes>,
}

impl Command {
    /// Create a new command from statement text.
    #[must_use]
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            args: Vec::new(),
        }
    }

    /// Append an encoded argument.
    #[must_use]
    pub fn bind(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Get the statement text.
    #[must_use]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Get the bound arguments.
    #[must_use]
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }
}

impl From<&str> for Command {
    fn from(statement: &str) -> Self {
        Self::new(statement)
    }
}

impl From<String> for Command {
    fn from(statement: String) -> Self {
        Self::new(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_keeps_order() {
        let cmd = Command::new("CALL p(?, ?)")
            .bind(Bytes::from_static(b"a"))
            .bind(vec![0x01, 0x02]);

        assert_eq!(cmd.statement(), "CALL p(?, ?)");
        assert_eq!(cmd.args().len(), 2);
        assert_eq!(cmd.args()[0].as_ref(), b"a");
        assert_eq!(cmd.args()[1].as_ref(), &[0x01, 0x02]);
    }
}
