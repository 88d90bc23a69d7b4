//! Warnings and notes accumulated over a reply.

use xdb_transport::{Diagnostic, Reply, Severity};

/// Ordered, append-only diagnostics of one reply.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    fully_loaded: bool,
}

impl Diagnostics {
    /// Pull entries the reply reported since the last load.
    ///
    /// `complete` marks the list as final; later loads are no-ops.
    pub(crate) fn load(&mut self, reply: &dyn Reply, complete: bool) {
        if self.fully_loaded {
            return;
        }
        let fresh = reply.diagnostics(self.entries.len());
        if !fresh.is_empty() {
            tracing::trace!(count = fresh.len(), "loaded diagnostics");
        }
        self.entries.extend(fresh);
        self.fully_loaded = complete;
    }

    /// Whether no more entries can arrive.
    #[must_use]
    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Diagnostic> {
        self.entries.get(index)
    }

    /// Number of entries at or above `severity`.
    #[must_use]
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity >= severity).count()
    }

    /// All entries, in server order.
    #[must_use]
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }
}
