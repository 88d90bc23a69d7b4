//! Physical session, reply and cursor traits.

use crate::column::ColumnInfo;
use crate::command::Command;
use crate::diagnostic::{Diagnostic, ServerError};
use crate::error::TransportError;
use crate::row::{FetchCount, RowProcessor};

/// One live, authenticated connection to the server.
///
/// A physical session is driven by one thread at a time. Implementations
/// must be `Send` so pooled sessions can move between the threads that
/// check them out.
pub trait PhysicalSession: Send {
    /// Send a command. The returned reply may still be in flight.
    fn submit(&mut self, command: &Command) -> Result<Box<dyn Reply>, TransportError>;

    /// Open a cursor over the next result set of `reply`.
    ///
    /// Only valid after [`Reply::wait`] returned and
    /// [`Reply::has_result_sets`] is `true`.
    fn open_cursor(&mut self, reply: &mut dyn Reply) -> Result<Box<dyn Cursor>, TransportError>;

    /// Cheap liveness probe.
    fn is_valid(&mut self) -> bool;

    /// Clear protocol-level session state so the connection can be reused.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Close the connection.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// The server's (possibly multi-part) response to one command.
pub trait Reply: Send {
    /// Block until the next part of the reply is available.
    fn wait(&mut self) -> Result<(), TransportError>;

    /// Whether a further row-bearing result set can be opened.
    fn has_result_sets(&self) -> bool;

    /// Number of error entries reported so far.
    fn error_count(&self) -> usize;

    /// The first reported error, if any.
    fn error(&self) -> Option<ServerError>;

    /// Non-fatal diagnostics reported so far, starting at index `from`.
    ///
    /// The underlying list only grows and is never reordered, so a caller
    /// that remembers how many entries it has seen can pass that count to
    /// receive just the new ones.
    fn diagnostics(&self, from: usize) -> Vec<Diagnostic>;

    /// Rows affected by the command.
    fn affected_rows(&self) -> u64 {
        0
    }

    /// Auto-generated id of the last inserted row.
    fn last_insert_id(&self) -> u64 {
        0
    }
}

/// Live, row-producing handle for one result set within a reply.
pub trait Cursor: Send {
    /// Block until the pending operation (metadata or a fetch) completes.
    fn wait(&mut self) -> Result<(), TransportError>;

    /// Column metadata; available after the first [`wait`](Cursor::wait).
    fn columns(&self) -> &[ColumnInfo];

    /// Push up to `count` rows into `processor`.
    ///
    /// Never delivers more rows than requested. Calls
    /// [`RowProcessor::end_of_data`] once the set has no further rows.
    fn fetch_rows(
        &mut self,
        processor: &mut dyn RowProcessor,
        count: FetchCount,
    ) -> Result<(), TransportError>;

    /// Close the cursor, discarding any rows the server still holds.
    fn close(&mut self) -> Result<(), TransportError>;
}
