//! Logical sessions and command scheduling.
//!
//! A pipelined protocol cannot interleave a new command with the unread
//! remainder of a previous reply. A session therefore tracks the one result
//! that may still have data on the wire and stores it before sending the
//! next command.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use xdb_pool::Lease;
use xdb_transport::{Command, Cursor, Reply};

use crate::catalog::{self, ObjectKind};
use crate::cursor::{ResultCursor, ResultState, RowFilter};
use crate::error::{Error, Result};
use crate::instrumentation::{
    DB_SYSTEM, OperationTimer, extract_operation, sanitize_statement, span_names,
};

type Registration = (u64, Weak<Mutex<ResultState>>);

/// Shared part of a session, reachable from its results.
pub(crate) struct SessionCore {
    lease: Mutex<Option<Lease>>,
    /// The result that may still have unread data on the wire.
    registry: Mutex<Option<Registration>>,
    next_result_id: AtomicU64,
}

impl SessionCore {
    pub(crate) fn open_cursor(&self, reply: &mut dyn Reply) -> Result<Box<dyn Cursor>> {
        let lease = self.lease.lock();
        let lease = lease.as_ref().ok_or(Error::SessionClosed)?;
        let mut session = lease.session()?;
        Ok(session.open_cursor(reply)?)
    }

    pub(crate) fn deregister(&self, id: u64) {
        let mut registry = self.registry.lock();
        if registry.as_ref().is_some_and(|(registered, _)| *registered == id) {
            *registry = None;
        }
    }

    /// Register the result of a command just sent.
    ///
    /// `execute_with` reconciles before every submit, so the registry is
    /// empty here. A live entry means the pipeline order was broken.
    fn register(&self, id: u64, state: Weak<Mutex<ResultState>>) -> Result<()> {
        let mut registry = self.registry.lock();
        if registry
            .as_ref()
            .is_some_and(|(_, live)| live.strong_count() > 0)
        {
            return Err(Error::ResultPending);
        }
        *registry = Some((id, state));
        Ok(())
    }

    /// Store the registered result, if any, so the wire is free.
    fn reconcile(&self) -> Result<()> {
        // registry lock must not be held while locking a result
        let pending = self.registry.lock().as_ref().map(|(_, w)| w.clone());
        let Some(state) = pending.and_then(|w| w.upgrade()) else {
            *self.registry.lock() = None;
            return Ok(());
        };
        tracing::debug!("storing pending result before next command");
        let timer = OperationTimer::start(span_names::STORE);
        let stored = state.lock().store();
        timer.finish();
        stored
    }
}

/// A logical session on one checked-out connection.
///
/// Commands run in order. At most one result can still be reading from the
/// wire; executing another command first stores it into memory, so earlier
/// results stay readable.
///
/// Dropping the session (or calling [`release`](Self::release)) stores any
/// pending result and returns the connection to the pool.
///
/// # Example
///
/// ```rust,ignore
/// let session = client.get_session()?;
/// let mut first = session.sql("SELECT id FROM t")?;
/// let mut second = session.sql("SELECT 1")?; // stores `first`
/// while let Some(row) = first.get_row()? {
///     println!("{:?}", row.get_str(0));
/// }
/// ```
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    /// Create a session over a checked-out lease.
    #[must_use]
    pub fn new(lease: Lease) -> Self {
        tracing::info!(
            connection_id = lease.metadata().id,
            pooled = lease.is_pooled(),
            "session opened"
        );
        Self {
            core: Arc::new(SessionCore {
                lease: Mutex::new(Some(lease)),
                registry: Mutex::new(None),
                next_result_id: AtomicU64::new(1),
            }),
        }
    }

    /// Send a command and return a cursor over its reply.
    pub fn execute(&self, command: impl Into<Command>) -> Result<ResultCursor> {
        self.execute_with(command.into(), None)
    }

    /// Shorthand for [`execute`](Self::execute) with statement text.
    pub fn sql(&self, statement: &str) -> Result<ResultCursor> {
        self.execute(statement)
    }

    /// Send a command whose rows are kept only if `filter` accepts them.
    pub fn execute_filtered<F>(&self, command: impl Into<Command>, filter: F) -> Result<ResultCursor>
    where
        F: Fn(&crate::RawRow) -> bool + Send + Sync + 'static,
    {
        self.execute_with(command.into(), Some(Arc::new(filter)))
    }

    /// List the objects of `schema` that are of the given kind.
    ///
    /// Rows carry the object name in column 0 and its type in column 1.
    pub fn list_objects(&self, schema: &str, kind: ObjectKind) -> Result<ResultCursor> {
        let command = catalog::list_objects_command(schema, None)?;
        tracing::debug!(schema = schema, kind = %kind, "listing schema objects");
        self.execute_with(command, Some(catalog::kind_filter(kind)))
    }

    fn execute_with(&self, command: Command, filter: Option<RowFilter>) -> Result<ResultCursor> {
        let timer = OperationTimer::start(span_names::EXECUTE);
        self.core.reconcile()?;

        let reply = {
            let lease = self.core.lease.lock();
            let lease = lease.as_ref().ok_or(Error::SessionClosed)?;
            let mut session = lease.session()?;
            session.submit(&command)?
        };

        let id = self.core.next_result_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            result_id = id,
            db.system = DB_SYSTEM,
            db.operation = extract_operation(command.statement()),
            db.statement = %sanitize_statement(command.statement()),
            args = command.args().len(),
            "command submitted"
        );

        let state = Arc::new(Mutex::new(ResultState::new(
            id,
            reply,
            Arc::downgrade(&self.core),
            filter,
        )));
        self.core.register(id, Arc::downgrade(&state))?;
        timer.finish();

        Ok(ResultCursor::new(state))
    }

    /// Store any pending result and return the connection.
    ///
    /// Results created by this session stay readable as far as they were
    /// stored; anything that needs the wire fails with
    /// [`Error::SessionClosed`]. Releasing twice is a no-op.
    pub fn release(&self) {
        if let Err(e) = self.core.reconcile() {
            tracing::warn!(error = %e, "failed to store pending result on release");
        }
        let lease = self.core.lease.lock().take();
        if let Some(mut lease) = lease {
            tracing::info!(connection_id = lease.metadata().id, "session released");
            lease.release();
        }
    }

    /// Whether the session still holds its connection.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.core.lease.lock().is_some()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use xdb_testing::{MockSource, ReplyScript, ResultSetScript};
    use xdb_transport::DataSource;

    #[test]
    fn test_second_registration_is_rejected() {
        let source = MockSource::fixed(
            ReplyScript::new().result_set(ResultSetScript::ints("n", [1, 2])),
        );
        let session = Session::new(Lease::direct(&source).unwrap());
        let first = session.sql("SELECT n").unwrap();

        let mut other_conn = DataSource::connect(&source).unwrap();
        let reply = other_conn.submit(&Command::new("SELECT n")).unwrap();
        let other = Arc::new(Mutex::new(ResultState::new(99, reply, Weak::new(), None)));

        assert!(matches!(
            session.core.register(99, Arc::downgrade(&other)),
            Err(Error::ResultPending)
        ));

        // once the first result is gone the slot is free
        drop(first);
        assert!(session.core.register(99, Arc::downgrade(&other)).is_ok());
    }
}
