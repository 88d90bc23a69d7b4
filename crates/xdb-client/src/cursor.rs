//! Streaming over the result sets of one reply.
//!
//! A [`ResultCursor`] walks the result sets of a reply in server order. Rows
//! of the current set are fetched from the live transport cursor in batches
//! of `prefetch` rows into a FIFO cache and handed out one by one. A set can
//! be abandoned at any point: advancing closes its live cursor, which
//! discards the unread rows on the server side.
//!
//! While rows or result sets are still on the wire the result is registered
//! with its session. Before the session sends another command it calls
//! [`store`](ResultCursor::store), which moves everything left in the reply
//! into memory so the connection is free again.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use bytes::BytesMut;
use parking_lot::Mutex;
use xdb_transport::{
    ColumnInfo, Cursor, Diagnostic, FetchCount, Reply, RowProcessor, ServerError, TransportError,
};

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::instrumentation::{OperationTimer, span_names};
use crate::row::{ColumnSet, RawRow};
use crate::session::SessionCore;
use crate::state::CursorState;

/// Default number of rows requested per fetch.
pub const DEFAULT_PREFETCH: u64 = 1024;

/// Predicate deciding which fetched rows enter the cache.
pub type RowFilter = Arc<dyn Fn(&RawRow) -> bool + Send + Sync>;

/// A result set buffered by `store()`.
enum StoredSet {
    Rows {
        columns: Arc<ColumnSet>,
        rows: VecDeque<RawRow>,
    },
    Failed(ServerError),
}

pub(crate) struct ResultState {
    id: u64,
    reply: Box<dyn Reply>,
    cursor: Option<Box<dyn Cursor>>,
    columns: Arc<ColumnSet>,
    /// A row-bearing set is current (possibly drained).
    has_set: bool,
    cache: VecDeque<RawRow>,
    pending_rows: bool,
    initialized: bool,
    /// The reply has no further sets on the wire.
    reply_done: bool,
    /// Sets materialized by `store()`, replayed by later advances.
    stored: Option<VecDeque<StoredSet>>,
    diagnostics: Diagnostics,
    filter: Option<RowFilter>,
    prefetch: u64,
    session: Weak<SessionCore>,
    registered: bool,
    closed: bool,
}

impl ResultState {
    pub(crate) fn new(
        id: u64,
        reply: Box<dyn Reply>,
        session: Weak<SessionCore>,
        filter: Option<RowFilter>,
    ) -> Self {
        Self {
            id,
            reply,
            cursor: None,
            columns: Arc::default(),
            has_set: false,
            cache: VecDeque::new(),
            pending_rows: false,
            initialized: false,
            reply_done: false,
            stored: None,
            diagnostics: Diagnostics::default(),
            filter,
            prefetch: DEFAULT_PREFETCH,
            session,
            registered: true,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ResultClosed);
        }
        Ok(())
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.advance_result_set()?;
        }
        Ok(())
    }

    pub(crate) fn advance_result_set(&mut self) -> Result<CursorState> {
        self.ensure_open()?;
        self.initialized = true;
        self.discard_current();

        if let Some(stored) = self.stored.as_mut() {
            return match stored.pop_front() {
                Some(StoredSet::Rows { columns, rows }) => {
                    tracing::trace!(rows = rows.len(), "replaying stored result set");
                    self.columns = columns;
                    self.cache = rows;
                    self.has_set = true;
                    Ok(CursorState::HasRows)
                }
                Some(StoredSet::Failed(e)) => {
                    // nothing follows an error
                    stored.clear();
                    Err(Error::Server(e))
                }
                None => Ok(CursorState::ExhaustedDone),
            };
        }

        if self.reply_done {
            return Ok(CursorState::ExhaustedDone);
        }

        match self.next_live_set() {
            Ok(Some((columns, cursor))) => {
                tracing::debug!(result_id = self.id, columns = columns.len(), "advanced to next result set");
                self.columns = columns;
                self.cursor = Some(cursor);
                self.has_set = true;
                self.pending_rows = true;
                Ok(CursorState::HasRows)
            }
            Ok(None) => {
                tracing::debug!(result_id = self.id, "reply has no further result sets");
                self.finish();
                Ok(CursorState::ExhaustedDone)
            }
            Err(e) => {
                tracing::debug!(result_id = self.id, error = %e, "advancing result set failed");
                self.finish();
                Err(e)
            }
        }
    }

    /// Wait for the next part of the reply and open a cursor over it.
    fn next_live_set(&mut self) -> Result<Option<(Arc<ColumnSet>, Box<dyn Cursor>)>> {
        self.reply.wait()?;
        if let Some(err) = self.reply.error() {
            return Err(Error::Server(err));
        }
        if !self.reply.has_result_sets() {
            return Ok(None);
        }

        let core = self.session.upgrade().ok_or(Error::SessionClosed)?;
        let mut cursor = core.open_cursor(self.reply.as_mut())?;
        cursor.wait()?;
        let columns = Arc::new(ColumnSet::new(cursor.columns().to_vec()));
        Ok(Some((columns, cursor)))
    }

    /// Drop the current set: live cursor, cached rows and metadata.
    fn discard_current(&mut self) {
        if self.pending_rows {
            tracing::trace!(result_id = self.id, "discarding undrained rows");
        }
        self.close_cursor();
        self.pending_rows = false;
        self.cache.clear();
        self.columns = Arc::default();
        self.has_set = false;
    }

    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                tracing::warn!(result_id = self.id, error = %e, "error closing cursor");
            }
        }
    }

    /// The reply is fully consumed.
    fn finish(&mut self) {
        self.close_cursor();
        self.pending_rows = false;
        self.reply_done = true;
        self.load_diagnostics();
        self.deregister();
    }

    fn end_of_set(&mut self) {
        self.pending_rows = false;
        self.close_cursor();
        // a following set or error part only becomes visible after a wait
        if let Err(e) = self.reply.wait() {
            // stay registered; the next advance or store reports it
            tracing::warn!(result_id = self.id, error = %e, "error waiting for next reply part");
            self.load_diagnostics();
            return;
        }
        self.load_diagnostics();
        if !self.reply.has_result_sets() && self.reply.error_count() == 0 {
            self.deregister();
        }
    }

    fn load_diagnostics(&mut self) {
        let complete = self.reply_done && !self.pending_rows;
        self.diagnostics.load(self.reply.as_ref(), complete);
    }

    fn deregister(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        if let Some(core) = self.session.upgrade() {
            core.deregister(self.id);
        }
    }

    pub(crate) fn load_cache(&mut self, count: FetchCount) -> Result<()> {
        self.ensure_open()?;
        self.ensure_initialized()?;

        if !self.cache.is_empty() && !count.is_all() {
            return Ok(());
        }
        if !self.pending_rows {
            return Ok(());
        }

        let timer = OperationTimer::start(span_names::FETCH);
        while self.pending_rows {
            let before = self.cache.len();
            let Some(cursor) = self.cursor.as_mut() else {
                self.pending_rows = false;
                break;
            };

            let mut sink = RowSink::new(&self.columns, self.filter.as_ref(), &mut self.cache);
            let fetched = cursor
                .fetch_rows(&mut sink, count)
                .and_then(|()| cursor.wait());
            let (seen, ended) = (sink.seen, sink.ended);

            if let Err(e) = fetched {
                tracing::debug!(result_id = self.id, error = %e, "row fetch failed");
                self.finish();
                return Err(e.into());
            }
            tracing::trace!(
                result_id = self.id,
                seen,
                cached = self.cache.len() - before,
                "loaded rows into cache"
            );

            if ended {
                self.end_of_set();
            } else if seen == 0 {
                self.finish();
                return Err(TransportError::Protocol("fetch returned no rows before end of data".into()).into());
            } else if !count.is_all() && self.cache.len() > before {
                break;
            }
        }
        timer.finish();
        Ok(())
    }

    pub(crate) fn get_row(&mut self) -> Result<Option<RawRow>> {
        self.ensure_open()?;
        if let Some(row) = self.cache.pop_front() {
            return Ok(Some(row));
        }
        self.load_cache(FetchCount::Rows(self.prefetch))?;
        Ok(self.cache.pop_front())
    }

    pub(crate) fn store(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending_rows {
            self.load_cache(FetchCount::All)?;
        }
        if self.stored.is_some() || self.reply_done {
            self.deregister();
            return Ok(());
        }

        let mut sets = VecDeque::new();
        loop {
            match self.next_live_set() {
                Ok(Some((columns, mut cursor))) => {
                    let mut rows = VecDeque::new();
                    let drained = drain_cursor(cursor.as_mut(), &columns, self.filter.as_ref(), &mut rows);
                    if let Err(e) = cursor.close() {
                        tracing::warn!(result_id = self.id, error = %e, "error closing cursor");
                    }
                    if let Err(e) = drained {
                        self.finish();
                        return Err(e.into());
                    }
                    sets.push_back(StoredSet::Rows { columns, rows });
                }
                Ok(None) => break,
                Err(Error::Server(e)) => {
                    sets.push_back(StoredSet::Failed(e));
                    break;
                }
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }

        tracing::debug!(result_id = self.id, sets = sets.len(), "stored remaining result sets");
        self.stored = Some(sets);
        self.finish();
        Ok(())
    }

    /// Discard everything left in the reply, including later sets.
    fn discard_remaining(&mut self) {
        self.discard_current();
        if self.stored.take().is_none() && !self.reply_done {
            loop {
                match self.next_live_set() {
                    Ok(Some((_, mut cursor))) => {
                        if let Err(e) = cursor.close() {
                            tracing::warn!(result_id = self.id, error = %e, "error closing cursor");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(Error::Server(e)) => {
                        tracing::debug!(result_id = self.id, error = %e, "discarded server error");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(result_id = self.id, error = %e, "error discarding result");
                        break;
                    }
                }
            }
        }
        self.finish();
    }

    fn more_sets(&self) -> bool {
        match &self.stored {
            Some(stored) => !stored.is_empty(),
            None => {
                !self.reply_done && (self.reply.has_result_sets() || self.reply.error_count() > 0)
            }
        }
    }

    fn state(&self) -> CursorState {
        if !self.initialized {
            CursorState::Uninitialized
        } else if !self.cache.is_empty() || self.pending_rows {
            CursorState::HasRows
        } else if self.more_sets() {
            CursorState::ExhaustedHasMoreSets
        } else {
            CursorState::ExhaustedDone
        }
    }

    fn columns(&mut self) -> Result<Arc<ColumnSet>> {
        self.ensure_open()?;
        self.ensure_initialized()?;
        if !self.has_set {
            return Err(Error::NoResultSet);
        }
        Ok(Arc::clone(&self.columns))
    }
}

impl Drop for ResultState {
    fn drop(&mut self) {
        if !self.closed {
            self.discard_remaining();
        }
    }
}

/// Drain every remaining row of `cursor` into `out`.
fn drain_cursor(
    cursor: &mut dyn Cursor,
    columns: &Arc<ColumnSet>,
    filter: Option<&RowFilter>,
    out: &mut VecDeque<RawRow>,
) -> std::result::Result<(), TransportError> {
    loop {
        let mut sink = RowSink::new(columns, filter, out);
        cursor.fetch_rows(&mut sink, FetchCount::All)?;
        cursor.wait()?;
        if sink.ended {
            return Ok(());
        }
        if sink.seen == 0 {
            return Err(TransportError::Protocol(
                "fetch returned no rows before end of data".into(),
            ));
        }
    }
}

/// Assembles pushed fields into rows and appends the accepted ones.
struct RowSink<'a> {
    columns: &'a Arc<ColumnSet>,
    filter: Option<&'a RowFilter>,
    out: &'a mut VecDeque<RawRow>,
    fields: Vec<Option<BytesMut>>,
    seen: u64,
    ended: bool,
}

impl<'a> RowSink<'a> {
    fn new(
        columns: &'a Arc<ColumnSet>,
        filter: Option<&'a RowFilter>,
        out: &'a mut VecDeque<RawRow>,
    ) -> Self {
        Self {
            columns,
            filter,
            out,
            fields: Vec::with_capacity(columns.len()),
            seen: 0,
            ended: false,
        }
    }
}

impl RowProcessor for RowSink<'_> {
    fn row_begin(&mut self, _row: u64) -> bool {
        self.seen += 1;
        self.fields.clear();
        self.fields.resize_with(self.columns.len(), || None);
        true
    }

    fn field_begin(&mut self, column: usize, size_hint: usize) {
        if column >= self.fields.len() {
            self.fields.resize_with(column + 1, || None);
        }
        self.fields[column] = Some(BytesMut::with_capacity(size_hint));
    }

    fn field_data(&mut self, column: usize, data: &[u8]) {
        if let Some(Some(buf)) = self.fields.get_mut(column) {
            buf.extend_from_slice(data);
        }
    }

    fn field_null(&mut self, column: usize) {
        if let Some(slot) = self.fields.get_mut(column) {
            *slot = None;
        }
    }

    fn row_end(&mut self, _row: u64) {
        let fields = self
            .fields
            .drain(..)
            .map(|f| f.map(BytesMut::freeze))
            .collect();
        let row = RawRow::new(Arc::clone(self.columns), fields);
        if self.filter.is_none_or(|keep| keep(&row)) {
            self.out.push_back(row);
        }
    }

    fn end_of_data(&mut self) {
        self.ended = true;
    }
}

/// The rows and result sets of one command's reply.
///
/// Obtained from [`Session::execute`](crate::Session::execute). The cursor
/// starts [`Uninitialized`](CursorState::Uninitialized); the first row read
/// or [`advance_result_set`](Self::advance_result_set) call moves it to the
/// first result set. Dropping the cursor discards whatever is left.
///
/// # Example
///
/// ```rust,ignore
/// let mut result = session.sql("CALL three_sets()")?;
/// while result.advance_result_set()?.has_rows() {
///     while let Some(row) = result.get_row()? {
///         println!("{:?}", row.get_str(0));
///     }
/// }
/// println!("{} warnings", result.warning_count());
/// ```
pub struct ResultCursor {
    state: Arc<Mutex<ResultState>>,
}

impl ResultCursor {
    pub(crate) fn new(state: Arc<Mutex<ResultState>>) -> Self {
        Self { state }
    }

    /// Move to the next result set.
    ///
    /// Unread rows of the current set are discarded. Returns
    /// [`HasRows`](CursorState::HasRows) when a new row-bearing set is open
    /// and [`ExhaustedDone`](CursorState::ExhaustedDone) when the reply has
    /// nothing left. A server error is returned once, by the call that
    /// reaches it; later calls report `ExhaustedDone`.
    pub fn advance_result_set(&mut self) -> Result<CursorState> {
        self.state.lock().advance_result_set()
    }

    /// Next row of the current result set, or `None` when it is drained.
    ///
    /// Rows come in server order. Once the set is drained every further call
    /// returns `None` until the cursor is advanced.
    pub fn get_row(&mut self) -> Result<Option<RawRow>> {
        self.state.lock().get_row()
    }

    /// Make sure the row cache holds rows, fetching up to `count` if empty.
    ///
    /// [`FetchCount::All`] drains the current set into the cache.
    pub fn load_cache(&mut self, count: FetchCount) -> Result<()> {
        self.state.lock().load_cache(count)
    }

    /// Move everything left in the reply into memory.
    ///
    /// This frees the session for the next command. Later advances replay
    /// the buffered sets in order.
    pub fn store(&mut self) -> Result<()> {
        self.state.lock().store()
    }

    /// Buffer the rest of the current set and count its unread rows.
    pub fn count(&mut self) -> Result<usize> {
        let mut state = self.state.lock();
        state.load_cache(FetchCount::All)?;
        Ok(state.cache.len())
    }

    /// Read every remaining row of the current set.
    pub fn fetch_all(&mut self) -> Result<Vec<RawRow>> {
        let mut state = self.state.lock();
        state.load_cache(FetchCount::All)?;
        Ok(state.cache.drain(..).collect())
    }

    /// Iterate over the remaining rows of the current set.
    pub fn rows(&mut self) -> Rows<'_> {
        Rows {
            cursor: self,
            failed: false,
        }
    }

    /// Column metadata of the current set.
    pub fn columns(&self) -> Result<Arc<ColumnSet>> {
        self.state.lock().columns()
    }

    /// Number of columns in the current set.
    pub fn column_count(&self) -> Result<usize> {
        self.columns().map(|c| c.len())
    }

    /// Metadata of one column, `None` if the ordinal is out of range.
    pub fn column(&self, index: usize) -> Result<Option<ColumnInfo>> {
        self.columns().map(|c| c.get(index).cloned())
    }

    /// Set how many rows each fetch requests.
    pub fn set_prefetch(&mut self, rows: u64) {
        self.state.lock().prefetch = rows.max(1);
    }

    /// Rows requested per fetch.
    #[must_use]
    pub fn prefetch(&self) -> u64 {
        self.state.lock().prefetch
    }

    /// Number of diagnostics reported so far.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        let mut state = self.state.lock();
        state.load_diagnostics();
        state.diagnostics.len()
    }

    /// Diagnostic entry by position.
    #[must_use]
    pub fn warning(&self, index: usize) -> Option<Diagnostic> {
        let mut state = self.state.lock();
        state.load_diagnostics();
        state.diagnostics.get(index).cloned()
    }

    /// All diagnostics reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let mut state = self.state.lock();
        state.load_diagnostics();
        state.diagnostics.clone()
    }

    /// Rows affected by the command.
    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.state.lock().reply.affected_rows()
    }

    /// Auto-generated id of the last inserted row.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.state.lock().reply.last_insert_id()
    }

    /// Current position in the reply.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state.lock().state()
    }

    /// Discard unread rows and result sets and release the session.
    ///
    /// Closing twice is a no-op. Reading from a closed cursor fails with
    /// [`Error::ResultClosed`].
    pub fn close(&mut self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.discard_remaining();
        state.closed = true;
    }
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResultCursor")
            .field("id", &state.id)
            .field("state", &state.state())
            .field("cached", &state.cache.len())
            .finish()
    }
}

/// Iterator over the remaining rows of a result set.
///
/// Yields an error at most once, then stops.
pub struct Rows<'a> {
    cursor: &'a mut ResultCursor,
    failed: bool,
}

impl Iterator for Rows<'_> {
    type Item = Result<RawRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.cursor.get_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
