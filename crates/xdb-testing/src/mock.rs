//! Mock data source, session, reply and cursor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use xdb_transport::{
    ColumnInfo, Command, Cursor, DataSource, Diagnostic, Endpoint, FetchCount, PhysicalSession,
    Reply, RowProcessor, ServerError, SessionConnector, TransportError,
};

use crate::script::{ReplyPart, ReplyScript};

/// Field chunk size; longer fields are pushed in several `field_data` calls.
const CHUNK: usize = 4;

type Handler = dyn Fn(&Command) -> ReplyScript + Send + Sync;

struct MockShared {
    handler: Box<Handler>,
    next_id: AtomicU64,
    created: AtomicUsize,
    closed: AtomicUsize,
    resets: AtomicUsize,
    probes: AtomicUsize,
    submits: AtomicUsize,
    fetches: AtomicUsize,
    cursor_closes: AtomicUsize,
    fail_probes: AtomicUsize,
    fail_resets: AtomicUsize,
    fail_connects: AtomicUsize,
    statements: Mutex<Vec<String>>,
    refused_hosts: Mutex<Vec<String>>,
    endpoints: Mutex<Vec<Endpoint>>,
}

/// Snapshot of what the runtime did to mock sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MockCounters {
    /// Sessions opened.
    pub created: usize,
    /// Sessions closed.
    pub closed: usize,
    /// Resets performed (including failed ones).
    pub resets: usize,
    /// Liveness probes performed (including failed ones).
    pub probes: usize,
    /// Commands submitted.
    pub submits: usize,
    /// Row fetch calls.
    pub fetches: usize,
    /// Cursors closed explicitly.
    pub cursor_closes: usize,
}

impl MockCounters {
    /// Sessions opened and not yet closed.
    #[must_use]
    pub fn live(&self) -> usize {
        self.created.saturating_sub(self.closed)
    }
}

/// A scripted data source.
///
/// Cloning is cheap; clones share counters, faults and the script.
#[derive(Clone)]
pub struct MockSource {
    shared: Arc<MockShared>,
}

impl MockSource {
    /// Create a source whose sessions answer commands with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Command) -> ReplyScript + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(MockShared {
                handler: Box::new(handler),
                next_id: AtomicU64::new(1),
                created: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                resets: AtomicUsize::new(0),
                probes: AtomicUsize::new(0),
                submits: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                cursor_closes: AtomicUsize::new(0),
                fail_probes: AtomicUsize::new(0),
                fail_resets: AtomicUsize::new(0),
                fail_connects: AtomicUsize::new(0),
                statements: Mutex::new(Vec::new()),
                refused_hosts: Mutex::new(Vec::new()),
                endpoints: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A source answering every command with an empty OK reply.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(|_| ReplyScript::new())
    }

    /// A source answering every command with `script`.
    #[must_use]
    pub fn fixed(script: ReplyScript) -> Self {
        Self::new(move |_| script.clone())
    }

    /// Current counters.
    #[must_use]
    pub fn counters(&self) -> MockCounters {
        let s = &self.shared;
        MockCounters {
            created: s.created.load(Ordering::SeqCst),
            closed: s.closed.load(Ordering::SeqCst),
            resets: s.resets.load(Ordering::SeqCst),
            probes: s.probes.load(Ordering::SeqCst),
            submits: s.submits.load(Ordering::SeqCst),
            fetches: s.fetches.load(Ordering::SeqCst),
            cursor_closes: s.cursor_closes.load(Ordering::SeqCst),
        }
    }

    /// Statements submitted so far, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.lock().clone()
    }

    /// Endpoints connected through [`SessionConnector`], in order.
    #[must_use]
    pub fn connected_endpoints(&self) -> Vec<Endpoint> {
        self.shared.endpoints.lock().clone()
    }

    /// Make the next `n` liveness probes fail.
    pub fn fail_next_probes(&self, n: usize) {
        self.shared.fail_probes.fetch_add(n, Ordering::SeqCst);
    }

    /// Make the next `n` resets fail.
    pub fn fail_next_resets(&self, n: usize) {
        self.shared.fail_resets.fetch_add(n, Ordering::SeqCst);
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.fail_connects.fetch_add(n, Ordering::SeqCst);
    }

    /// Refuse connections to `host` when used as a [`SessionConnector`].
    pub fn refuse_host(&self, host: impl Into<String>) {
        self.shared.refused_hosts.lock().push(host.into());
    }

    fn open(&self) -> Result<Box<dyn PhysicalSession>, TransportError> {
        if take_fault(&self.shared.fail_connects) {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session_id = id, "mock session opened");
        Ok(Box::new(MockSession {
            id,
            shared: Arc::clone(&self.shared),
            closed: false,
            current: None,
        }))
    }
}

impl DataSource for MockSource {
    fn connect(&self) -> Result<Box<dyn PhysicalSession>, TransportError> {
        self.open()
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

impl SessionConnector for MockSource {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn PhysicalSession>, TransportError> {
        if self.shared.refused_hosts.lock().contains(&endpoint.host) {
            return Err(TransportError::ConnectionClosed);
        }
        let session = self.open()?;
        self.shared.endpoints.lock().push(endpoint.clone());
        Ok(session)
    }
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSource")
            .field("counters", &self.counters())
            .finish()
    }
}

fn take_fault(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

struct ReplyState {
    parts: VecDeque<ReplyPart>,
    diagnostics: Vec<Diagnostic>,
    trailing: Vec<Diagnostic>,
    error: Option<ServerError>,
    affected_rows: u64,
    last_insert_id: u64,
}

impl ReplyState {
    fn new(script: ReplyScript) -> Self {
        Self {
            parts: script.parts.into(),
            diagnostics: Vec::new(),
            trailing: script.trailing_warnings,
            error: None,
            affected_rows: script.affected_rows,
            last_insert_id: script.last_insert_id,
        }
    }

    fn deliver_trailing_if_done(&mut self) {
        if self.parts.is_empty() {
            let trailing = std::mem::take(&mut self.trailing);
            self.diagnostics.extend(trailing);
        }
    }
}

struct MockSession {
    id: u64,
    shared: Arc<MockShared>,
    closed: bool,
    current: Option<Arc<Mutex<ReplyState>>>,
}

impl PhysicalSession for MockSession {
    fn submit(&mut self, command: &Command) -> Result<Box<dyn Reply>, TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.shared.submits.fetch_add(1, Ordering::SeqCst);
        self.shared
            .statements
            .lock()
            .push(command.statement().to_string());

        let script = (self.shared.handler)(command);
        let state = Arc::new(Mutex::new(ReplyState::new(script)));
        self.current = Some(Arc::clone(&state));
        Ok(Box::new(MockReply { state }))
    }

    fn open_cursor(&mut self, _reply: &mut dyn Reply) -> Result<Box<dyn Cursor>, TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        let state = self
            .current
            .clone()
            .ok_or_else(|| TransportError::Protocol("no reply in flight".into()))?;

        let set = {
            let mut guard = state.lock();
            match guard.parts.pop_front() {
                Some(ReplyPart::Rows(set)) => set,
                Some(part @ ReplyPart::Error(_)) => {
                    guard.parts.push_front(part);
                    return Err(TransportError::Protocol("next reply part is an error".into()));
                }
                None => return Err(TransportError::Protocol("no result set to open".into())),
            }
        };

        Ok(Box::new(MockCursor {
            columns: set.columns,
            rows: set.rows.into(),
            warnings: set.warnings,
            reply: state,
            shared: Arc::clone(&self.shared),
            row_no: 0,
            finished: false,
        }))
    }

    fn is_valid(&mut self) -> bool {
        self.shared.probes.fetch_add(1, Ordering::SeqCst);
        !self.closed && !take_fault(&self.shared.fail_probes)
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        self.shared.resets.fetch_add(1, Ordering::SeqCst);
        if take_fault(&self.shared.fail_resets) {
            return Err(TransportError::ConnectionClosed);
        }
        self.current = None;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            self.current = None;
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(session_id = self.id, "mock session closed");
        }
        Ok(())
    }
}

struct MockReply {
    state: Arc<Mutex<ReplyState>>,
}

impl Reply for MockReply {
    fn wait(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if matches!(state.parts.front(), Some(ReplyPart::Error(_))) {
            if let Some(ReplyPart::Error(e)) = state.parts.pop_front() {
                state.error = Some(e);
            }
            // nothing follows an error
            state.parts.clear();
        }
        state.deliver_trailing_if_done();
        Ok(())
    }

    fn has_result_sets(&self) -> bool {
        let state = self.state.lock();
        state.error.is_none() && matches!(state.parts.front(), Some(ReplyPart::Rows(_)))
    }

    fn error_count(&self) -> usize {
        usize::from(self.state.lock().error.is_some())
    }

    fn error(&self) -> Option<ServerError> {
        self.state.lock().error.clone()
    }

    fn diagnostics(&self, from: usize) -> Vec<Diagnostic> {
        self.state
            .lock()
            .diagnostics
            .get(from..)
            .map(<[Diagnostic]>::to_vec)
            .unwrap_or_default()
    }

    fn affected_rows(&self) -> u64 {
        self.state.lock().affected_rows
    }

    fn last_insert_id(&self) -> u64 {
        self.state.lock().last_insert_id
    }
}

struct MockCursor {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Option<Bytes>>>,
    warnings: Vec<Diagnostic>,
    reply: Arc<Mutex<ReplyState>>,
    shared: Arc<MockShared>,
    row_no: u64,
    finished: bool,
}

impl MockCursor {
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let mut reply = self.reply.lock();
        reply.diagnostics.append(&mut self.warnings);
        reply.deliver_trailing_if_done();
    }

    fn push_row(&mut self, processor: &mut dyn RowProcessor, row: Vec<Option<Bytes>>) {
        let n = self.row_no;
        self.row_no += 1;
        if !processor.row_begin(n) {
            return;
        }
        for (col, field) in row.into_iter().enumerate() {
            match field {
                Some(bytes) => {
                    processor.field_begin(col, bytes.len());
                    for chunk in bytes.chunks(CHUNK) {
                        processor.field_data(col, chunk);
                    }
                    processor.field_end(col);
                }
                None => processor.field_null(col),
            }
        }
        processor.row_end(n);
    }
}

impl Cursor for MockCursor {
    fn wait(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn fetch_rows(
        &mut self,
        processor: &mut dyn RowProcessor,
        count: FetchCount,
    ) -> Result<(), TransportError> {
        self.shared.fetches.fetch_add(1, Ordering::SeqCst);

        let mut delivered = 0;
        while !count.is_satisfied_by(delivered) {
            let Some(row) = self.rows.pop_front() else {
                break;
            };
            self.push_row(processor, row);
            delivered += 1;
        }

        if self.rows.is_empty() && !self.finished {
            self.finish();
            processor.end_of_data();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.shared.cursor_closes.fetch_add(1, Ordering::SeqCst);
        self.rows.clear();
        self.finish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ResultSetScript;

    #[derive(Default)]
    struct Collect {
        rows: Vec<Vec<Option<Vec<u8>>>>,
        current: Vec<Option<Vec<u8>>>,
        ended: bool,
    }

    impl RowProcessor for Collect {
        fn row_begin(&mut self, _row: u64) -> bool {
            self.current.clear();
            true
        }
        fn field_begin(&mut self, column: usize, _size_hint: usize) {
            self.current.resize(column + 1, None);
            self.current[column] = Some(Vec::new());
        }
        fn field_data(&mut self, column: usize, data: &[u8]) {
            if let Some(Some(buf)) = self.current.get_mut(column) {
                buf.extend_from_slice(data);
            }
        }
        fn field_null(&mut self, column: usize) {
            self.current.resize(column + 1, None);
        }
        fn row_end(&mut self, _row: u64) {
            self.rows.push(std::mem::take(&mut self.current));
        }
        fn end_of_data(&mut self) {
            self.ended = true;
        }
    }

    #[test]
    fn test_fetch_respects_count_and_signals_end() {
        let source = MockSource::fixed(
            ReplyScript::new().result_set(ResultSetScript::ints("n", [10, 20, 30])),
        );
        let mut session = DataSource::connect(&source).unwrap();
        let mut reply = session.submit(&Command::new("q")).unwrap();
        reply.wait().unwrap();
        assert!(reply.has_result_sets());

        let mut cursor = session.open_cursor(reply.as_mut()).unwrap();
        let mut sink = Collect::default();
        cursor.fetch_rows(&mut sink, FetchCount::Rows(2)).unwrap();
        assert_eq!(sink.rows.len(), 2);
        assert!(!sink.ended);

        cursor.fetch_rows(&mut sink, FetchCount::All).unwrap();
        assert_eq!(sink.rows.len(), 3);
        assert!(sink.ended);
        assert_eq!(sink.rows[2][0].as_deref(), Some(&b"30"[..]));
        assert!(!reply.has_result_sets());
    }

    #[test]
    fn test_long_fields_arrive_in_chunks() {
        let source = MockSource::fixed(
            ReplyScript::new().result_set(ResultSetScript::text(&["s"]).row(&[Some("abcdefghij")])),
        );
        let mut session = DataSource::connect(&source).unwrap();
        let mut reply = session.submit(&Command::new("q")).unwrap();
        reply.wait().unwrap();
        let mut cursor = session.open_cursor(reply.as_mut()).unwrap();
        let mut sink = Collect::default();
        cursor.fetch_rows(&mut sink, FetchCount::All).unwrap();
        assert_eq!(sink.rows[0][0].as_deref(), Some(&b"abcdefghij"[..]));
    }

    #[test]
    fn test_error_part_is_reported_on_wait() {
        let source = MockSource::fixed(
            ReplyScript::new().error(ServerError::new(1064, "42000", "syntax error")),
        );
        let mut session = DataSource::connect(&source).unwrap();
        let mut reply = session.submit(&Command::new("bad")).unwrap();
        reply.wait().unwrap();
        assert_eq!(reply.error_count(), 1);
        assert!(!reply.has_result_sets());
        assert_eq!(reply.error().unwrap().code, 1064);
    }

    #[test]
    fn test_faults_are_consumed_once() {
        let source = MockSource::empty();
        source.fail_next_probes(1);
        let mut session = DataSource::connect(&source).unwrap();
        assert!(!session.is_valid());
        assert!(session.is_valid());
        assert_eq!(source.counters().probes, 2);
    }

    #[test]
    fn test_counters_track_lifecycle() {
        let source = MockSource::empty();
        let mut a = DataSource::connect(&source).unwrap();
        let _b = DataSource::connect(&source).unwrap();
        a.close().unwrap();
        a.close().unwrap();
        let c = source.counters();
        assert_eq!(c.created, 2);
        assert_eq!(c.closed, 1);
        assert_eq!(c.live(), 1);
    }

    #[test]
    fn test_endpoint_connects_are_recorded() {
        let source = MockSource::empty();
        source.refuse_host("down");

        let refused = SessionConnector::connect(&source, &Endpoint::new("down", 1));
        assert!(matches!(refused, Err(TransportError::ConnectionClosed)));

        let _session = SessionConnector::connect(&source, &Endpoint::new("up", 2)).unwrap();
        assert_eq!(source.connected_endpoints(), [Endpoint::new("up", 2)]);
        assert_eq!(source.counters().created, 1);
    }
}
