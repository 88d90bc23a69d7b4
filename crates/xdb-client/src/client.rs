//! Client entry point.

use std::time::Duration;

use xdb_pool::{Pool, PoolMetrics, PoolStatus};
use xdb_transport::DynDataSource;

use crate::config::ClientOptions;
use crate::error::Result;
use crate::instrumentation::{OperationTimer, span_names};
use crate::session::Session;

/// Entry point owning the connection pool for one data source.
///
/// The pool lives exactly as long as the client: [`Client::new`] creates
/// it and [`Client::close`] (or drop) shuts it down. Sessions already handed
/// out keep working until they are released; their connections are closed
/// then instead of being pooled.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use xdb_client::{Client, ClientOptions};
///
/// let options = ClientOptions::from_json(r#"{"pooling": {"maxSize": 10}}"#)?;
/// let client = Client::new(Arc::new(source), options)?;
///
/// let session = client.get_session()?;
/// let mut result = session.sql("SELECT id, name FROM users")?;
/// while let Some(row) = result.get_row()? {
///     println!("{:?}", row.get_str_by_name("name"));
/// }
/// ```
pub struct Client {
    pool: Pool,
    options: ClientOptions,
}

impl Client {
    /// Create a client over `source`.
    ///
    /// No connection is opened until the first session is requested.
    pub fn new(source: DynDataSource, options: ClientOptions) -> Result<Self> {
        let description = source.describe();
        let pool = Pool::new(source, options.pooling.clone())?;
        tracing::info!(source = %description, pooling = options.pooling.is_pooling(), "client created");
        Ok(Self { pool, options })
    }

    /// Create a client from a JSON options document.
    pub fn from_json(source: DynDataSource, options: &str) -> Result<Self> {
        Self::new(source, ClientOptions::from_json(options)?)
    }

    /// Open a session, waiting up to the configured queue timeout.
    pub fn get_session(&self) -> Result<Session> {
        let timer = OperationTimer::start(span_names::CHECKOUT);
        let lease = self.pool.get()?;
        timer.finish();
        Ok(Session::new(lease))
    }

    /// Open a session, waiting up to `timeout` (`None` waits indefinitely).
    pub fn get_session_timeout(&self, timeout: Option<Duration>) -> Result<Session> {
        Ok(Session::new(self.pool.acquire(timeout)?))
    }

    /// Shut the pool down.
    ///
    /// Idle connections are closed now, checked-out ones when their session
    /// is released. Later [`get_session`](Self::get_session) calls fail.
    pub fn close(&self) {
        if !self.pool.is_closed() {
            tracing::info!("client closing");
            self.pool.close();
        }
    }

    /// Whether the client was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Current pool status.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Pool metrics.
    #[must_use]
    pub fn pool_metrics(&self) -> PoolMetrics {
        self.pool.metrics()
    }

    /// Options the client was created with.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pool", &self.pool)
            .finish()
    }
}
