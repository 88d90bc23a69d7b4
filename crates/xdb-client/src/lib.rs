//! # xdb-client
//!
//! Blocking client runtime for pipelined, multi-result-set database
//! protocols.
//!
//! This is the primary public API surface of the xdb workspace. A [`Client`]
//! owns a connection pool, hands out [`Session`]s, and every command run on
//! a session returns a [`ResultCursor`] that streams rows lazily.
//!
//! ## Features
//!
//! - **Pooled sessions**: bounded pool with idle TTL, liveness probes and checkout deadlines
//! - **Streaming results**: rows fetched in bounded batches into a FIFO cache
//! - **Multiple result sets**: advance across sets, unread rows are discarded server-side
//! - **Pipeline safety**: a new command first stores the previous, undrained result
//! - **Diagnostics**: warnings accumulate across partial fetches without loss or duplication
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xdb_client::{Client, ClientOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(Arc::new(source), ClientOptions::default())?;
//!     let session = client.get_session()?;
//!
//!     let mut result = session.sql("SELECT id, name FROM users")?;
//!     for row in result.rows() {
//!         let row = row?;
//!         println!("User: {:?}", row.get_str_by_name("name"));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod client;
pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod error;
pub mod instrumentation;
pub mod row;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use catalog::ObjectKind;
pub use client::Client;
pub use config::ClientOptions;
pub use cursor::{DEFAULT_PREFETCH, ResultCursor, RowFilter, Rows};
pub use diagnostics::Diagnostics;
pub use error::{Error, Result};
pub use row::{ColumnSet, RawRow};
pub use session::Session;
pub use state::CursorState;
pub use xdb_pool::PoolConfig;
pub use xdb_transport::{Command, Diagnostic, FetchCount, ServerError, Severity};
