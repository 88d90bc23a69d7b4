//! # xdb-transport
//!
//! Interfaces between the xdb session runtime and the transport layer that
//! actually speaks the wire protocol.
//!
//! The runtime never encodes requests or decodes values itself. It hands an
//! opaque [`Command`] to a [`PhysicalSession`], receives a [`Reply`], opens a
//! [`Cursor`] per row-bearing result set and lets the cursor push raw field
//! bytes into a [`RowProcessor`]. This crate defines those seams.
//!
//! ## Features
//!
//! - Object-safe session, reply and cursor traits
//! - Push-style row delivery with bounded fetch counts
//! - Server diagnostics and server errors as plain data
//! - Multi-endpoint data sources with priority-ordered failover
//!
//! ## Example
//!
//! ```rust,ignore
//! use xdb_transport::{Command, DataSource};
//!
//! let mut session = source.connect()?;
//! let mut reply = session.submit(&Command::new("SELECT 1"))?;
//! reply.wait()?;
//! if reply.has_result_sets() {
//!     let mut cursor = session.open_cursor(reply.as_mut())?;
//!     cursor.wait()?;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod column;
pub mod command;
pub mod diagnostic;
pub mod error;
pub mod row;
pub mod session;
pub mod source;

pub use column::ColumnInfo;
pub use command::Command;
pub use diagnostic::{Diagnostic, ServerError, Severity};
pub use error::TransportError;
pub use row::{FetchCount, RowProcessor};
pub use session::{Cursor, PhysicalSession, Reply};
pub use source::{DataSource, DynDataSource, Endpoint, MultiSource, SessionConnector};
