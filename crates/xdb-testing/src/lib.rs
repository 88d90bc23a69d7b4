//! # xdb-testing
//!
//! Test infrastructure for the xdb session runtime.
//!
//! [`MockSource`] is a [`DataSource`](xdb_transport::DataSource) whose
//! sessions answer every command from a script instead of a network peer.
//! It counts what the runtime does to its sessions (connects, probes,
//! resets, closes, fetches) and can inject faults, which is enough to drive
//! the pool and result-streaming logic through every path without a server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use xdb_testing::{MockSource, ReplyScript, ResultSetScript};
//!
//! let source = MockSource::new(|cmd| match cmd.statement() {
//!     "SELECT 1" => ReplyScript::new().result_set(ResultSetScript::ints("n", [1])),
//!     _ => ReplyScript::new(),
//! });
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;
pub mod script;

pub use mock::{MockCounters, MockSource};
pub use script::{ReplyPart, ReplyScript, ResultSetScript};
