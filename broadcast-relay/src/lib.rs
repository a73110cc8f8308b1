//! TCP broadcast relay.
//!
//! See `README.md` for usage. Every byte chunk read from one connection is
//! written verbatim to every other connection. Each module focuses on one
//! responsibility:
//!
//! - [`cli`] parses the command line into a [`config::RelayConfig`].
//! - [`relay`] binds the listener and wires the tasks together.
//! - [`acceptor`] accepts TCP connections and hands them to the coordinator.
//! - [`reader`] reads chunks from one connection and hands them over as
//!   [`message::Message`] values.
//! - [`coordinator`] is the single task that owns the peer set, processing
//!   one event at a time from four rendezvous channels.
//! - [`registry`] is the peer set itself; only the coordinator touches it.
//! - [`signal`] turns SIGINT/SIGTERM into a shutdown future.
//!
//! There is no framing: chunk boundaries are whatever a single read returned.

pub mod acceptor;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod reader;
pub mod registry;
pub mod relay;
pub mod signal;

pub use config::{RelayConfig, WriteFailurePolicy};
pub use error::RelayError;
pub use relay::{Relay, RelaySummary};
