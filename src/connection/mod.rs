//! Connection Module
//!
//! Accepted sockets are handed to [`handle_connection`], one spawned task
//! per client. [`ConnectionStats`] aggregates server-wide connection and
//! traffic counters, which the STATS command reports.

pub mod handler;

pub use handler::{handle_connection, ConnectionHandler, ConnectionStats};
