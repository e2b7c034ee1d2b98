//! Snapshot Module
//!
//! Point-in-time persistence for the store: a self-describing binary
//! codec plus a manager that owns the snapshot directory, performs
//! atomic write-then-rename saves, restores the latest image on demand,
//! drives the periodic capture schedule, and enforces retention.

pub mod codec;
pub mod manager;

pub use codec::{decode, encode, CodecError};
pub use manager::{SnapshotError, SnapshotManager};
