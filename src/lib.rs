//! # MilletDB - A Sharded In-Memory Key-Value Store
//!
//! MilletDB is an in-memory key-value database with bounded capacity,
//! per-key TTL and point-in-time persistence, speaking a simple
//! line-oriented text protocol over TCP.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            MilletDB                              │
//! │                                                                  │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐                │
//! │  │ TCP Server │──>│ Connection │──>│  Command   │                │
//! │  │ (Listener) │   │  Handler   │   │  Handler   │                │
//! │  └────────────┘   └────────────┘   └─────┬──────┘                │
//! │                                          │                       │
//! │                                          ▼                       │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                     ShardedStore                        │    │
//! │  │           snapshot gate (shared / exclusive)            │    │
//! │  │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐       │    │
//! │  │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ ...N    │       │    │
//! │  │  │LruTtlMap│ │LruTtlMap│ │LruTtlMap│ │ shards  │       │    │
//! │  │  └─────────┘ └─────────┘ └─────────┘ └─────────┘       │    │
//! │  └───────────────▲──────────────────────────▲─────────────┘    │
//! │                  │                          │                   │
//! │     ┌────────────┴─────────┐   ┌────────────┴────────────┐     │
//! │     │  BackgroundSweeper   │   │     SnapshotManager     │     │
//! │     │ (periodic TTL sweep) │   │ (periodic capture, load)│     │
//! │     └──────────────────────┘   └─────────────────────────┘     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Highlights
//!
//! ### Sharded concurrency
//!
//! Keys route to one of a power-of-two number of shards by a stable
//! content hash. Each shard is an independently locked LRU+TTL map, so
//! operations on different keys rarely contend.
//!
//! ### O(1) LRU with inline TTL
//!
//! Every shard keeps its entries on an arena-backed doubly linked recency
//! list; eviction, relinking and lookup are all constant time, and the
//! expiration instant lives inside the entry itself.
//!
//! ### Lazy + active expiry
//!
//! Expired keys are reclaimed by whichever comes first: the next access
//! that touches them, or the background sweeper's periodic scan.
//!
//! ### Consistent snapshots
//!
//! A router-wide gate freezes all point operations for the instant it
//! takes to drain the shards into an image; encoding and file I/O happen
//! after the gate is released. Files are written temp-then-rename, so a
//! crash never leaves a half-written snapshot observable.
//!
//! ## Supported Commands
//!
//! - `SET key value` - store a key-value pair (value may contain spaces)
//! - `GET key` - retrieve a value
//! - `DEL key` - delete a key
//! - `EXPIRE key ttl_ms` - set a TTL in milliseconds
//! - `STATS` - server and store statistics
//! - `PING` - liveness check
//! - `QUIT` - close the connection
//!
//! ## Module Overview
//!
//! - [`storage`]: sharded LRU+TTL engine, stats, background sweeper
//! - [`snapshot`]: binary snapshot codec and persistence manager
//! - [`protocol`]: text command parser and reply serializer
//! - [`commands`]: command execution against the store
//! - [`connection`]: client connection management

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{Command, CommandError, Response};
pub use snapshot::{SnapshotError, SnapshotManager};
pub use storage::{
    BackgroundSweeper, LruTtlMap, ShardedStore, SnapshotImage, StatsSnapshot, StoreError,
};

/// The default port MilletDB listens on
pub const DEFAULT_PORT: u16 = 7379;

/// The default host MilletDB binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of MilletDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
