//! Storage Engine Module
//!
//! The concurrent heart of MilletDB: a fixed array of independently locked
//! LRU+TTL shards behind a routing façade.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        ShardedStore                           │
//! │               snapshot gate (RwLock, shared/excl)             │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐         │
//! │  │ Shard 0  │ │ Shard 1  │ │ Shard 2  │ │ Shard N  │         │
//! │  │ Mutex    │ │ Mutex    │ │ Mutex    │ │ Mutex    │         │
//! │  │ LruTtlMap│ │ LruTtlMap│ │ LruTtlMap│ │ LruTtlMap│         │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────────┘         │
//! └───────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │
//!                ┌─────────────┴──────────────┐
//!                │     BackgroundSweeper      │
//!                │   (scheduled tokio task)   │
//!                └────────────────────────────┘
//! ```
//!
//! Point operations take the snapshot gate in shared mode and then exactly
//! one shard mutex; capture/restore take the gate exclusively. Lock order
//! is always (gate, shard), so there is no cross-shard deadlock potential.

pub mod clock;
pub mod engine;
pub mod error;
pub mod stats;
pub mod store;
pub mod sweeper;

pub use engine::{ImageEntry, LruTtlMap, ShardImage};
pub use error::{SizeKind, StoreError};
pub use stats::{StatsCounters, StatsSnapshot};
pub use store::{ShardedStore, SnapshotImage};
pub use sweeper::BackgroundSweeper;
