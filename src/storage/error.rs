//! Storage error taxonomy.
//!
//! Point operations surface these to the caller immediately; the protocol
//! layer maps them onto single-line error replies. `Internal` marks a
//! violated invariant the caller cannot recover from.

use thiserror::Error;

/// Which dimension of an entry exceeded its configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeKind {
    Key,
    Value,
}

impl std::fmt::Display for SizeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeKind::Key => write!(f, "key"),
            SizeKind::Value => write!(f, "value"),
        }
    }
}

/// Errors produced by store operations and task lifecycles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Malformed caller input: non-positive TTL, non-positive interval,
    /// negative retention count.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Entry exceeds a configured size limit; nothing was mutated.
    #[error("{kind} too large: {size} bytes (limit: {limit})")]
    TooLarge {
        kind: SizeKind,
        size: usize,
        limit: usize,
    },

    /// A snapshot image was captured with a different shard count.
    #[error("snapshot shard count ({image_shards}) does not match store shard count ({store_shards})")]
    ShardCountMismatch {
        image_shards: u32,
        store_shards: u32,
    },

    /// Lifecycle violation: starting a periodic task twice.
    #[error("already running")]
    AlreadyRunning,

    /// Lifecycle violation: stopping a periodic task that was not started.
    #[error("not running")]
    NotRunning,

    /// A store invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_message() {
        let err = StoreError::TooLarge {
            kind: SizeKind::Value,
            size: 9,
            limit: 8,
        };
        assert_eq!(err.to_string(), "value too large: 9 bytes (limit: 8)");
    }

    #[test]
    fn test_shard_count_mismatch_message() {
        let err = StoreError::ShardCountMismatch {
            image_shards: 4,
            store_shards: 8,
        };
        assert!(err.to_string().contains("(4)"));
        assert!(err.to_string().contains("(8)"));
    }
}
