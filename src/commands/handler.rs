//! Command Execution
//!
//! [`CommandHandler`] turns one protocol line into one reply. Store
//! errors are mapped onto single-line error strings here; internal
//! invariant failures are reported generically so nothing about the
//! store's internals reaches the wire.

use crate::connection::ConnectionStats;
use crate::protocol::{Command, Response};
use crate::storage::{ShardedStore, StoreError};
use std::sync::Arc;

/// Executes client commands against the store.
///
/// Cheap to clone per connection: both fields are shared handles.
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<ShardedStore>,
    server_stats: Arc<ConnectionStats>,
}

impl CommandHandler {
    pub fn new(store: Arc<ShardedStore>, server_stats: Arc<ConnectionStats>) -> Self {
        Self {
            store,
            server_stats,
        }
    }

    /// Handles one protocol line. Returns the reply and whether the
    /// connection should close afterwards (QUIT).
    pub fn handle_line(&self, line: &str) -> (Response, bool) {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => return (Response::error(err.to_string()), false),
        };
        let close = matches!(command, Command::Quit);
        (self.execute(command), close)
    }

    fn execute(&self, command: Command) -> Response {
        match command {
            Command::Set { key, value } => match self.store.insert(key, value) {
                Ok(()) => Response::ok(),
                Err(err) => store_error_reply(err),
            },
            Command::Get { key } => Response::bulk(self.store.get(&key)),
            Command::Del { key } => {
                Response::integer(if self.store.delete(&key) { 1 } else { 0 })
            }
            Command::Expire { key, ttl_millis } => {
                match self.store.expire(&key, ttl_millis) {
                    Ok(stamped) => Response::integer(if stamped { 1 } else { 0 }),
                    Err(err) => store_error_reply(err),
                }
            }
            Command::Ping => Response::pong(),
            Command::Stats => self.stats_reply(),
            Command::Quit => Response::goodbye(),
        }
    }

    fn stats_reply(&self) -> Response {
        let store_stats = self.store.stats();
        let mut out = String::with_capacity(512);
        out.push_str("# Server Statistics");
        push_stat(&mut out, "total_connections", self.server_stats.total_connections());
        push_stat(&mut out, "active_connections", self.server_stats.active());
        push_stat(&mut out, "total_commands", self.server_stats.total_commands());
        push_stat(&mut out, "store_size", self.store.size() as u64);
        push_stat(&mut out, "store_capacity", self.store.total_capacity() as u64);
        push_stat(&mut out, "num_shards", self.store.shard_count() as u64);
        out.push_str("\r\n# Store Counters");
        push_stat(&mut out, "gets", store_stats.gets);
        push_stat(&mut out, "hits", store_stats.hits);
        push_stat(&mut out, "misses", store_stats.misses);
        out.push_str(&format!("\r\nhit_rate:{:.4}", store_stats.hit_rate()));
        push_stat(&mut out, "sets", store_stats.sets);
        push_stat(&mut out, "deletes", store_stats.deletes);
        push_stat(&mut out, "expires", store_stats.expires);
        push_stat(&mut out, "evictions", store_stats.evictions);
        push_stat(&mut out, "expirations", store_stats.expirations);
        Response::multi_line(out)
    }
}

fn push_stat(out: &mut String, name: &str, value: u64) {
    out.push_str("\r\n");
    out.push_str(name);
    out.push(':');
    out.push_str(&value.to_string());
}

/// Maps a store error onto a user-visible single-line message.
fn store_error_reply(err: StoreError) -> Response {
    match err {
        StoreError::InvalidArgument(message) => Response::error(message),
        StoreError::Internal(_) => Response::error("internal error"),
        other => Response::error(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    fn handler_with(store: ShardedStore) -> CommandHandler {
        CommandHandler::new(Arc::new(store), Arc::new(ConnectionStats::new()))
    }

    fn handler() -> CommandHandler {
        handler_with(ShardedStore::new(4, 64, None, None))
    }

    #[test]
    fn test_set_then_get() {
        let handler = handler();
        let (reply, close) = handler.handle_line("SET name pavan");
        assert_eq!(reply, Response::ok());
        assert!(!close);

        let (reply, _) = handler.handle_line("GET name");
        assert_eq!(reply, Response::Bulk(b("pavan")));
    }

    #[test]
    fn test_get_missing_is_null_bulk() {
        let handler = handler();
        let (reply, _) = handler.handle_line("GET nope");
        assert_eq!(reply, Response::NullBulk);
    }

    #[test]
    fn test_set_value_with_spaces() {
        let handler = handler();
        handler.handle_line("SET msg hello brave world");
        let (reply, _) = handler.handle_line("GET msg");
        assert_eq!(reply, Response::Bulk(b("hello brave world")));
    }

    #[test]
    fn test_del() {
        let handler = handler();
        handler.handle_line("SET k v");
        let (reply, _) = handler.handle_line("DEL k");
        assert_eq!(reply, Response::integer(1));
        let (reply, _) = handler.handle_line("DEL k");
        assert_eq!(reply, Response::integer(0));
    }

    #[test]
    fn test_expire_replies() {
        let handler = handler();
        handler.handle_line("SET k v");
        let (reply, _) = handler.handle_line("EXPIRE k 5000");
        assert_eq!(reply, Response::integer(1));
        let (reply, _) = handler.handle_line("EXPIRE absent 5000");
        assert_eq!(reply, Response::integer(0));
    }

    #[test]
    fn test_expire_invalid_ttl_is_error() {
        let handler = handler();
        handler.handle_line("SET k v");
        let (reply, _) = handler.handle_line("EXPIRE k 0");
        assert_eq!(reply, Response::error("TTL must be positive"));
        let (reply, _) = handler.handle_line("EXPIRE k abc");
        assert_eq!(reply, Response::error("invalid TTL value"));
    }

    #[test]
    fn test_oversize_value_maps_to_error_reply() {
        let handler = handler_with(ShardedStore::new(1, 8, None, Some(8)));
        let (reply, _) = handler.handle_line("SET k 123456789");
        assert_eq!(
            reply,
            Response::error("value too large: 9 bytes (limit: 8)")
        );
        let (reply, _) = handler.handle_line("GET k");
        assert_eq!(reply, Response::NullBulk);
    }

    #[test]
    fn test_ping_and_quit() {
        let handler = handler();
        let (reply, close) = handler.handle_line("PING");
        assert_eq!(reply, Response::pong());
        assert!(!close);

        let (reply, close) = handler.handle_line("QUIT");
        assert_eq!(reply, Response::goodbye());
        assert!(close);
    }

    #[test]
    fn test_unknown_and_empty_commands() {
        let handler = handler();
        let (reply, _) = handler.handle_line("FROB x");
        assert_eq!(reply, Response::error("unknown command 'FROB'"));
        let (reply, close) = handler.handle_line("   ");
        assert_eq!(reply, Response::error("empty command"));
        assert!(!close);
    }

    #[test]
    fn test_stats_reply_shape() {
        let handler = handler();
        handler.handle_line("SET a 1");
        handler.handle_line("GET a");
        handler.handle_line("GET missing");

        let (reply, _) = handler.handle_line("STATS");
        let Response::MultiLine(body) = reply else {
            panic!("expected multi-line reply");
        };
        assert!(body.starts_with("# Server Statistics"));
        assert!(body.contains("store_size:1"));
        assert!(body.contains("num_shards:4"));
        assert!(body.contains("gets:2"));
        assert!(body.contains("hits:1"));
        assert!(body.contains("misses:1"));
        assert!(body.contains("sets:1"));
        assert!(body.contains("hit_rate:0.5000"));
    }
}
