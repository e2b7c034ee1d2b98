//! Client Connection Handling
//!
//! Each client gets its own task running [`ConnectionHandler::run`]:
//! accumulate bytes, split off complete lines, execute, reply, repeat
//! until QUIT, EOF or an error. TCP is a stream, so a single read may
//! carry half a command or several commands; the `BytesMut` buffer
//! absorbs both cases.

use crate::commands::CommandHandler;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Longest accepted command line: a maximal key plus a maximal value and
/// protocol overhead.
const MAX_LINE_BYTES: usize = 2 * 1024 * 1024;

/// Initial read buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection and traffic counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    connections_accepted: AtomicU64,
    active_connections: AtomicU64,
    commands_processed: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn total_connections(&self) -> u64 {
        self.connections_accepted.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_commands(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    pub fn total_bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn total_bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

/// Drives the protocol loop for one client socket.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            commands,
            stats,
        }
    }

    /// Runs the read/execute/reply loop until the client goes away.
    pub async fn run(mut self) {
        info!(client = %self.addr, "client connected");
        match self.main_loop().await {
            Ok(()) => info!(client = %self.addr, "client disconnected"),
            Err(err) => debug!(client = %self.addr, error = %err, "connection closed with error"),
        }
        self.stats.connection_closed();
    }

    async fn main_loop(&mut self) -> std::io::Result<()> {
        loop {
            // Drain every complete line already buffered before reading
            // more.
            while let Some(line) = self.take_line()? {
                self.stats.command_processed();
                let (response, close) = self.commands.handle_line(&line);
                let payload = response.serialize();
                self.stream.write_all(&payload).await?;
                self.stream.flush().await?;
                self.stats.add_bytes_written(payload.len());
                if close {
                    return Ok(());
                }
            }

            let read = self.stream.get_mut().read_buf(&mut self.buffer).await?;
            if read == 0 {
                // Clean EOF only when no partial command is pending.
                if !self.buffer.is_empty() {
                    debug!(client = %self.addr, "connection dropped mid-command");
                }
                return Ok(());
            }
            self.stats.add_bytes_read(read);
        }
    }

    /// Splits one complete line off the buffer, or `None` when no newline
    /// has arrived yet. Oversized lines terminate the connection.
    fn take_line(&mut self) -> std::io::Result<Option<String>> {
        match self.buffer.iter().position(|&byte| byte == b'\n') {
            Some(pos) => {
                let mut line = self.buffer.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None if self.buffer.len() > MAX_LINE_BYTES => {
                warn!(client = %self.addr, buffered = self.buffer.len(), "command line too long");
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "command line exceeds maximum length",
                ))
            }
            None => {
                // Keep the buffer from pinning freed front bytes.
                if self.buffer.capacity() - self.buffer.len() < 512 {
                    self.buffer.reserve(INITIAL_BUFFER_SIZE);
                }
                Ok(None)
            }
        }
    }
}

/// Convenience entry point: wraps the stream in a handler and runs it.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    ConnectionHandler::new(stream, addr, commands, stats)
        .run()
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ShardedStore;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};

    async fn spawn_server() -> (SocketAddr, Arc<ConnectionStats>) {
        let store = Arc::new(ShardedStore::new(4, 64, None, None));
        let stats = Arc::new(ConnectionStats::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept_stats = Arc::clone(&stats);
        tokio::spawn(async move {
            loop {
                let (socket, peer) = listener.accept().await.unwrap();
                let handler =
                    CommandHandler::new(Arc::clone(&store), Arc::clone(&accept_stats));
                let stats = Arc::clone(&accept_stats);
                tokio::spawn(handle_connection(socket, peer, handler, stats));
            }
        });
        (addr, stats)
    }

    async fn send_line(
        writer: &mut (impl AsyncWriteExt + Unpin),
        reader: &mut (impl AsyncBufReadExt + Unpin),
        line: &str,
    ) -> String {
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\r\n").await.unwrap();
        writer.flush().await.unwrap();
        let mut reply = String::new();
        reader.read_line(&mut reply).await.unwrap();
        reply
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let (addr, _stats) = spawn_server().await;
        let socket = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        assert_eq!(
            send_line(&mut write_half, &mut reader, "PING").await,
            "+PONG\r\n"
        );
        assert_eq!(
            send_line(&mut write_half, &mut reader, "SET name pavan").await,
            "+OK\r\n"
        );
        assert_eq!(
            send_line(&mut write_half, &mut reader, "GET name").await,
            "$5\r\n"
        );
        let mut value = String::new();
        reader.read_line(&mut value).await.unwrap();
        assert_eq!(value, "pavan\r\n");

        assert_eq!(
            send_line(&mut write_half, &mut reader, "GET missing").await,
            "$-1\r\n"
        );
        assert_eq!(
            send_line(&mut write_half, &mut reader, "DEL name").await,
            ":1\r\n"
        );
    }

    #[tokio::test]
    async fn test_quit_closes_connection() {
        let (addr, _stats) = spawn_server().await;
        let socket = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        assert_eq!(
            send_line(&mut write_half, &mut reader, "QUIT").await,
            "+Goodbye\r\n"
        );
        // Server closed its end: next read yields EOF.
        let mut rest = String::new();
        let n = reader.read_line(&mut rest).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_pipelined_commands_in_one_write() {
        let (addr, _stats) = spawn_server().await;
        let mut socket = TcpStream::connect(addr).await.unwrap();
        socket
            .write_all(b"SET a 1\r\nSET b 2\r\nGET a\r\n")
            .await
            .unwrap();
        socket.flush().await.unwrap();

        let (read_half, _write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut lines = Vec::new();
        for _ in 0..4 {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            lines.push(line);
        }
        assert_eq!(lines[0], "+OK\r\n");
        assert_eq!(lines[1], "+OK\r\n");
        assert_eq!(lines[2], "$1\r\n");
        assert_eq!(lines[3], "1\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats_track_sessions() {
        let (addr, stats) = spawn_server().await;
        let socket = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        send_line(&mut write_half, &mut reader, "PING").await;
        assert_eq!(stats.total_connections(), 1);
        assert_eq!(stats.total_commands(), 1);
        assert!(stats.total_bytes_written() > 0);

        send_line(&mut write_half, &mut reader, "QUIT").await;
        // Give the server task a moment to tear down.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.active(), 0);
    }
}
