//! Reply Serialization
//!
//! Replies use the Redis-flavored encodings the original protocol
//! documents: `+` simple strings, `-ERR` errors, `:` integers, `$`
//! length-prefixed bulk strings with `$-1` for null, and a raw multi-line
//! block (used by STATS). Every reply is terminated with CRLF.

use bytes::Bytes;
use std::fmt;

const CRLF: &[u8] = b"\r\n";

/// A reply ready to be written to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `+<message>\r\n`
    Simple(String),
    /// `-ERR <message>\r\n`
    Error(String),
    /// `:<value>\r\n`
    Integer(i64),
    /// `$<len>\r\n<data>\r\n`
    Bulk(Bytes),
    /// `$-1\r\n`
    NullBulk,
    /// `<content>\r\n`, content may span lines.
    MultiLine(String),
}

impl Response {
    pub fn ok() -> Self {
        Response::Simple("OK".to_string())
    }

    pub fn pong() -> Self {
        Response::Simple("PONG".to_string())
    }

    pub fn goodbye() -> Self {
        Response::Simple("Goodbye".to_string())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn integer(value: i64) -> Self {
        Response::Integer(value)
    }

    /// Bulk reply for a lookup result; `None` becomes the null bulk.
    pub fn bulk(value: Option<Bytes>) -> Self {
        match value {
            Some(data) => Response::Bulk(data),
            None => Response::NullBulk,
        }
    }

    pub fn multi_line(content: impl Into<String>) -> Self {
        Response::MultiLine(content.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    /// Serializes this reply into `buf` in wire format.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Simple(message) => {
                buf.push(b'+');
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Error(message) => {
                buf.extend_from_slice(b"-ERR ");
                buf.extend_from_slice(message.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Integer(value) => {
                buf.push(b':');
                buf.extend_from_slice(value.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Response::Bulk(data) => {
                buf.push(b'$');
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Response::NullBulk => {
                buf.extend_from_slice(b"$-1");
                buf.extend_from_slice(CRLF);
            }
            Response::MultiLine(content) => {
                buf.extend_from_slice(content.as_bytes());
                buf.extend_from_slice(CRLF);
            }
        }
    }

    /// Serializes this reply into a fresh buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Simple(message) => write!(f, "{}", message),
            Response::Error(message) => write!(f, "(error) {}", message),
            Response::Integer(value) => write!(f, "(integer) {}", value),
            Response::Bulk(data) => match std::str::from_utf8(data) {
                Ok(text) => write!(f, "\"{}\"", text),
                Err(_) => write!(f, "(binary, {} bytes)", data.len()),
            },
            Response::NullBulk => write!(f, "(nil)"),
            Response::MultiLine(content) => write!(f, "{}", content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_serialize() {
        assert_eq!(Response::ok().serialize(), b"+OK\r\n");
    }

    #[test]
    fn test_pong_serialize() {
        assert_eq!(Response::pong().serialize(), b"+PONG\r\n");
    }

    #[test]
    fn test_error_serialize() {
        assert_eq!(
            Response::error("unknown command 'FROB'").serialize(),
            b"-ERR unknown command 'FROB'\r\n"
        );
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(Response::integer(1).serialize(), b":1\r\n");
        assert_eq!(Response::integer(-42).serialize(), b":-42\r\n");
    }

    #[test]
    fn test_bulk_serialize() {
        assert_eq!(
            Response::bulk(Some(Bytes::from("hello"))).serialize(),
            b"$5\r\nhello\r\n"
        );
        assert_eq!(Response::bulk(None).serialize(), b"$-1\r\n");
    }

    #[test]
    fn test_multi_line_serialize() {
        let reply = Response::multi_line("# Stats\r\nsize:3");
        assert_eq!(reply.serialize(), b"# Stats\r\nsize:3\r\n");
    }

    #[test]
    fn test_serialize_into_appends() {
        let mut buf = Vec::new();
        Response::ok().serialize_into(&mut buf);
        Response::integer(7).serialize_into(&mut buf);
        assert_eq!(buf, b"+OK\r\n:7\r\n");
    }

    #[test]
    fn test_display() {
        assert_eq!(Response::NullBulk.to_string(), "(nil)");
        assert_eq!(Response::integer(3).to_string(), "(integer) 3");
        assert_eq!(
            Response::bulk(Some(Bytes::from("x"))).to_string(),
            "\"x\""
        );
    }
}
