//! Binary Snapshot Format
//!
//! Self-describing, big-endian encoding of a [`SnapshotImage`]:
//!
//! ```text
//! offset  size     field
//! 0       4        magic = 0x4D4C4442 ("MLDB")
//! 4       1        version = 0x01
//! 5       8        capture timestamp millis : i64
//! 13      4        shard count : u32
//! 17      4        capacity per shard : u32
//! 21      4        total entries : u32
//! 25      ...      entries
//! ...     4        CRC32 of everything above
//! ```
//!
//! Each entry: shard index (u32), key length (u32), key bytes, value
//! length (u32), value bytes, has-expiration flag (u8), and the absolute
//! expiration millis (i64) when the flag is set.
//!
//! The CRC trailer is always written. Readers verify it when present but
//! also accept trailer-less files whose byte count matches the entry
//! payload exactly, so images produced by minimal writers stay loadable.

use crate::storage::{ImageEntry, ShardImage, SnapshotImage};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// File magic, "MLDB" in ASCII.
pub const MAGIC: u32 = 0x4D4C_4442;

/// Current format version.
pub const VERSION: u8 = 0x01;

/// Fixed header length in bytes (magic through total entries).
const HEADER_LEN: usize = 4 + 1 + 8 + 4 + 4 + 4;

/// Errors surfaced while decoding snapshot bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The version byte names a format this build does not understand.
    #[error("incompatible snapshot version: {found:#04x}")]
    IncompatibleVersion { found: u8 },

    /// Structurally malformed bytes.
    #[error("malformed snapshot: {0}")]
    Malformed(String),
}

/// Serializes `image` into the on-disk format, CRC trailer included.
pub fn encode(image: &SnapshotImage) -> Bytes {
    let total_entries: usize = image.shards.iter().map(|s| s.entries.len()).sum();

    let mut buf = BytesMut::with_capacity(HEADER_LEN + total_entries * 32);
    buf.put_u32(MAGIC);
    buf.put_u8(VERSION);
    buf.put_i64(image.captured_at_ms);
    buf.put_u32(image.shard_count);
    buf.put_u32(image.capacity_per_shard);
    buf.put_u32(total_entries as u32);

    for (shard_index, shard) in image.shards.iter().enumerate() {
        for entry in &shard.entries {
            buf.put_u32(shard_index as u32);
            buf.put_u32(entry.key.len() as u32);
            buf.put_slice(&entry.key);
            buf.put_u32(entry.value.len() as u32);
            buf.put_slice(&entry.value);
            match entry.expires_at_ms {
                Some(at) => {
                    buf.put_u8(1);
                    buf.put_i64(at);
                }
                None => buf.put_u8(0),
            }
        }
    }

    let crc = crc32fast::hash(&buf);
    buf.put_u32(crc);
    buf.freeze()
}

/// Parses snapshot bytes back into a [`SnapshotImage`].
pub fn decode(data: &[u8]) -> Result<SnapshotImage, CodecError> {
    let mut buf = data;

    if buf.remaining() < HEADER_LEN {
        return Err(CodecError::Malformed(format!(
            "truncated header: {} bytes",
            buf.remaining()
        )));
    }
    let magic = buf.get_u32();
    if magic != MAGIC {
        return Err(CodecError::Malformed(format!(
            "bad magic: {:#010x}",
            magic
        )));
    }
    let version = buf.get_u8();
    if version != VERSION {
        return Err(CodecError::IncompatibleVersion { found: version });
    }
    let captured_at_ms = buf.get_i64();
    let shard_count = buf.get_u32();
    if shard_count == 0 {
        return Err(CodecError::Malformed("zero shard count".to_string()));
    }
    let capacity_per_shard = buf.get_u32();
    let total_entries = buf.get_u32();

    let mut shards = vec![ShardImage::default(); shard_count as usize];
    for n in 0..total_entries {
        let entry_err = |what: &str| {
            CodecError::Malformed(format!("entry {}: truncated {}", n, what))
        };
        if buf.remaining() < 8 {
            return Err(entry_err("entry header"));
        }
        let shard_index = buf.get_u32();
        if shard_index >= shard_count {
            return Err(CodecError::Malformed(format!(
                "entry {}: shard index {} out of range ({} shards)",
                n, shard_index, shard_count
            )));
        }
        let key_len = buf.get_u32() as usize;
        if buf.remaining() < key_len {
            return Err(entry_err("key"));
        }
        let key = Bytes::copy_from_slice(&buf[..key_len]);
        buf.advance(key_len);

        if buf.remaining() < 4 {
            return Err(entry_err("value length"));
        }
        let value_len = buf.get_u32() as usize;
        if buf.remaining() < value_len {
            return Err(entry_err("value"));
        }
        let value = Bytes::copy_from_slice(&buf[..value_len]);
        buf.advance(value_len);

        if buf.remaining() < 1 {
            return Err(entry_err("expiration flag"));
        }
        let expires_at_ms = match buf.get_u8() {
            0 => None,
            1 => {
                if buf.remaining() < 8 {
                    return Err(entry_err("expiration"));
                }
                Some(buf.get_i64())
            }
            flag => {
                return Err(CodecError::Malformed(format!(
                    "entry {}: invalid expiration flag {}",
                    n, flag
                )))
            }
        };

        shards[shard_index as usize].entries.push(ImageEntry {
            key,
            value,
            expires_at_ms,
        });
    }

    // Either a CRC trailer or nothing at all may follow the entries.
    match buf.remaining() {
        0 => {}
        4 => {
            let stored = buf.get_u32();
            let computed = crc32fast::hash(&data[..data.len() - 4]);
            if stored != computed {
                return Err(CodecError::Malformed(format!(
                    "checksum mismatch: stored {:#010x}, computed {:#010x}",
                    stored, computed
                )));
            }
        }
        extra => {
            return Err(CodecError::Malformed(format!(
                "{} trailing bytes after entries",
                extra
            )));
        }
    }

    Ok(SnapshotImage {
        captured_at_ms,
        shard_count,
        capacity_per_shard,
        shards,
    })
}
