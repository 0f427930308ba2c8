use bytes::Bytes;
use std::io;

/// Position is a byte offset into a `ByteLog`. The first byte ever appended lives at position 0.
pub type Position = u64;

/// ByteLog is an append only byte log intended for use as the local copy of a replicated log.
///
/// Bytes are never overwritten in place. The only way to discard them is `truncate`, which drops a
/// suffix. Positions are dense: after appending `n` bytes to a log ending at `p`, the log ends at
/// `p + n`.
pub trait ByteLog {
    /// append() appends `bytes` at the end of the log, then returns the new end position.
    fn append(&mut self, bytes: &[u8]) -> Result<Position, StorageError>;

    /// Read exactly `length` bytes starting at `position`.
    fn read(&self, position: Position, length: usize) -> Result<Bytes, StorageError>;

    /// Drops every byte at or after `position`, so that the log ends at `position`.
    fn truncate(&mut self, position: Position) -> Result<(), StorageError>;

    /// end_position returns the position that the next appended byte will be written to.
    fn end_position(&self) -> Position;

    /// How many more bytes can be appended before the log refuses writes. `None` means unbounded.
    fn remaining_capacity(&self) -> Option<u64>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("log is full: requested {requested} bytes, {remaining} remaining")]
    Full { requested: u64, remaining: u64 },
    #[error("read [{position}, {position}+{length}) is beyond log end {end}")]
    OutOfRange {
        position: Position,
        length: usize,
        end: Position,
    },
    #[error("IO failure")]
    Io(#[from] io::Error),
}
