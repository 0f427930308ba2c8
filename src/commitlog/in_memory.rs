use crate::commitlog::log::{ByteLog, Position, StorageError};
use bytes::{Bytes, BytesMut};

// Durability is modelled, not provided. Use `FileByteLog` when bytes must survive the process.
pub struct InMemoryByteLog {
    buffer: BytesMut,
    capacity: Option<u64>,
}

impl InMemoryByteLog {
    pub fn new() -> Self {
        InMemoryByteLog {
            buffer: BytesMut::new(),
            capacity: None,
        }
    }

    /// A log that refuses appends once it holds `capacity` bytes. Used to exercise storage
    /// exhaustion.
    pub fn with_capacity_limit(capacity: u64) -> Self {
        InMemoryByteLog {
            buffer: BytesMut::new(),
            capacity: Some(capacity),
        }
    }
}

impl Default for InMemoryByteLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteLog for InMemoryByteLog {
    fn append(&mut self, bytes: &[u8]) -> Result<Position, StorageError> {
        if let Some(remaining) = self.remaining_capacity() {
            if bytes.len() as u64 > remaining {
                return Err(StorageError::Full {
                    requested: bytes.len() as u64,
                    remaining,
                });
            }
        }

        self.buffer.extend_from_slice(bytes);
        Ok(self.end_position())
    }

    fn read(&self, position: Position, length: usize) -> Result<Bytes, StorageError> {
        let end = self.end_position();
        if position + length as u64 > end {
            return Err(StorageError::OutOfRange { position, length, end });
        }

        let start = position as usize;
        Ok(Bytes::copy_from_slice(&self.buffer[start..start + length]))
    }

    fn truncate(&mut self, position: Position) -> Result<(), StorageError> {
        let end = self.end_position();
        if position > end {
            return Err(StorageError::OutOfRange {
                position,
                length: 0,
                end,
            });
        }

        self.buffer.truncate(position as usize);
        Ok(())
    }

    fn end_position(&self) -> Position {
        self.buffer.len() as u64
    }

    fn remaining_capacity(&self) -> Option<u64> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.end_position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_read() {
        let mut log = InMemoryByteLog::new();
        assert_eq!(log.end_position(), 0);

        assert_eq!(log.append(b"hello").unwrap(), 5);
        assert_eq!(log.append(b" world").unwrap(), 11);

        assert_eq!(log.read(0, 11).unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(log.read(6, 5).unwrap(), Bytes::from_static(b"world"));
        assert_eq!(log.read(11, 0).unwrap(), Bytes::new());
    }

    #[test]
    fn read_past_end() {
        let mut log = InMemoryByteLog::new();
        log.append(b"abc").unwrap();

        match log.read(2, 2) {
            Err(StorageError::OutOfRange { position, length, end }) => {
                assert_eq!((position, length, end), (2, 2, 3));
            }
            other => panic!("Unexpected read result {:?}", other),
        }
    }

    #[test]
    fn truncate_drops_suffix() {
        let mut log = InMemoryByteLog::new();
        log.append(b"committed|uncommitted").unwrap();

        log.truncate(10).unwrap();
        assert_eq!(log.end_position(), 10);
        assert!(log.read(9, 2).is_err());

        assert_eq!(log.append(b"next").unwrap(), 14);
        assert_eq!(log.read(0, 14).unwrap(), Bytes::from_static(b"committed|next"));

        assert!(matches!(log.truncate(15), Err(StorageError::OutOfRange { .. })));
        assert_eq!(log.end_position(), 14);
    }

    #[test]
    fn capacity_limit_refuses_whole_append() {
        let mut log = InMemoryByteLog::with_capacity_limit(8);
        log.append(b"12345").unwrap();
        assert_eq!(log.remaining_capacity(), Some(3));

        match log.append(b"6789") {
            Err(StorageError::Full { requested, remaining }) => {
                assert_eq!((requested, remaining), (4, 3));
            }
            other => panic!("Unexpected append result {:?}", other),
        }
        // Nothing partially written.
        assert_eq!(log.end_position(), 5);

        log.append(b"678").unwrap();
        assert_eq!(log.remaining_capacity(), Some(0));
    }
}
