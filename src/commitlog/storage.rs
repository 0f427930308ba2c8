use crate::commitlog::log::{ByteLog, Position, StorageError};
use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "replicated.log";

// Generic config for initializing a disk-based byte log.
pub struct StorageConfig {
    pub directory: PathBuf,
    pub capacity: Option<u64>,
}

/// FileByteLog keeps the whole log in one append-only file inside `StorageConfig::directory`.
///
/// Appends are written through to the OS but not fsync'd.
pub struct FileByteLog {
    file: File,
    end_position: Position,
    capacity: Option<u64>,
}

impl FileByteLog {
    /// Opens (creating if needed) the log file. An existing file is reopened at its current length.
    pub fn open(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.directory)?;
        let path = config.directory.join(LOG_FILE_NAME);

        let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
        let end_position = file.metadata()?.len();

        Ok(FileByteLog {
            file,
            end_position,
            capacity: config.capacity,
        })
    }
}

impl ByteLog for FileByteLog {
    fn append(&mut self, bytes: &[u8]) -> Result<Position, StorageError> {
        if let Some(remaining) = self.remaining_capacity() {
            if bytes.len() as u64 > remaining {
                return Err(StorageError::Full {
                    requested: bytes.len() as u64,
                    remaining,
                });
            }
        }

        self.file.write_all(bytes)?;
        self.end_position += bytes.len() as u64;

        Ok(self.end_position)
    }

    fn read(&self, position: Position, length: usize) -> Result<Bytes, StorageError> {
        if position + length as u64 > self.end_position {
            return Err(StorageError::OutOfRange {
                position,
                length,
                end: self.end_position,
            });
        }

        let mut buf = vec![0u8; length];
        self.file.read_exact_at(&mut buf, position)?;

        Ok(Bytes::from(buf))
    }

    fn truncate(&mut self, position: Position) -> Result<(), StorageError> {
        if position > self.end_position {
            return Err(StorageError::OutOfRange {
                position,
                length: 0,
                end: self.end_position,
            });
        }

        // The file is opened in append mode, so later writes land at the new length.
        self.file.set_len(position)?;
        self.end_position = position;

        Ok(())
    }

    fn end_position(&self) -> Position {
        self.end_position
    }

    fn remaining_capacity(&self) -> Option<u64> {
        self.capacity
            .map(|capacity| capacity.saturating_sub(self.end_position))
    }
}
