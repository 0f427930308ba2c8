mod in_memory;
mod log;
mod storage;

pub use in_memory::InMemoryByteLog;
pub use log::ByteLog;
pub use log::Position;
pub use log::StorageError;
pub use storage::FileByteLog;
pub use storage::StorageConfig;
