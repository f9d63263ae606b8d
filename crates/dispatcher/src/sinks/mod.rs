//! Sink implementations
//!
//! Contains LogSink, FileSink and MemorySink.

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::memory::{MemorySink, MemorySinkReader};
