//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Datagram shorter or longer than its format
    #[error("truncated {what}: expected {expected} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Lidar datagram is not made of whole column blocks
    #[error("lidar datagram of {len} bytes is not a multiple of the {block_size}-byte column block")]
    Misaligned { len: usize, block_size: usize },

    /// Column status word is not the valid marker
    #[error("column {measurement_id} has invalid status {status:#010x}")]
    InvalidColumn { measurement_id: u16, status: u32 },

    /// Beam count unknown (no metadata yet)
    #[error("beam count must be > 0")]
    NoBeams,
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        ContractError::payload_parse(err.to_string())
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
