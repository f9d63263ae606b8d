//! Driver error types

use contracts::ContractError;
use dispatcher::DispatcherError;
use thiserror::Error;

use crate::state::{LifecycleState, Transition};

/// Lifecycle and service errors
#[derive(Debug, Error)]
pub enum DriverError {
    /// The transition is not allowed from the current state; nothing changed
    #[error("cannot {transition} from state {from}")]
    InvalidTransition {
        from: LifecycleState,
        transition: Transition,
    },

    /// The driver was shut down
    #[error("driver is finalized")]
    Finalized,

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    /// The periodic cycle task panicked or was cancelled
    #[error("cycle task failed: {0}")]
    Cycle(String),
}

impl DriverError {
    pub fn invalid_transition(from: LifecycleState, transition: Transition) -> Self {
        Self::InvalidTransition { from, transition }
    }

    /// Whether the host process must terminate
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Contract(e) if e.is_fatal())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DriverError>;
