//! Lifecycle states and the transition table

use std::fmt;

/// Managed lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Unconfigured,
    Inactive,
    Active,
    /// Terminal
    Finalized,
    /// Left only through an external `configure` or `shutdown`
    ErrorProcessing,
}

/// Lifecycle transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Configure,
    Activate,
    Deactivate,
    Cleanup,
    Shutdown,
    Error,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Unconfigured,
        LifecycleState::Inactive,
        LifecycleState::Active,
        LifecycleState::Finalized,
        LifecycleState::ErrorProcessing,
    ];

    /// Target of `transition` from this state, `None` if not allowed
    pub fn next(self, transition: Transition) -> Option<LifecycleState> {
        use LifecycleState::*;

        match (self, transition) {
            (Finalized, _) => None,
            (Unconfigured | ErrorProcessing, Transition::Configure) => Some(Inactive),
            (Inactive, Transition::Activate) => Some(Active),
            (Active, Transition::Deactivate) => Some(Inactive),
            (Inactive, Transition::Cleanup) => Some(Unconfigured),
            (_, Transition::Shutdown) => Some(Finalized),
            (_, Transition::Error) => Some(ErrorProcessing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Inactive => "inactive",
            LifecycleState::Active => "active",
            LifecycleState::Finalized => "finalized",
            LifecycleState::ErrorProcessing => "error_processing",
        }
    }
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::Configure,
        Transition::Activate,
        Transition::Deactivate,
        Transition::Cleanup,
        Transition::Shutdown,
        Transition::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Configure => "configure",
            Transition::Activate => "activate",
            Transition::Deactivate => "deactivate",
            Transition::Cleanup => "cleanup",
            Transition::Shutdown => "shutdown",
            Transition::Error => "error",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
