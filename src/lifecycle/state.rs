use super::TerminationReason;
use strum_macros::{AsRefStr, Display, EnumString};

/// Phase of an orchestrator
///
/// ```text
/// Uninitialized ─▶ Initializing ─▶ Ready ─▶ ShuttingDown ─▶ Shutdown
///                       └────────── startup failed ──────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    ShuttingDown,
    Shutdown,
}

impl LifecycleState {
    /// No phase transition is in progress
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Initializing | Self::ShuttingDown)
    }
}

/// Broadcast to every subscriber of an orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StateChanged {
        from: LifecycleState,
        to: LifecycleState,
    },
    ServiceInitialized {
        name: String,
    },
    ServiceStopped {
        name: String,
    },
    Ready,
    ShuttingDown,
    Terminated(TerminationReason),
}
