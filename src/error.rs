//! Error taxonomy for replay runs.
//!
//! Only [`ReplayError`] ever reaches a caller as an `Err`. Navigation and
//! surface failures are reported inside the run result, and step errors
//! never leave the engine except as per-step outcomes.

/// Rejections raised before a run starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    /// Malformed or empty workflow; no session is acquired.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(String),
}

impl ReplayError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidWorkflow(msg.into())
    }
}

/// Errors reported by a surface driver or one of its sessions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error("failed to open surface session: {0}")]
    Launch(String),

    #[error("invalid target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("{action} failed: {reason}")]
    Action {
        action: &'static str,
        reason: String,
    },

    #[error("session is closed")]
    Closed,
}

impl DriverError {
    pub fn action(action: &'static str, reason: impl ToString) -> Self {
        Self::Action {
            action,
            reason: reason.to_string(),
        }
    }
}

/// Failure of a single step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    /// Resolution, focus, click or typing failed. Recorded; the run moves on.
    #[error(transparent)]
    Action(DriverError),

    /// The surface itself broke underneath a coordinate click. Ends the run.
    #[error("surface error: {0}")]
    Surface(DriverError),
}
