pub mod args;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod server;
pub mod teardown;
pub mod workflow;

// Re-export the replay surface at crate root for convenience
pub use engine::{EngineConfig, Replay, ReplayEngine};
pub use error::{DriverError, ReplayError};
pub use outcome::{RunFailure, RunResult, RunStatus, StepOutcome, StepStatus};
pub use workflow::{Locator, Step, Workflow};
