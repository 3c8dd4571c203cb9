//! Replay engine.
//!
//! Executes a [`Workflow`] step by step against one exclusively-owned
//! surface session. Steps never overlap and are never reordered; each one
//! waits out its recorded delay (scaled by the workflow speed) before it
//! acts. A failing step is recorded and the run moves on.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::driver::{Session, SurfaceDriver};
use crate::error::{DriverError, ReplayError, StepError};
use crate::metrics;
use crate::outcome::{RunFailure, RunResult, RunStatus, StepOutcome, StepStatus};
use crate::teardown::{self, TeardownHandle};
use crate::workflow::{Locator, Step, Workflow};

pub const DEFAULT_BASE_CHAR_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Gap between typed characters at speed 1.
    pub base_char_delay: Duration,
    /// How long a finished session stays open before it is closed.
    pub teardown_grace: Duration,
    /// Fail completed runs whose failed-step ratio exceeds this. `None`
    /// reports every completed run as ok.
    pub failure_threshold: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_char_delay: DEFAULT_BASE_CHAR_DELAY,
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
            failure_threshold: None,
        }
    }
}

/// Scale a recorded duration by playback speed, in whole milliseconds.
///
/// Saturates at `Duration::MAX` when the quotient overflows, which only a
/// vanishingly small speed can cause.
pub fn scaled(base: Duration, speed: f64) -> Duration {
    let millis = (base.as_millis() as f64 / speed).round();
    if millis.is_nan() || millis <= 0.0 {
        Duration::ZERO
    } else if millis >= u64::MAX as f64 {
        Duration::MAX
    } else {
        Duration::from_millis(millis as u64)
    }
}

/// Wait before a step with the given recorded delay.
pub fn effective_delay(delay_ms: u64, speed: f64) -> Duration {
    scaled(Duration::from_millis(delay_ms), speed)
}

/// A finished replay plus the pending release of its session.
#[derive(Debug)]
pub struct Replay {
    pub result: RunResult,
    /// `None` when no session survived the run.
    pub teardown: Option<TeardownHandle>,
}

pub struct ReplayEngine {
    driver: Arc<dyn SurfaceDriver>,
    config: EngineConfig,
    shutdown: CancellationToken,
}

impl ReplayEngine {
    pub fn new(driver: Arc<dyn SurfaceDriver>, config: EngineConfig) -> Self {
        Self {
            driver,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replay `workflow`, leaving session release to the grace-period timer.
    pub async fn replay(&self, workflow: &Workflow) -> Result<RunResult, ReplayError> {
        Ok(self.replay_with_teardown(workflow).await?.result)
    }

    /// Replay `workflow` and hand back the teardown handle so the caller can
    /// release the session early.
    pub async fn replay_with_teardown(&self, workflow: &Workflow) -> Result<Replay, ReplayError> {
        if let Err(e) = workflow.validate() {
            metrics::record_invalid_workflow();
            return Err(e);
        }

        let started_at = chrono::Utc::now().to_rfc3339();
        let start = Instant::now();
        info!(
            driver = self.driver.name(),
            url = %workflow.target,
            steps = workflow.steps.len(),
            speed = workflow.speed,
            "starting replay"
        );

        let mut session = match self.open_and_navigate(&workflow.target).await {
            Ok(session) => session,
            Err(e) => {
                warn!(url = %workflow.target, error = %e, "replay aborted before first step");
                let failure = RunFailure::Navigation {
                    message: e.to_string(),
                };
                return Ok(self.finish(
                    RunStatus::Failed(failure),
                    Vec::new(),
                    started_at,
                    start,
                    None,
                ));
            }
        };

        let mut outcomes = Vec::with_capacity(workflow.steps.len());
        let mut fatal = None;

        for (index, step) in workflow.steps.iter().enumerate() {
            let delay = effective_delay(step.delay_ms(), workflow.speed);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let outcome = match self.dispatch(session.as_mut(), step, workflow.speed).await {
                Ok(status) => {
                    debug!(index, kind = step.kind().as_str(), outcome = status.label(), "step done");
                    status
                }
                Err(StepError::Action(e)) => {
                    warn!(index, kind = step.kind().as_str(), error = %e, "step failed");
                    StepStatus::Failed(e.to_string())
                }
                Err(StepError::Surface(e)) => {
                    warn!(index, error = %e, "surface failed; ending replay");
                    fatal = Some(RunFailure::Surface {
                        message: e.to_string(),
                    });
                    StepStatus::Failed(e.to_string())
                }
            };

            metrics::record_step(step.kind(), &outcome);
            outcomes.push(StepOutcome {
                index,
                kind: step.kind(),
                outcome,
            });

            if fatal.is_some() {
                break;
            }
        }

        let (status, teardown) = match fatal {
            Some(failure) => {
                teardown::release(session).await;
                (RunStatus::Failed(failure), None)
            }
            None => {
                let handle = TeardownHandle::schedule(
                    session,
                    self.config.teardown_grace,
                    self.shutdown.child_token(),
                );
                (self.judge(&outcomes), Some(handle))
            }
        };

        Ok(self.finish(status, outcomes, started_at, start, teardown))
    }

    /// Release every session still waiting out its grace period.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn open_and_navigate(&self, target: &str) -> Result<Box<dyn Session>, DriverError> {
        let mut session = self.driver.open_session().await?;
        metrics::record_session_opened();
        if let Err(e) = session.navigate(target).await {
            teardown::release(session).await;
            return Err(e);
        }
        Ok(session)
    }

    async fn dispatch(
        &self,
        session: &mut dyn Session,
        step: &Step,
        speed: f64,
    ) -> Result<StepStatus, StepError> {
        match step {
            Step::Click {
                locator: Locator::Selector(selector),
                ..
            } => {
                session
                    .click_element(selector)
                    .await
                    .map_err(StepError::Action)?;
            }
            Step::Click {
                locator: Locator::Coordinates { x, y },
                ..
            } => {
                session.click_at(*x, *y).await.map_err(StepError::Surface)?;
            }
            Step::TypeText { selector, text, .. } => {
                if selector.trim().is_empty() {
                    return Ok(StepStatus::Skipped);
                }
                session
                    .focus_element(selector)
                    .await
                    .map_err(StepError::Action)?;
                let per_char = scaled(self.config.base_char_delay, speed);
                session
                    .type_text(text, per_char)
                    .await
                    .map_err(StepError::Action)?;
            }
        }
        Ok(StepStatus::Executed)
    }

    fn judge(&self, outcomes: &[StepOutcome]) -> RunStatus {
        let Some(threshold) = self.config.failure_threshold else {
            return RunStatus::Ok;
        };
        let total = outcomes.len();
        let failed = outcomes.iter().filter(|o| o.outcome.is_failed()).count();
        if total > 0 && failed as f64 / total as f64 > threshold {
            RunStatus::Failed(RunFailure::TooManyStepFailures { failed, total })
        } else {
            RunStatus::Ok
        }
    }

    fn finish(
        &self,
        status: RunStatus,
        steps: Vec<StepOutcome>,
        started_at: String,
        start: Instant,
        teardown: Option<TeardownHandle>,
    ) -> Replay {
        let elapsed = start.elapsed();
        let result = RunResult {
            status,
            steps,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
        };
        metrics::record_run(&result, elapsed);
        info!(
            ok = result.is_ok(),
            executed = result.executed(),
            skipped = result.skipped(),
            failed = result.failed(),
            elapsed_ms = result.elapsed_ms,
            "replay finished"
        );
        Replay { result, teardown }
    }
}
