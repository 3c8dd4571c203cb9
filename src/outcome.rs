//! Run and per-step outcomes reported back to the caller.

use serde::Serialize;

use crate::workflow::StepKind;

/// Result of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepStatus {
    Executed,
    Skipped,
    Failed(String),
}

impl StepStatus {
    /// Outcome kind without the failure reason.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    /// Position of the step in the submitted workflow.
    pub index: usize,
    pub kind: StepKind,
    pub outcome: StepStatus,
}

/// Why a run as a whole failed.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// The session could not be opened or navigated; no step ran.
    #[error("navigation error: {message}")]
    Navigation { message: String },

    /// The surface failed underneath a coordinate click.
    #[error("surface error: {message}")]
    Surface { message: String },

    /// Failed-step ratio exceeded the configured threshold.
    #[error("{failed} of {total} steps failed")]
    TooManyStepFailures { failed: usize, total: usize },
}

impl RunFailure {
    /// Metric label for the failure class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation { .. } => "navigation",
            Self::Surface { .. } => "surface",
            Self::TooManyStepFailures { .. } => "threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "failure", rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Failed(RunFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub steps: Vec<StepOutcome>,
    /// RFC 3339 start time.
    pub started_at: String,
    pub elapsed_ms: u64,
}

impl RunResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, RunStatus::Ok)
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match &self.status {
            RunStatus::Ok => None,
            RunStatus::Failed(failure) => Some(failure),
        }
    }

    pub fn executed(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Executed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(StepStatus::is_failed)
    }

    /// Outcome kinds in step order, for comparing two runs.
    pub fn labels(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.outcome.label()).collect()
    }

    fn count(&self, pred: impl Fn(&StepStatus) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RunResult {
        RunResult {
            status: RunStatus::Ok,
            steps: vec![
                StepOutcome {
                    index: 0,
                    kind: StepKind::Click,
                    outcome: StepStatus::Executed,
                },
                StepOutcome {
                    index: 1,
                    kind: StepKind::Type,
                    outcome: StepStatus::Skipped,
                },
                StepOutcome {
                    index: 2,
                    kind: StepKind::Click,
                    outcome: StepStatus::Failed("element not found: #x".into()),
                },
            ],
            started_at: "2026-01-01T00:00:00Z".into(),
            elapsed_ms: 12,
        }
    }

    #[test]
    fn counts_by_outcome() {
        let result = sample();
        assert!(result.is_ok());
        assert_eq!(result.executed(), 1);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.labels(), vec!["executed", "skipped", "failed"]);
    }

    #[test]
    fn serializes_step_outcomes() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["status"], json!({ "state": "ok" }));
        assert_eq!(value["steps"][0]["outcome"], json!({ "status": "executed" }));
        assert_eq!(value["steps"][1]["kind"], "type");
        assert_eq!(
            value["steps"][2]["outcome"],
            json!({ "status": "failed", "reason": "element not found: #x" })
        );
    }

    #[test]
    fn serializes_run_failure() {
        let result = RunResult {
            status: RunStatus::Failed(RunFailure::Navigation {
                message: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
            steps: Vec::new(),
            started_at: String::new(),
            elapsed_ms: 0,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"]["state"], "failed");
        assert_eq!(value["status"]["failure"]["kind"], "navigation");
        assert_eq!(
            result.failure().map(|f| f.to_string()),
            Some("navigation error: net::ERR_NAME_NOT_RESOLVED".to_string())
        );
    }
}
