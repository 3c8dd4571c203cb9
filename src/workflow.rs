//! Workflow model: the ordered, timed steps a replay executes.
//!
//! Workflows arrive as JSON documents of the shape
//!
//! ```json
//! { "url": "https://example.com", "speed": 2,
//!   "steps": [ { "type": "click", "selector": "#go", "delay": 400 },
//!              { "type": "type", "selector": "#q", "value": "hi", "delay": 120 } ] }
//! ```
//!
//! and are converted into typed [`Workflow`] values before reaching the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReplayError;

/// Target used when a submission does not name one.
pub const DEFAULT_TARGET: &str = "about:blank";

/// Where a click lands.
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Opaque element selector resolved by the driver.
    Selector(String),
    /// Viewport point; no element resolution involved.
    Coordinates { x: f64, y: f64 },
}

/// One recorded action.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Click {
        locator: Locator,
        delay_ms: u64,
    },
    /// An empty selector is kept as-is and produces a skipped outcome.
    TypeText {
        selector: String,
        text: String,
        delay_ms: u64,
    },
}

impl Step {
    /// Time to wait after the previous action, before this one.
    pub fn delay_ms(&self) -> u64 {
        match self {
            Self::Click { delay_ms, .. } | Self::TypeText { delay_ms, .. } => *delay_ms,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Self::Click { .. } => StepKind::Click,
            Self::TypeText { .. } => StepKind::Type,
        }
    }
}

/// Step discriminant, used in outcomes and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Click,
    Type,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
        }
    }
}

/// A complete replay request.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    /// URI the session navigates to before the first step.
    pub target: String,
    /// Playback speed; 2.0 halves every delay, 0.5 doubles it.
    pub speed: f64,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Build a workflow at normal speed.
    pub fn new(target: impl Into<String>, steps: Vec<Step>) -> Result<Self, ReplayError> {
        let workflow = Self {
            target: target.into(),
            speed: 1.0,
            steps,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn with_speed(mut self, speed: f64) -> Result<Self, ReplayError> {
        self.speed = speed;
        self.validate()?;
        Ok(self)
    }

    /// Check the preconditions a replay relies on.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.steps.is_empty() {
            return Err(ReplayError::invalid("steps must not be empty"));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ReplayError::invalid(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        Ok(())
    }

    /// Parse a submission document.
    pub fn from_json_slice(body: &[u8], default_target: &str) -> Result<Self, ReplayError> {
        let doc: Value = serde_json::from_slice(body)
            .map_err(|e| ReplayError::invalid(format!("malformed JSON: {}", e)))?;
        Self::from_value(doc, default_target)
    }

    pub fn from_json_str(body: &str, default_target: &str) -> Result<Self, ReplayError> {
        Self::from_json_slice(body.as_bytes(), default_target)
    }

    pub fn from_value(doc: Value, default_target: &str) -> Result<Self, ReplayError> {
        let request: WorkflowRequest = serde_json::from_value(doc)
            .map_err(|e| ReplayError::invalid(format!("malformed workflow: {}", e)))?;
        request.into_workflow(default_target)
    }
}

// ── Submission document ─────────────────────────────────────────────────────

/// Raw submission as posted by the recorder page.
///
/// `steps` stays untyped until conversion so that a missing or non-array
/// value is reported as a workflow error rather than a serde message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub steps: Option<Value>,
}

/// Raw step entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub delay: Option<f64>,
}

impl WorkflowRequest {
    pub fn into_workflow(self, default_target: &str) -> Result<Workflow, ReplayError> {
        let raw_steps = match self.steps {
            None | Some(Value::Null) => return Err(ReplayError::invalid("missing steps")),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(ReplayError::invalid("steps must be an array")),
        };
        if raw_steps.is_empty() {
            return Err(ReplayError::invalid("steps must not be empty"));
        }

        let steps = raw_steps
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let request: StepRequest = serde_json::from_value(raw).map_err(|e| {
                    ReplayError::invalid(format!("step {}: {}", index, e))
                })?;
                request.into_step(index)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let target = self
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_target.to_string());

        let workflow = Workflow {
            target,
            speed: self.speed.unwrap_or(1.0),
            steps,
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

impl StepRequest {
    pub fn into_step(self, index: usize) -> Result<Step, ReplayError> {
        let delay_ms = delay_millis(self.delay);
        match self.kind.as_str() {
            "click" => {
                let selector = self.selector.filter(|s| !s.trim().is_empty());
                let point = match (self.x, self.y) {
                    (Some(x), Some(y)) => Some((x, y)),
                    (None, None) => None,
                    _ => {
                        return Err(ReplayError::invalid(format!(
                            "step {}: click coordinates need both x and y",
                            index
                        )));
                    }
                };
                let locator = match (selector, point) {
                    (Some(selector), None) => Locator::Selector(selector),
                    (None, Some((x, y))) => Locator::Coordinates { x, y },
                    (Some(_), Some(_)) => {
                        return Err(ReplayError::invalid(format!(
                            "step {}: click takes a selector or coordinates, not both",
                            index
                        )));
                    }
                    (None, None) => {
                        return Err(ReplayError::invalid(format!(
                            "step {}: click needs a selector or coordinates",
                            index
                        )));
                    }
                };
                Ok(Step::Click { locator, delay_ms })
            }
            "type" => {
                let text = self.value.ok_or_else(|| {
                    ReplayError::invalid(format!("step {}: type needs a value", index))
                })?;
                Ok(Step::TypeText {
                    selector: self.selector.unwrap_or_default(),
                    text,
                    delay_ms,
                })
            }
            other => Err(ReplayError::invalid(format!(
                "step {}: unknown step type {:?}",
                index, other
            ))),
        }
    }
}

/// Recorded delays can be fractional or negative; clamp to whole milliseconds.
fn delay_millis(delay: Option<f64>) -> u64 {
    match delay {
        Some(d) if d.is_finite() && d > 0.0 => d.round() as u64,
        _ => 0,
    }
}
