//! In-memory scripted surface.
//!
//! Resolves a configured set of selectors, can be told to fail at open,
//! navigation, coordinate clicks or close, and journals every call. Backs
//! `--dry-run` and the test suite.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Session, SurfaceDriver};
use crate::error::DriverError;

/// One primitive issued against a scripted session.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Open { session: usize },
    Navigate { session: usize, uri: String },
    ClickAt { session: usize, x: f64, y: f64 },
    ClickElement { session: usize, selector: String },
    FocusElement { session: usize, selector: String },
    TypeText {
        session: usize,
        text: String,
        per_char_delay: Duration,
    },
    Close { session: usize },
}

#[derive(Debug, Default)]
struct ScriptedState {
    selectors: HashSet<String>,
    resolve_all: bool,
    fail_open: bool,
    fail_navigation: bool,
    fail_coordinates: bool,
    fail_close: bool,
    opened: AtomicUsize,
    journal: Mutex<Vec<SurfaceCall>>,
}

impl ScriptedState {
    fn record(&self, call: SurfaceCall) {
        self.journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn resolves(&self, selector: &str) -> bool {
        self.resolve_all || self.selectors.contains(selector)
    }
}

/// Scripted driver. Clones share the journal.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    state: Arc<ScriptedState>,
}

impl ScriptedDriver {
    /// Surface where no selector resolves.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface where every selector resolves.
    pub fn permissive() -> Self {
        Self::from_state(ScriptedState {
            resolve_all: true,
            ..Default::default()
        })
    }

    /// Surface where exactly `selectors` resolve.
    pub fn with_selectors<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_state(ScriptedState {
            selectors: selectors.into_iter().map(Into::into).collect(),
            ..Default::default()
        })
    }

    pub fn failing_open(self) -> Self {
        self.update(|s| s.fail_open = true)
    }

    pub fn failing_navigation(self) -> Self {
        self.update(|s| s.fail_navigation = true)
    }

    pub fn failing_coordinates(self) -> Self {
        self.update(|s| s.fail_coordinates = true)
    }

    pub fn failing_close(self) -> Self {
        self.update(|s| s.fail_close = true)
    }

    /// Every call issued so far, across all sessions, in order.
    pub fn journal(&self) -> Vec<SurfaceCall> {
        self.state
            .journal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Calls issued to one session.
    pub fn session_journal(&self, session: usize) -> Vec<SurfaceCall> {
        self.journal()
            .into_iter()
            .filter(|call| call.session() == session)
            .collect()
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.journal()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Close { .. }))
            .count()
    }

    fn from_state(state: ScriptedState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    // Clones share one state, so a builder applied after cloning would only
    // reach some of them.
    fn update(self, f: impl FnOnce(&mut ScriptedState)) -> Self {
        match Arc::try_unwrap(self.state) {
            Ok(mut state) => {
                f(&mut state);
                Self::from_state(state)
            }
            Err(_) => panic!("scripted driver options must be set before the driver is cloned"),
        }
    }
}

impl SurfaceCall {
    pub fn session(&self) -> usize {
        match self {
            Self::Open { session }
            | Self::Navigate { session, .. }
            | Self::ClickAt { session, .. }
            | Self::ClickElement { session, .. }
            | Self::FocusElement { session, .. }
            | Self::TypeText { session, .. }
            | Self::Close { session } => *session,
        }
    }
}

#[async_trait]
impl SurfaceDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_session(&self) -> Result<Box<dyn Session>, DriverError> {
        if self.state.fail_open {
            return Err(DriverError::Launch("scripted surface refused to open".into()));
        }
        let id = self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.record(SurfaceCall::Open { session: id });
        Ok(Box::new(ScriptedSession {
            id,
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    id: usize,
    state: Arc<ScriptedState>,
    closed: bool,
}

impl ScriptedSession {
    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn navigate(&mut self, uri: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.state.record(SurfaceCall::Navigate {
            session: self.id,
            uri: uri.to_string(),
        });
        url::Url::parse(uri).map_err(|e| DriverError::InvalidTarget {
            target: uri.to_string(),
            reason: e.to_string(),
        })?;
        if self.state.fail_navigation {
            return Err(DriverError::Navigation(format!("{} is unreachable", uri)));
        }
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.state.record(SurfaceCall::ClickAt {
            session: self.id,
            x,
            y,
        });
        if self.state.fail_coordinates {
            return Err(DriverError::action("mouse dispatch", "target crashed"));
        }
        Ok(())
    }

    async fn click_element(&mut self, selector: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.state.record(SurfaceCall::ClickElement {
            session: self.id,
            selector: selector.to_string(),
        });
        if !self.state.resolves(selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn focus_element(&mut self, selector: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.state.record(SurfaceCall::FocusElement {
            session: self.id,
            selector: selector.to_string(),
        });
        if !self.state.resolves(selector) {
            return Err(DriverError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        text: &str,
        per_char_delay: Duration,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.state.record(SurfaceCall::TypeText {
            session: self.id,
            text: text.to_string(),
            per_char_delay,
        });
        for (i, _) in text.chars().enumerate() {
            if i > 0 && !per_char_delay.is_zero() {
                tokio::time::sleep(per_char_delay).await;
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.closed = true;
        self.state.record(SurfaceCall::Close { session: self.id });
        if self.state.fail_close {
            return Err(DriverError::action("close", "browser already gone"));
        }
        Ok(())
    }
}
