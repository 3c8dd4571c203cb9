//! Delayed session release.
//!
//! A finished replay leaves its session open for a grace period so the page
//! can be inspected, then closes it unconditionally. The timer is
//! cancellable: cancelling releases the session at once.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::driver::Session;
use crate::metrics;

/// Pending release of one session.
///
/// Dropping the handle does not cancel anything; the session is still
/// closed once the grace period runs out.
#[derive(Debug)]
pub struct TeardownHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TeardownHandle {
    /// Close `session` after `grace`, or as soon as `cancel` fires.
    pub fn schedule(session: Box<dyn Session>, grace: Duration, cancel: CancellationToken) -> Self {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if !grace.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => debug!("teardown pre-empted"),
                    _ = tokio::time::sleep(grace) => debug!(?grace, "teardown grace period elapsed"),
                }
            }
            release(session).await;
        });
        Self { cancel, task }
    }

    /// Skip the rest of the grace period and wait for the session to close.
    pub async fn shutdown_now(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "teardown task failed");
        }
    }

    /// Wait for the scheduled release without pre-empting it.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "teardown task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Close a session now. Close errors are logged and swallowed.
pub async fn release(mut session: Box<dyn Session>) {
    match session.close().await {
        Ok(()) => debug!("session closed"),
        Err(e) => warn!(error = %e, "session teardown failed"),
    }
    metrics::record_session_closed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ScriptedDriver, SurfaceDriver};

    async fn open(driver: &ScriptedDriver) -> Box<dyn Session> {
        driver.open_session().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn closes_after_grace_period() {
        let driver = ScriptedDriver::permissive();
        let handle = TeardownHandle::schedule(
            open(&driver).await,
            Duration::from_secs(30),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(driver.sessions_closed(), 0);

        let start = tokio::time::Instant::now();
        handle.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_now_preempts_timer() {
        let driver = ScriptedDriver::permissive();
        let handle = TeardownHandle::schedule(
            open(&driver).await,
            Duration::from_secs(30),
            CancellationToken::new(),
        );

        let start = tokio::time::Instant::now();
        handle.shutdown_now().await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_token_cancels_pending_teardowns() {
        let driver = ScriptedDriver::permissive();
        let parent = CancellationToken::new();
        let first = TeardownHandle::schedule(
            open(&driver).await,
            Duration::from_secs(30),
            parent.child_token(),
        );
        let second = TeardownHandle::schedule(
            open(&driver).await,
            Duration::from_secs(30),
            parent.child_token(),
        );

        parent.cancel();
        first.wait().await;
        second.wait().await;
        assert_eq!(driver.sessions_closed(), 2);
    }

    #[tokio::test]
    async fn close_errors_are_swallowed() {
        let driver = ScriptedDriver::permissive().failing_close();
        let handle =
            TeardownHandle::schedule(open(&driver).await, Duration::ZERO, CancellationToken::new());
        handle.wait().await;
        assert_eq!(driver.sessions_closed(), 1);
    }
}
