//! Target-surface drivers.
//!
//! The engine never talks to a browser directly. It opens a [`Session`]
//! through a [`SurfaceDriver`] and issues the handful of primitives below.
//!
//! - [`ScriptedDriver`]: in-memory surface for dry runs and tests
//! - `ChromiumDriver`: real Chromium over CDP (requires the `browser` feature)

#[cfg(feature = "browser")]
pub mod chromium;
pub mod scripted;

#[cfg(feature = "browser")]
pub use chromium::ChromiumDriver;
pub use scripted::{ScriptedDriver, SurfaceCall};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::DriverError;

/// Source of exclusively-owned surface sessions.
#[async_trait]
pub trait SurfaceDriver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn open_session(&self) -> Result<Box<dyn Session>, DriverError>;
}

/// One live surface (a browser page). Owned by a single replay at a time.
#[async_trait]
pub trait Session: Send {
    async fn navigate(&mut self, uri: &str) -> Result<(), DriverError>;

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError>;

    async fn click_element(&mut self, selector: &str) -> Result<(), DriverError>;

    async fn focus_element(&mut self, selector: &str) -> Result<(), DriverError>;

    /// Emit `text` one character at a time, `per_char_delay` apart.
    async fn type_text(&mut self, text: &str, per_char_delay: Duration)
    -> Result<(), DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Pick the driver for this process.
///
/// `dry_run` always yields a permissive scripted surface. Otherwise a real
/// Chromium driver is used when the crate was built with `browser`.
pub fn build_driver(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn SurfaceDriver>> {
    if dry_run {
        tracing::info!("using scripted surface (dry run)");
        return Ok(Arc::new(ScriptedDriver::permissive()));
    }

    #[cfg(feature = "browser")]
    {
        Ok(Arc::new(ChromiumDriver::new(config.browser.clone())))
    }

    #[cfg(not(feature = "browser"))]
    {
        let _ = config;
        anyhow::bail!(
            "browser automation requires the 'browser' feature. \
             Build with: cargo build --features browser, or pass --dry-run"
        )
    }
}
