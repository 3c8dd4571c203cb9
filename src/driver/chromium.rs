//! Chromium surface over CDP, via chromiumoxide.
//!
//! Each session launches its own browser process with a single page, so
//! concurrent replays never share a tab.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::layout::Point;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use tracing::{debug, warn};

use super::{Session, SurfaceDriver};
use crate::config::BrowserOptions;
use crate::error::DriverError;

pub struct ChromiumDriver {
    options: BrowserOptions,
}

impl ChromiumDriver {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> Result<BrowserConfig, DriverError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.options.window_width, self.options.window_height);
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.options.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| DriverError::Launch(format!("failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl SurfaceDriver for ChromiumDriver {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn open_session(&self) -> Result<Box<dyn Session>, DriverError> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(format!("failed to launch browser: {}", e)))?;

        // The CDP connection only makes progress while the handler is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(format!("failed to open page: {}", e)));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page: Some(page),
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    async fn press_char(&self, ch: char) -> Result<(), DriverError> {
        let page = self.page()?;
        let text = ch.to_string();

        let key_down = DispatchKeyEventParams::builder()
            .key(text.clone())
            .text(text.clone())
            .r#type(DispatchKeyEventType::KeyDown)
            .build()
            .map_err(|e| DriverError::action("key down", e))?;
        page.execute(key_down)
            .await
            .map_err(|e| DriverError::action("key down", e))?;

        let key_up = DispatchKeyEventParams::builder()
            .key(text)
            .r#type(DispatchKeyEventType::KeyUp)
            .build()
            .map_err(|e| DriverError::action("key up", e))?;
        page.execute(key_up)
            .await
            .map_err(|e| DriverError::action("key up", e))?;

        Ok(())
    }
}

#[async_trait]
impl Session for ChromiumSession {
    async fn navigate(&mut self, uri: &str) -> Result<(), DriverError> {
        let target = url::Url::parse(uri).map_err(|e| DriverError::InvalidTarget {
            target: uri.to_string(),
            reason: e.to_string(),
        })?;
        // goto resolves once the page has loaded.
        self.page()?
            .goto(target.as_str())
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), DriverError> {
        self.page()?
            .click(Point { x, y })
            .await
            .map_err(|e| DriverError::action("mouse dispatch", e))?;
        Ok(())
    }

    async fn click_element(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| DriverError::action("click", e))?;
        Ok(())
    }

    async fn focus_element(&mut self, selector: &str) -> Result<(), DriverError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| DriverError::ElementNotFound(format!("{}: {}", selector, e)))?;
        element
            .focus()
            .await
            .map_err(|e| DriverError::action("focus", e))?;
        Ok(())
    }

    async fn type_text(
        &mut self,
        text: &str,
        per_char_delay: Duration,
    ) -> Result<(), DriverError> {
        for (i, ch) in text.chars().enumerate() {
            if i > 0 && !per_char_delay.is_zero() {
                tokio::time::sleep(per_char_delay).await;
            }
            self.press_char(ch).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        let page = self.page.take().ok_or(DriverError::Closed)?;
        if let Err(e) = page.close().await {
            warn!(error = %e, "failed to close page");
        }
        let result = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| DriverError::action("close", e));
        self.handler_task.abort();
        result
    }
}
