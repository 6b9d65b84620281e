//! Page automation driver.
//!
//! The scrapers talk to the browser only through the traits in this module,
//! so a run can be driven by Chrome (via chromiumoxide) in production and by
//! a scripted in-memory page in tests.
//!
//! Every primitive is a point-in-time snapshot with no retries. Anything that
//! waits takes an explicit timeout and reports expiry as
//! [`DriverError::Timeout`] instead of returning an empty value.

#[cfg(feature = "browser")]
mod chromium;
mod config;
mod locator;
#[cfg(feature = "browser")]
mod stealth;

#[cfg(feature = "browser")]
pub use chromium::ChromiumSessionFactory;
pub use config::{BrowserEngineConfig, RecordingConfig};
pub use locator::Locator;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{DriverError, SetupError};
use crate::models::PageLink;

/// Upper bound on raw elements read for one selector.
pub const RAW_QUERY_LIMIT: usize = 500;

/// One live browsing context (a tab or popup window).
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Load `url` and wait for the navigation to commit.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Wait until the document is loaded and network activity has settled.
    async fn wait_ready(&self, timeout: Duration) -> Result<(), DriverError>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Whether a rendered, visible element matches `selector` right now.
    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError>;

    /// Text of the first element matching `selector`.
    async fn query_single(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Text of up to `limit` elements matching `selector`, in document order.
    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<String>, DriverError>;

    /// Text and `href` of up to `limit` anchors matching `selector`.
    async fn query_links(&self, selector: &str, limit: usize)
        -> Result<Vec<PageLink>, DriverError>;

    /// Focus the first visible match, type `text`, and press Enter.
    async fn fill_and_submit(&self, selector: &str, text: &str) -> Result<(), DriverError>;

    /// Scroll to the bottom to trigger lazy content, then wait up to `idle`
    /// for the page to settle.
    async fn scroll_to_bottom(&self, idle: Duration) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;
}

/// A browser session owned by exactly one run.
#[async_trait]
pub trait BrowserSession: Send {
    /// The page the session opened with.
    fn primary(&self) -> &dyn PageHandle;

    /// Click the first visible match on the primary page and return the
    /// window it opens.
    async fn click_expecting_popup(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PageHandle>, DriverError>;

    /// Release the browser, including every popup opened through
    /// [`click_expecting_popup`](Self::click_expecting_popup), and stop
    /// recording. Returns the raw recording, if one was captured.
    async fn close(self: Box<Self>) -> Option<PathBuf>;
}

/// Opens fresh, unshared browser sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, SetupError>;
}

/// Factory used when browser support is compiled out.
pub struct UnavailableSessionFactory;

#[async_trait]
impl SessionFactory for UnavailableSessionFactory {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, SetupError> {
        Err(SetupError::EngineUnavailable(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}

/// Build the default session factory for this build.
#[cfg(feature = "browser")]
pub fn default_factory(
    config: BrowserEngineConfig,
    recording: RecordingConfig,
) -> Arc<dyn SessionFactory> {
    Arc::new(ChromiumSessionFactory::new(config, recording))
}

/// Build the default session factory for this build.
#[cfg(not(feature = "browser"))]
pub fn default_factory(
    _config: BrowserEngineConfig,
    _recording: RecordingConfig,
) -> Arc<dyn SessionFactory> {
    Arc::new(UnavailableSessionFactory)
}

/// Poll the page URL until `accept` returns true.
pub async fn wait_for_url<F>(
    page: &dyn PageHandle,
    accept: F,
    description: &str,
    timeout: Duration,
) -> Result<String, DriverError>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let url = page.current_url().await?;
        if accept(&url) {
            return Ok(url);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(DriverError::timeout(
                format!("{} (last URL: {})", description, url),
                timeout,
            ));
        }
        tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
    }
}

/// Interval between polls of page state.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(250);
