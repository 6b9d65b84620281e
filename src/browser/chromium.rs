//! Chrome-backed driver using chromiumoxide (CDP).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{BrowserEngineConfig, RecordingConfig};
use super::locator::Locator;
use super::stealth::{LAUNCH_ARGS, NEW_DOCUMENT_PATCHES};
use super::{BrowserSession, PageHandle, SessionFactory, POLL_INTERVAL};
use crate::error::{DriverError, SetupError};
use crate::models::PageLink;
use crate::recorder::ScreencastRecorder;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// Pause between typing into an input and pressing Enter.
const KEYSTROKE_SETTLE: Duration = Duration::from_millis(500);
/// Pause after scrolling so lazy loaders can fire their requests.
const LAZY_LOAD_PAUSE: Duration = Duration::from_secs(1);
/// Gap between two readiness probes that must agree before a page counts as idle.
const IDLE_PROBE: Duration = Duration::from_millis(500);

const READY_SCRIPT: &str = r#"(() => ({
    complete: document.readyState === 'complete',
    resources: performance.getEntriesByType('resource').length
}))()"#;

const SCROLL_SCRIPT: &str = r#"(() => {
    window.scrollBy(0, document.body ? document.body.scrollHeight : 0);
    return null;
})()"#;

#[derive(Debug, Deserialize)]
struct ReadyState {
    complete: bool,
    resources: u64,
}

/// Launches a dedicated Chrome (or connects to a remote one) per session.
pub struct ChromiumSessionFactory {
    config: BrowserEngineConfig,
    recording: RecordingConfig,
}

impl ChromiumSessionFactory {
    pub fn new(config: BrowserEngineConfig, recording: RecordingConfig) -> Self {
        Self { config, recording }
    }

    /// Find Chrome executable.
    fn find_chrome(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            anyhow::bail!("Configured Chrome executable not found: {}", path.display());
        }

        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Please install it:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium\n\
             - Or download from: https://www.google.com/chrome/"
        ))
    }

    /// Launch a local browser, or connect to the configured remote one.
    async fn start_browser(&self) -> anyhow::Result<(Browser, JoinHandle<()>, bool)> {
        if let Some(remote_url) = &self.config.remote_url {
            let (browser, handler) = self.connect_remote(remote_url).await?;
            return Ok((browser, handler, true));
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = self.find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.timeout))
            .window_size(1280, 800);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        for arg in LAUNCH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok((browser, spawn_handler(handler), false))
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> anyhow::Result<(Browser, JoinHandle<()>)> {
        info!("Connecting to remote browser at {}", url);

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        Ok((browser, spawn_handler(handler)))
    }

    /// Open the primary page, patch it, and start recording.
    async fn prepare_page(
        &self,
        browser: &Browser,
    ) -> anyhow::Result<(Page, Option<ScreencastRecorder>)> {
        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
            .await
            .context("Failed to set user agent")?;

        if self.config.stealth {
            apply_patches(&page).await;
        }

        let recorder = if self.recording.enabled {
            match ScreencastRecorder::start(&page, &self.recording).await {
                Ok(recorder) => Some(recorder),
                Err(e) => {
                    warn!("Session recording unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok((page, recorder))
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, SetupError> {
        let (mut browser, handler, remote) = self
            .start_browser()
            .await
            .map_err(|e| SetupError::EngineUnavailable(format!("{:#}", e)))?;

        match self.prepare_page(&browser).await {
            Ok((page, recorder)) => Ok(Box::new(ChromiumSession {
                browser,
                handler,
                primary: ChromiumPage { page },
                popups: Vec::new(),
                recorder,
                remote,
                stealth: self.config.stealth,
            })),
            Err(e) => {
                if !remote {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                }
                handler.abort();
                Err(SetupError::EngineUnavailable(format!("{:#}", e)))
            }
        }
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

async fn apply_patches(page: &Page) {
    for script in NEW_DOCUMENT_PATCHES {
        let params = AddScriptToEvaluateOnNewDocumentParams::new(script.to_string());
        if let Err(e) = page.execute(params).await {
            debug!("Navigator patch skipped: {}", e);
        }
    }
}

fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

/// Wrap a script body so it runs against the elements matching `selector`.
///
/// The body sees `nodes` (matches, already text-filtered) and `visible(el)`,
/// and must `return` a JSON-serializable value.
fn locator_script(selector: &str, body: &str) -> String {
    let locator = Locator::parse(selector);
    let css = serde_json::Value::from(locator.css).to_string();
    let text = locator
        .text
        .map(|t| serde_json::Value::from(t).to_string())
        .unwrap_or_else(|| "null".to_string());

    format!(
        r#"(() => {{
    const text = {text};
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    const nodes = Array.from(document.querySelectorAll({css}))
        .filter((el) => text === null || (el.innerText || el.textContent || '').includes(text));
    {body}
}})()"#
    )
}

const FIRST_TEXT: &str = r#"if (nodes.length === 0) return null;
    return (nodes[0].innerText || nodes[0].textContent || '').trim();"#;

const COUNT: &str = "return nodes.length;";

const ANY_VISIBLE: &str = "return nodes.some(visible);";

const TAG_FIRST_VISIBLE: &str = r#"const el = nodes.find(visible);
    if (!el) return null;
    const id = 'rb-' + Math.random().toString(36).slice(2);
    el.setAttribute('data-rb-target', id);
    el.scrollIntoView({ block: 'center' });
    return id;"#;

fn all_texts(limit: usize) -> String {
    format!(
        "return nodes.slice(0, {limit}).map((el) => (el.innerText || el.textContent || '').trim());"
    )
}

fn all_links(limit: usize) -> String {
    format!(
        r#"return nodes
        .filter((el) => el.getAttribute('href'))
        .slice(0, {limit})
        .map((el) => ({{ text: (el.innerText || el.textContent || '').trim(), href: el.getAttribute('href') }}));"#
    )
}

/// A single CDP page.
struct ChromiumPage {
    page: Page,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, DriverError> {
        self.page
            .evaluate(script)
            .await
            .map_err(protocol)?
            .into_value::<T>()
            .map_err(|e| DriverError::Protocol(format!("unexpected script result: {}", e)))
    }

    /// Mark the first visible match and return a handle to it.
    async fn tagged_element(&self, selector: &str) -> Result<Element, DriverError> {
        let tag: Option<String> = self.eval(locator_script(selector, TAG_FIRST_VISIBLE)).await?;
        let tag = tag.ok_or_else(|| DriverError::NotFound(selector.to_string()))?;
        self.page
            .find_element(format!("[data-rb-target='{}']", tag))
            .await
            .map_err(protocol)
    }
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::timeout(format!("navigation to {}", url), timeout)),
        }
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        let mut settled_at: Option<u64> = None;

        loop {
            // Evaluation fails while a navigation swaps the execution context;
            // that just means "not ready yet".
            match self.eval::<ReadyState>(READY_SCRIPT.to_string()).await {
                Ok(state) if state.complete => {
                    if settled_at == Some(state.resources) {
                        return Ok(());
                    }
                    settled_at = Some(state.resources);
                }
                Ok(_) => settled_at = None,
                Err(e) => {
                    debug!("Ready-state probe failed: {}", e);
                    settled_at = None;
                }
            }

            if Instant::now() >= deadline {
                return Err(DriverError::timeout("page to finish loading", timeout));
            }
            tokio::time::sleep(IDLE_PROBE).await;
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval::<u64>(locator_script(selector, COUNT)).await {
                Ok(count) if count > 0 => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("Selector probe for {} failed: {}", selector, e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout(selector, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        self.eval(locator_script(selector, ANY_VISIBLE)).await
    }

    async fn query_single(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.eval(locator_script(selector, FIRST_TEXT)).await
    }

    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<String>, DriverError> {
        self.eval(locator_script(selector, &all_texts(limit))).await
    }

    async fn query_links(
        &self,
        selector: &str,
        limit: usize,
    ) -> Result<Vec<PageLink>, DriverError> {
        self.eval(locator_script(selector, &all_links(limit))).await
    }

    async fn fill_and_submit(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        let element = self.tagged_element(selector).await?;
        element.click().await.map_err(protocol)?;
        element.type_str(text).await.map_err(protocol)?;
        tokio::time::sleep(KEYSTROKE_SETTLE).await;
        element.press_key("Enter").await.map_err(protocol)?;
        Ok(())
    }

    async fn scroll_to_bottom(&self, idle: Duration) -> Result<(), DriverError> {
        self.eval::<serde_json::Value>(SCROLL_SCRIPT.to_string())
            .await?;
        tokio::time::sleep(LAZY_LOAD_PAUSE).await;
        self.wait_ready(idle).await
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }
}

/// One run's browser: the process (or remote connection), its primary page,
/// the popups it opened and the screencast recorder attached to it.
struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    primary: ChromiumPage,
    popups: Vec<Page>,
    recorder: Option<ScreencastRecorder>,
    remote: bool,
    stealth: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn primary(&self) -> &dyn PageHandle {
        &self.primary
    }

    async fn click_expecting_popup(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PageHandle>, DriverError> {
        let known: Vec<TargetId> = self
            .browser
            .pages()
            .await
            .map_err(protocol)?
            .iter()
            .map(|p| p.target_id().clone())
            .collect();

        let element = self.primary.tagged_element(selector).await?;
        element.click().await.map_err(protocol)?;

        let deadline = Instant::now() + timeout;
        loop {
            let pages = self.browser.pages().await.map_err(protocol)?;
            if let Some(popup) = pages
                .into_iter()
                .find(|p| !known.contains(p.target_id()))
            {
                debug!("Popup opened: {:?}", popup.target_id());
                if self.stealth {
                    apply_patches(&popup).await;
                }
                self.popups.push(popup.clone());
                return Ok(Box::new(ChromiumPage { page: popup }));
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout("popup window to open", timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(self: Box<Self>) -> Option<PathBuf> {
        let mut session = *self;

        let raw = match session.recorder.take() {
            Some(recorder) => recorder.stop(&session.primary.page).await,
            None => None,
        };

        if session.remote {
            // A shared browser outlives the run, so every tab it opened is closed here.
            for popup in session.popups.drain(..) {
                if let Err(e) = popup.close().await {
                    debug!("Popup already gone: {}", e);
                }
            }
            if let Err(e) = session.primary.page.clone().close().await {
                debug!("Failed to close remote page: {}", e);
            }
        } else {
            if let Err(e) = session.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = session.browser.wait().await {
                debug!("Waiting for browser exit failed: {}", e);
            }
        }
        session.handler.abort();

        raw
    }
}
