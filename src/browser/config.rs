//! Browser engine and recording configuration.
//!
//! Always compiled (not behind the `browser` feature) so config files parse
//! the same way whether or not Chrome support is built in.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch a run while debugging selectors.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// CDP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Explicit Chrome executable; auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent presented by the browser.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Inject the navigator patches from `stealth.rs` into every document.
    #[serde(default = "default_true")]
    pub stealth: bool,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            chrome_path: None,
            remote_url: None,
            user_agent: default_user_agent(),
            stealth: true,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `ROASTBATTLE_HEADLESS` - "0"/"false" to show the browser window
    /// - `SOCKS_PROXY` - proxy for browser traffic, if none is configured
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("ROASTBATTLE_HEADLESS") {
            match val.to_lowercase().as_str() {
                "0" | "false" | "no" => self.headless = false,
                "1" | "true" | "yes" => self.headless = true,
                _ => {}
            }
        }

        if self.proxy.is_none() {
            if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
                if !proxy.is_empty() {
                    self.proxy = Some(proxy);
                }
            }
        }

        self
    }
}

/// Where session recordings are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Record sessions at all.
    pub enabled: bool,
    /// Scratch directory for in-progress recordings.
    pub raw_dir: PathBuf,
    /// JPEG quality for captured frames (0-100).
    pub quality: u8,
}

impl RecordingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            raw_dir: PathBuf::new(),
            quality: 0,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

pub fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
