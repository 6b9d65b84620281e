//! Configuration management for roastbattle using the prefer crate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::{BrowserEngineConfig, RecordingConfig};
use crate::error::SetupError;

/// Default videos subdirectory name, relative to the working root.
const VIDEOS_SUBDIR: &str = "videos";

/// Default MediaWiki API endpoint for article lookups.
pub const DEFAULT_MEDIAWIKI_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Environment variable holding the identity-provider account email.
pub const EMAIL_VAR: &str = "LI_EMAIL";
/// Environment variable holding the identity-provider account password.
pub const PASSWORD_VAR: &str = "LI_PASSWORD";

/// Timeouts and settle delays for browser runs, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Loading the login page.
    pub login_page_ms: u64,
    /// Waiting for the provider popup after clicking its button.
    pub provider_button_ms: u64,
    /// Provider popup settling after it opens.
    pub provider_page_ms: u64,
    /// Each credential input appearing.
    pub credential_input_ms: u64,
    /// Redirect back to the target site after sign-in.
    pub redirect_ms: u64,
    /// Loading the target page.
    pub page_load_ms: u64,
    /// Network idle after scrolling to the bottom.
    pub scroll_idle_ms: u64,
    /// Pause before interacting with a freshly loaded element.
    pub input_settle_ms: u64,
    /// Pause between auth steps.
    pub step_settle_ms: u64,
    /// Pause after the final credential is submitted.
    pub submit_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            login_page_ms: 30_000,
            provider_button_ms: 10_000,
            provider_page_ms: 15_000,
            credential_input_ms: 10_000,
            redirect_ms: 30_000,
            page_load_ms: 30_000,
            scroll_idle_ms: 10_000,
            input_settle_ms: 1_000,
            step_settle_ms: 2_000,
            submit_settle_ms: 3_000,
        }
    }
}

impl Timing {
    /// Keep the timeouts but drop every settle delay.
    pub fn without_settle(mut self) -> Self {
        self.input_settle_ms = 0;
        self.step_settle_ms = 0;
        self.submit_settle_ms = 0;
        self
    }
}

/// Convert a millisecond setting to a `Duration`.
pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// A value that must never show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

/// Identity-provider account used for profile runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: Secret,
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Browser engine options.
    pub browser: BrowserEngineConfig,
    /// Browser run timeouts and settle delays.
    pub timing: Timing,
    /// Directory that stored video references are relative to.
    pub working_root: PathBuf,
    /// Directory recordings are moved into.
    pub videos_dir: PathBuf,
    /// Scratch directory for in-progress recordings.
    pub scratch_dir: PathBuf,
    /// Record browser sessions.
    pub record_sessions: bool,
    /// JPEG quality of recorded frames.
    pub recording_quality: u8,
    /// User agent for plain HTTP requests.
    pub user_agent: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// MediaWiki API endpoint.
    pub mediawiki_endpoint: String,
    /// Listen address for the HTTP surface.
    pub bind: String,
    /// Account email (config file or `LI_EMAIL`).
    pub linkedin_email: Option<String>,
    /// Account password (`LI_PASSWORD` only).
    pub linkedin_password: Option<Secret>,
}

impl Default for Settings {
    fn default() -> Self {
        let working_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self {
            browser: BrowserEngineConfig::default(),
            timing: Timing::default(),
            videos_dir: working_root.join(VIDEOS_SUBDIR),
            working_root,
            scratch_dir: std::env::temp_dir().join("roastbattle-recordings"),
            record_sessions: true,
            recording_quality: 60,
            user_agent: "RoastBattle/0.3 (profile enrichment)".to_string(),
            request_timeout: 30,
            mediawiki_endpoint: DEFAULT_MEDIAWIKI_ENDPOINT.to_string(),
            bind: DEFAULT_BIND.to_string(),
            linkedin_email: None,
            linkedin_password: None,
        }
    }
}

impl Settings {
    /// Create settings rooted at a custom working directory.
    pub fn with_working_root(working_root: PathBuf) -> Self {
        Self {
            videos_dir: working_root.join(VIDEOS_SUBDIR),
            working_root,
            ..Default::default()
        }
    }

    /// Recording options for the session factory.
    pub fn recording(&self) -> RecordingConfig {
        RecordingConfig {
            enabled: self.record_sessions,
            raw_dir: self.scratch_dir.clone(),
            quality: self.recording_quality,
        }
    }

    /// The account for profile runs. Both values are required.
    pub fn credentials(&self) -> Result<Credentials, SetupError> {
        let email = self
            .linkedin_email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or(SetupError::MissingCredential(EMAIL_VAR))?;
        let password = self
            .linkedin_password
            .clone()
            .filter(|p| !p.expose().is_empty())
            .ok_or(SetupError::MissingCredential(PASSWORD_VAR))?;
        Ok(Credentials { email, password })
    }

    /// Apply environment overrides, reading variables through `var`.
    ///
    /// - `LI_EMAIL`, `LI_PASSWORD` - profile account
    /// - `ROASTBATTLE_VIDEOS_DIR` - where recordings are stored
    /// - `ROASTBATTLE_BIND` - listen address
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| var(name).filter(|v| !v.is_empty());

        if let Some(email) = non_empty(EMAIL_VAR) {
            self.linkedin_email = Some(email);
        }
        if let Some(password) = non_empty(PASSWORD_VAR) {
            self.linkedin_password = Some(Secret::new(password));
        }
        if let Some(dir) = non_empty("ROASTBATTLE_VIDEOS_DIR") {
            self.videos_dir = resolve_path(&dir, &self.working_root);
        }
        if let Some(bind) = non_empty("ROASTBATTLE_BIND") {
            self.bind = bind;
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser engine options.
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Browser run timeouts and settle delays.
    #[serde(default)]
    pub timing: Timing,
    /// Working root for stored video references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_root: Option<String>,
    /// Videos directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos_dir: Option<String>,
    /// Record browser sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_sessions: Option<bool>,
    /// JPEG quality of recorded frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_quality: Option<u8>,
    /// User agent string for HTTP requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// MediaWiki API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediawiki_endpoint: Option<String>,
    /// Listen address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Account email. The password is only ever read from `LI_PASSWORD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_email: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers roastbattle config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("roastbattle").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}; using defaults", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => {
                // No config file found, use defaults with env overrides
                Self::default_with_env()
            }
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self {
            browser: BrowserEngineConfig::default().with_env_overrides(),
            ..Self::default()
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    /// Parse config text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        settings.browser = self.browser.clone();
        settings.timing = self.timing.clone();

        if let Some(ref root) = self.working_root {
            settings.working_root = resolve_path(root, base_dir);
            settings.videos_dir = settings.working_root.join(VIDEOS_SUBDIR);
        }
        if let Some(ref dir) = self.videos_dir {
            settings.videos_dir = resolve_path(dir, &settings.working_root);
        }
        if let Some(record) = self.record_sessions {
            settings.record_sessions = record;
        }
        if let Some(quality) = self.recording_quality {
            settings.recording_quality = quality.min(100);
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref endpoint) = self.mediawiki_endpoint {
            settings.mediawiki_endpoint = endpoint.clone();
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(ref email) = self.linkedin_email {
            settings.linkedin_email = Some(email.clone());
        }
    }
}

/// Resolve a path that may be relative.
/// - Absolute paths are returned as-is
/// - Paths starting with ~ are expanded
/// - Relative paths are resolved against `base_dir`
pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(path_str);
    let path = Path::new(expanded.as_ref());

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default_with_env()
            }
        },
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    settings.apply_env(|name| std::env::var(name).ok());

    (settings, config)
}
