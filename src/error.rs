//! Error types.
//!
//! Two channels exist. `DriverError` is what a single browser primitive
//! reports; the scrapers either convert it into a `StageError` entry and keep
//! going, or wrap it into a run-aborting `ScrapeError`.

use std::time::Duration;

use thiserror::Error;

use crate::models::{InvalidTarget, StageError};

/// Failure of one page-automation primitive.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {}ms waiting for {action}", .after.as_millis())]
    Timeout { action: String, after: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no visible element matches {0}")]
    NotFound(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    pub fn timeout(action: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            action: action.into(),
            after,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Problems detected before any browser session opens.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    #[error("{0} must be set for profile scraping")]
    MissingCredential(&'static str),

    #[error("browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// A stage failure that aborted the run, with whatever video was saved.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub error: StageError,
    pub video_path: Option<String>,
}

/// A hard failure: the run produced no result.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] InvalidTarget),

    #[error("{}", .0.error.message)]
    Stage(Box<StageFailure>),

    #[error(
        "scrape returned empty content for {target}. \
         The page may be private, restricted, or the URL may be invalid."
    )]
    EmptyContent { target: String },

    #[error("failed to scrape article: {0}")]
    Article(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScrapeError {
    pub fn stage(error: StageError, video_path: Option<String>) -> Self {
        Self::Stage(Box::new(StageFailure { error, video_path }))
    }

    /// The stage record attached to a stage failure.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage(failure) => Some(&failure.error),
            _ => None,
        }
    }

    /// True when the failure is about the target rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidTarget(_)
                | Self::Stage(_)
                | Self::EmptyContent { .. }
                | Self::Article(_)
        )
    }
}
