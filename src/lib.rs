//! Roast Battle - profile acquisition for a roast battle game.
//!
//! Signs into LinkedIn through a Google popup, extracts profile fields with
//! selector fallbacks, records each browser session, and reports partial
//! failures per field. Articles come from the MediaWiki API and any other
//! page is scraped through the same recorded browser pipeline.

pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod recorder;
pub mod scrapers;
pub mod server;

pub use error::{DriverError, ScrapeError, SetupError};
pub use models::{ExtractionReport, ExtractionResult, RunStatus, ScrapeTarget, StageError};
pub use scrapers::Scraper;
