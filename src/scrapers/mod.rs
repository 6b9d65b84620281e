//! Scrapers for player profiles.
//!
//! [`Scraper`] is built once at startup and routes each raw target to the
//! profile, article or generic-page scraper. Every call is an independent run
//! with its own browser session.

pub mod article;
pub mod auth;
pub mod extract;
pub mod outcome;
pub mod profile;
pub mod web;

pub use article::ArticleScraper;
pub use auth::{AuthFlow, AuthStage, AuthState};
pub use extract::{collapse_whitespace, extract_field, extract_fields, Arity, FieldSpec};
pub use outcome::finalize;
pub use profile::ProfileScraper;
pub use web::WebPageScraper;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::browser::{default_factory, SessionFactory};
use crate::config::Settings;
use crate::error::{ScrapeError, SetupError};
use crate::models::{ExtractionReport, ScrapeTarget, ScrapedRecord, TargetKind};
use crate::recorder::VideoStore;

/// Entry point for the orchestration layer.
pub struct Scraper {
    profiles: Result<ProfileScraper, SetupError>,
    articles: ArticleScraper,
    pages: WebPageScraper,
}

impl Scraper {
    /// Build a scraper that drives Chrome.
    pub fn from_settings(settings: &Settings) -> Result<Self, SetupError> {
        let factory = default_factory(settings.browser.clone(), settings.recording());
        Self::with_factory(settings, factory)
    }

    /// Build a scraper over an arbitrary session factory.
    ///
    /// Missing credentials do not fail construction; they are kept and
    /// reported on every profile run instead, so article and page runs keep
    /// working.
    pub fn with_factory(
        settings: &Settings,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self, SetupError> {
        let videos = VideoStore::new(settings.videos_dir.clone(), settings.working_root.clone());

        let profiles = settings.credentials().map(|credentials| {
            ProfileScraper::new(
                factory.clone(),
                credentials,
                settings.timing.clone(),
                videos.clone(),
            )
        });
        if let Err(ref e) = profiles {
            warn!("Profile scraping unavailable: {}", e);
        }

        let articles = ArticleScraper::new(
            &settings.mediawiki_endpoint,
            &settings.user_agent,
            Duration::from_secs(settings.request_timeout),
        )?;
        let pages = WebPageScraper::new(factory, settings.timing.clone(), videos);

        Ok(Self {
            profiles,
            articles,
            pages,
        })
    }

    /// The setup problem that blocks profile runs, if any.
    pub fn profile_setup_error(&self) -> Option<&SetupError> {
        self.profiles.as_ref().err()
    }

    /// Classify raw input and run the matching scraper.
    pub async fn scrape(&self, raw: &str) -> Result<ExtractionReport, ScrapeError> {
        let target = ScrapeTarget::parse(raw)?;
        self.scrape_target(&target).await
    }

    pub async fn scrape_target(
        &self,
        target: &ScrapeTarget,
    ) -> Result<ExtractionReport, ScrapeError> {
        match target.kind() {
            TargetKind::SocialProfile => match &self.profiles {
                Ok(profiles) => profiles.scrape(target).await,
                Err(e) => Err(e.clone().into()),
            },
            TargetKind::EncyclopediaArticle => self.articles.scrape(target).await,
            TargetKind::GenericPage => self.pages.scrape(target).await,
        }
    }

    /// Scrape and convert to the typed record handed to the game.
    pub async fn enrich(&self, raw: &str) -> Result<ScrapedRecord, ScrapeError> {
        let report = self.scrape(raw).await?;
        Ok(ScrapedRecord::from(&report))
    }
}

/// Pause for a configured settle delay.
pub(crate) async fn settle(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}
