//! Generic web pages: load, scroll, extract the document outline.

use std::sync::Arc;

use tracing::info;

use super::extract::{extract_fields, FieldSpec};
use super::outcome::finalize;
use crate::browser::{PageHandle, SessionFactory};
use crate::config::{ms, Timing};
use crate::error::{DriverError, ScrapeError};
use crate::models::{ExtractionReport, ExtractionResult, ScrapeTarget, StageError};
use crate::recorder::VideoStore;

/// Fields whose presence makes a page run useful.
pub const PRIMARY_FIELDS: &[&str] = &["title", "headings", "paragraphs", "links"];

pub const PAGE_FIELDS: [FieldSpec; 4] = [
    FieldSpec::single("title", &["title"]),
    FieldSpec::list("headings", &["h1, h2, h3, h4, h5, h6"], 100),
    FieldSpec::list("paragraphs", &["p"], 200),
    FieldSpec::links("links", &["a[href]"], 200),
];

/// Scrapes arbitrary pages in a recorded browser session, without sign-in.
pub struct WebPageScraper {
    factory: Arc<dyn SessionFactory>,
    timing: Timing,
    videos: VideoStore,
}

impl WebPageScraper {
    pub fn new(factory: Arc<dyn SessionFactory>, timing: Timing, videos: VideoStore) -> Self {
        Self {
            factory,
            timing,
            videos,
        }
    }

    pub async fn scrape(&self, target: &ScrapeTarget) -> Result<ExtractionReport, ScrapeError> {
        let epoch = chrono::Utc::now().timestamp();
        let url = target.identifier();

        let mut session = self.factory.open_session().await?;
        let mut result = ExtractionResult::new();
        let outcome = self.drive(session.primary(), url, &mut result).await;

        let raw = session.close().await;
        let video = self.videos.store(raw, target, epoch).await;

        if let Err(error) = outcome {
            return Err(ScrapeError::stage(error, video));
        }

        result.set_video(video);
        finalize(target.clone(), PRIMARY_FIELDS, result)
    }

    async fn drive(
        &self,
        page: &dyn PageHandle,
        url: &str,
        result: &mut ExtractionResult,
    ) -> Result<(), StageError> {
        info!("[Step 1/3] Navigating to {}", url);
        let timeout = ms(self.timing.page_load_ms);
        let loaded: Result<(), DriverError> = async {
            page.navigate(url, timeout).await?;
            page.wait_ready(timeout).await
        }
        .await;
        loaded.map_err(|e| {
            StageError::new(
                "url_navigation",
                format!("Failed to navigate to URL: {}", e),
                format!("Navigate to {}", url),
            )
            .with_step(1)
        })?;

        info!("[Step 2/3] Scrolling to load all content");
        page.scroll_to_bottom(ms(self.timing.scroll_idle_ms))
            .await
            .map_err(|e| {
                StageError::new(
                    "content_loading",
                    format!("Failed to load content: {}", e),
                    "Scroll to the bottom and wait for lazy content",
                )
                .with_step(2)
            })?;

        info!("[Step 3/3] Extracting page content");
        extract_fields(page, &PAGE_FIELDS, "page", result).await;
        Ok(())
    }
}
