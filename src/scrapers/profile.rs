//! Social-profile scraper: sign in, open the profile, extract its sections.

use std::sync::Arc;

use tracing::info;

use super::auth::AuthFlow;
use super::extract::{extract_fields, FieldSpec};
use super::outcome::finalize;
use crate::browser::{BrowserSession, PageHandle, SessionFactory};
use crate::config::{ms, Credentials, Timing};
use crate::error::{DriverError, ScrapeError};
use crate::models::{ExtractionReport, ExtractionResult, ScrapeTarget, StageError};
use crate::recorder::VideoStore;

/// Stage tag for loading the profile after sign-in.
pub const PROFILE_NAVIGATION_STAGE: &str = "profile_navigation";

const PROFILE_NAVIGATION_CAUSES: &[&str] = &[
    "Profile is private",
    "Profile does not exist",
    "Profile URL is invalid",
    "Access denied",
];

/// Fields whose presence makes a profile run useful.
pub const PRIMARY_FIELDS: &[&str] = &["headline", "bio", "experience", "skills", "education"];

/// Profile sections, most stable selectors first.
pub const PROFILE_FIELDS: [FieldSpec; 5] = [
    FieldSpec::single(
        "headline",
        &[
            "div[data-test-id='topcard-title']",
            "h1[data-test-id='top-card-attestation-tests-profile-headline']",
            "h2.text-heading-xlarge.inline",
            "div.text-body-medium.break-words",
        ],
    ),
    FieldSpec::single(
        "bio",
        &[
            "div[data-test-id='about']",
            "p[data-test-id='about-section']",
            "div.inline-show-more-text div",
        ],
    ),
    FieldSpec::list(
        "experience",
        &[
            "li[data-test-id*='experience']",
            "section[data-section='experience'] li",
            "section#experience-section li",
        ],
        10,
    ),
    FieldSpec::list(
        "education",
        &[
            "li[data-test-id*='education']",
            "section[data-section='education'] li",
            "section#education-section li",
        ],
        8,
    ),
    FieldSpec::list(
        "skills",
        &[
            "li[data-test-id*='skill-item']",
            "section[data-section='skills'] li",
            "section.pv-profile-section.pv-skill-categories-section li",
        ],
        15,
    ),
];

/// Scrapes social profiles behind the identity-provider sign-in.
pub struct ProfileScraper {
    factory: Arc<dyn SessionFactory>,
    credentials: Credentials,
    timing: Timing,
    videos: VideoStore,
}

impl ProfileScraper {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        credentials: Credentials,
        timing: Timing,
        videos: VideoStore,
    ) -> Self {
        Self {
            factory,
            credentials,
            timing,
            videos,
        }
    }

    /// One full run in a fresh browser session.
    ///
    /// A failure during sign-in or while opening the profile aborts the run
    /// with that stage's error; the session is closed and its video stored
    /// either way.
    pub async fn scrape(&self, target: &ScrapeTarget) -> Result<ExtractionReport, ScrapeError> {
        let epoch = chrono::Utc::now().timestamp();
        info!("Scraping profile {}", target.identifier());

        let mut session = self.factory.open_session().await?;
        let mut result = ExtractionResult::new();
        let outcome = self.drive(session.as_mut(), target, &mut result).await;

        let raw = session.close().await;
        let video = self.videos.store(raw, target, epoch).await;
        if let Some(ref path) = video {
            info!("Video saved to {}", path);
        }

        if let Err(error) = outcome {
            return Err(ScrapeError::stage(error, video));
        }

        result.set_video(video);
        finalize(target.clone(), PRIMARY_FIELDS, result)
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        target: &ScrapeTarget,
        result: &mut ExtractionResult,
    ) -> Result<(), StageError> {
        AuthFlow::new(&self.credentials, &self.timing)
            .run(session)
            .await?;

        let url = target.identifier();
        info!("[Step 6/6] Navigating to profile: {}", url);
        let page = session.primary();
        load_profile(page, url, &self.timing)
            .await
            .map_err(|e| navigation_error(url, &e))?;

        extract_fields(page, &PROFILE_FIELDS, "profile", result).await;
        Ok(())
    }
}

async fn load_profile(page: &dyn PageHandle, url: &str, timing: &Timing) -> Result<(), DriverError> {
    let timeout = ms(timing.page_load_ms);
    page.navigate(url, timeout).await?;
    page.wait_ready(timeout).await?;
    page.scroll_to_bottom(ms(timing.scroll_idle_ms)).await
}

fn navigation_error(url: &str, cause: &DriverError) -> StageError {
    StageError::new(
        PROFILE_NAVIGATION_STAGE,
        format!("Failed to load profile page: {}", cause),
        format!("Navigate to profile URL: {}", url),
    )
    .with_step(6)
    .with_causes(PROFILE_NAVIGATION_CAUSES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::extract::Arity;

    #[test]
    fn test_profile_field_caps() {
        let caps: Vec<_> = PROFILE_FIELDS.iter().map(|f| (f.name, f.cap)).collect();
        assert_eq!(
            caps,
            vec![
                ("headline", None),
                ("bio", None),
                ("experience", Some(10)),
                ("education", Some(8)),
                ("skills", Some(15)),
            ]
        );
        assert!(PROFILE_FIELDS[..2].iter().all(|f| f.arity == Arity::Single));
    }

    #[test]
    fn test_navigation_error_shape() {
        let err = navigation_error(
            "https://www.linkedin.com/in/x",
            &DriverError::Navigation {
                url: "https://www.linkedin.com/in/x".into(),
                reason: "net::ERR_ABORTED".into(),
            },
        );
        assert_eq!(err.stage, "profile_navigation");
        assert_eq!(err.step, Some(6));
        assert_eq!(err.possible_causes.as_ref().map(Vec::len), Some(4));
        assert!(err.attempted_action.ends_with("/in/x"));
    }
}
