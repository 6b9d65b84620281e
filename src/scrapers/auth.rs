//! Sign-in through the identity-provider popup.
//!
//! The flow is strictly sequential. Each transition has its own stage tag,
//! step number and timeout, and the first failing transition ends the flow
//! with a single [`StageError`].

use tracing::{debug, info, warn};

use super::settle;
use crate::browser::{wait_for_url, BrowserSession, PageHandle};
use crate::config::{ms, Credentials, Timing};
use crate::error::DriverError;
use crate::models::StageError;

/// Login page of the target site.
pub const LOGIN_URL: &str = "https://www.linkedin.com/login";

/// Provider sign-in button, most specific first.
pub const PROVIDER_BUTTON_SELECTORS: &[&str] = &[
    r#"button:has-text("Continue with Google")"#,
    r#"[aria-label*="Google"]"#,
    r#"button:has-text("Google")"#,
];

pub const EMAIL_INPUT: &str = r#"input[type="email"]"#;
pub const PASSWORD_INPUT: &str = r#"input[type="password"]"#;

/// Where the flow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    LoginPageLoaded,
    ProviderButtonClicked,
    IdentityPageLoaded,
    CredentialsSubmitted,
    RedirectedToTargetSite,
    Authenticated,
    Failed(AuthStage),
}

/// A transition of the flow, named by the stage tag it reports on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    UrlNavigation,
    ProviderButtonDetection,
    ProviderPageLoad,
    ProviderAuthentication,
    TargetRedirect,
}

impl AuthStage {
    pub const ALL: [AuthStage; 5] = [
        Self::UrlNavigation,
        Self::ProviderButtonDetection,
        Self::ProviderPageLoad,
        Self::ProviderAuthentication,
        Self::TargetRedirect,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::UrlNavigation => "url_navigation",
            Self::ProviderButtonDetection => "google_button_detection",
            Self::ProviderPageLoad => "google_page_load",
            Self::ProviderAuthentication => "google_authentication",
            Self::TargetRedirect => "linkedin_redirect",
        }
    }

    pub fn step(&self) -> u32 {
        match self {
            Self::UrlNavigation => 1,
            Self::ProviderButtonDetection => 2,
            Self::ProviderPageLoad => 3,
            Self::ProviderAuthentication => 4,
            Self::TargetRedirect => 5,
        }
    }

    /// Whether `tag` names one of the sign-in stages.
    pub fn is_auth_tag(tag: &str) -> bool {
        Self::ALL.iter().any(|stage| stage.tag() == tag)
    }

    fn failure(&self) -> &'static str {
        match self {
            Self::UrlNavigation => "Failed to navigate to LinkedIn login page",
            Self::ProviderButtonDetection => "Failed to find or click Google sign-in button",
            Self::ProviderPageLoad => "Failed to load Google authentication page",
            Self::ProviderAuthentication => "Failed during Google authentication",
            Self::TargetRedirect => "Failed to redirect back to LinkedIn after Google auth",
        }
    }

    fn attempted_action(&self) -> &'static str {
        match self {
            Self::UrlNavigation => "Navigate to https://www.linkedin.com/login",
            Self::ProviderButtonDetection => "Find and click 'Continue with Google' button",
            Self::ProviderPageLoad => "Wait for Google authentication page to load",
            Self::ProviderAuthentication => "Enter Google credentials and authenticate",
            Self::TargetRedirect => "Wait for redirect to LinkedIn after Google authentication",
        }
    }

    fn possible_causes(&self) -> &'static [&'static str] {
        match self {
            Self::TargetRedirect => &["Authentication failed", "Network timeout", "2FA required"],
            _ => &[],
        }
    }

    fn error(&self, cause: &DriverError) -> StageError {
        let mut error = StageError::new(
            self.tag(),
            format!("{}: {}", self.failure(), cause),
            self.attempted_action(),
        )
        .with_step(self.step())
        .with_causes(self.possible_causes());
        if *self == Self::ProviderButtonDetection {
            error = error.with_selectors(PROVIDER_BUTTON_SELECTORS);
        }
        error
    }
}

/// True once the primary page is back on the target site and past sign-in.
///
/// A `/checkpoint` URL is a verification challenge, not a session.
pub fn is_signed_in_url(url: &str) -> bool {
    url.contains("linkedin.com")
        && !url.contains("/login")
        && !url.contains("/uas/login")
        && !url.contains("/checkpoint")
}

/// One sign-in attempt for one run.
pub struct AuthFlow<'a> {
    credentials: &'a Credentials,
    timing: &'a Timing,
    state: AuthState,
    popup: Option<Box<dyn PageHandle>>,
}

impl<'a> AuthFlow<'a> {
    pub fn new(credentials: &'a Credentials, timing: &'a Timing) -> Self {
        Self {
            credentials,
            timing,
            state: AuthState::Init,
            popup: None,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Drive the session from the login page to an authenticated primary page.
    pub async fn run(&mut self, session: &mut dyn BrowserSession) -> Result<(), StageError> {
        let timing = self.timing;

        let stage = AuthStage::UrlNavigation;
        info!("[Step 1/6] Navigating to login page");
        self.attempt(stage, load_login_page(session.primary(), timing))
            .await?;
        self.state = AuthState::LoginPageLoaded;

        let stage = AuthStage::ProviderButtonDetection;
        info!("[Step 2/6] Looking for 'Continue with Google' button");
        let popup = self
            .attempt(stage, open_provider_popup(session, timing))
            .await?;
        self.state = AuthState::ProviderButtonClicked;
        let popup = self.popup.insert(popup);

        let stage = AuthStage::ProviderPageLoad;
        info!("[Step 3/6] Waiting for Google authentication page");
        let result = wait_provider_page(&**popup, timing).await;
        self.check(stage, result)?;
        self.state = AuthState::IdentityPageLoaded;

        let stage = AuthStage::ProviderAuthentication;
        info!("[Step 4/6] Entering Google credentials");
        let result = self.submit_credentials().await;
        self.check(stage, result)?;
        self.state = AuthState::CredentialsSubmitted;

        let stage = AuthStage::TargetRedirect;
        info!("[Step 5/6] Waiting for LinkedIn authentication to complete");
        self.attempt(stage, wait_redirect(session.primary(), timing))
            .await?;
        self.state = AuthState::RedirectedToTargetSite;

        // The popup is done once the provider has redirected back.
        self.popup = None;
        self.state = AuthState::Authenticated;
        info!("Authenticated");
        Ok(())
    }

    async fn attempt<T>(
        &mut self,
        stage: AuthStage,
        step: impl std::future::Future<Output = Result<T, DriverError>>,
    ) -> Result<T, StageError> {
        let result = step.await;
        self.check(stage, result)
    }

    fn check<T>(&mut self, stage: AuthStage, result: Result<T, DriverError>) -> Result<T, StageError> {
        result.map_err(|e| {
            warn!("{} (stage {})", e, stage.tag());
            self.state = AuthState::Failed(stage);
            self.popup = None;
            stage.error(&e)
        })
    }

    async fn submit_credentials(&self) -> Result<(), DriverError> {
        let popup = self
            .popup
            .as_deref()
            .ok_or_else(|| DriverError::NotFound("provider popup".to_string()))?;
        let input_timeout = ms(self.timing.credential_input_ms);

        popup.wait_for_selector(EMAIL_INPUT, input_timeout).await?;
        settle(self.timing.input_settle_ms).await;
        popup
            .fill_and_submit(EMAIL_INPUT, &self.credentials.email)
            .await?;
        debug!("Email submitted");
        settle(self.timing.step_settle_ms).await;

        popup.wait_for_selector(PASSWORD_INPUT, input_timeout).await?;
        settle(self.timing.input_settle_ms).await;
        popup
            .fill_and_submit(PASSWORD_INPUT, self.credentials.password.expose())
            .await?;
        debug!("Password submitted");
        settle(self.timing.submit_settle_ms).await;

        Ok(())
    }
}

async fn load_login_page(page: &dyn PageHandle, timing: &Timing) -> Result<(), DriverError> {
    let timeout = ms(timing.login_page_ms);
    page.navigate(LOGIN_URL, timeout).await?;
    page.wait_ready(timeout).await
}

async fn open_provider_popup(
    session: &mut dyn BrowserSession,
    timing: &Timing,
) -> Result<Box<dyn PageHandle>, DriverError> {
    let timeout = ms(timing.provider_button_ms);
    let selector = {
        let primary = session.primary();
        primary.wait_ready(timeout).await?;
        settle(timing.input_settle_ms).await;
        first_visible(primary, PROVIDER_BUTTON_SELECTORS)
            .await
            .ok_or_else(|| {
                DriverError::NotFound("'Continue with Google' button".to_string())
            })?
    };
    debug!("Clicking provider button {}", selector);
    session.click_expecting_popup(selector, timeout).await
}

async fn wait_provider_page(popup: &dyn PageHandle, timing: &Timing) -> Result<(), DriverError> {
    popup.wait_ready(ms(timing.provider_page_ms)).await?;
    settle(timing.step_settle_ms).await;
    Ok(())
}

async fn wait_redirect(page: &dyn PageHandle, timing: &Timing) -> Result<(), DriverError> {
    let timeout = ms(timing.redirect_ms);
    let url = wait_for_url(page, is_signed_in_url, "redirect to LinkedIn", timeout).await?;
    debug!("Back on {}", url);
    page.wait_ready(timeout).await?;
    settle(timing.step_settle_ms).await;
    Ok(())
}

async fn first_visible(page: &dyn PageHandle, selectors: &[&'static str]) -> Option<&'static str> {
    for selector in selectors {
        match page.is_visible(selector).await {
            Ok(true) => return Some(*selector),
            Ok(false) => {}
            Err(e) => debug!("Visibility check for {} failed: {}", selector, e),
        }
    }
    None
}
