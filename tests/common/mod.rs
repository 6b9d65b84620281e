//! Scripted in-memory browser for driving scrapers without Chrome.
//!
//! Pages are plain HTML strings parsed with `scraper` on every query. The
//! login flow is simulated: submitting the email swaps the popup to a
//! password form, and submitting the right password moves the primary page
//! to a signed-in URL.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use roastbattle::browser::{BrowserSession, Locator, PageHandle, SessionFactory};
use roastbattle::config::{Secret, Settings, Timing};
use roastbattle::models::PageLink;
use roastbattle::scrapers::auth::{EMAIL_INPUT, LOGIN_URL, PASSWORD_INPUT};
use roastbattle::{DriverError, SetupError};

pub const EMAIL: &str = "player@example.com";
pub const PASSWORD: &str = "correct horse battery staple";
pub const SIGNED_IN_URL: &str = "https://www.linkedin.com/feed/";

pub const LOGIN_HTML: &str = r#"<html><body>
  <form><input type="text" name="session_key"></form>
  <button class="sign-in-google">Continue with Google</button>
</body></html>"#;

pub const EMAIL_FORM_HTML: &str =
    r#"<html><body><h1>Sign in</h1><input type="email" name="identifier"></body></html>"#;

pub const PASSWORD_FORM_HTML: &str =
    r#"<html><body><h1>Welcome</h1><input type="password" name="Passwd"></body></html>"#;

pub const WRONG_PASSWORD_HTML: &str = r#"<html><body>
  <p>Wrong password. Try again.</p><input type="password" name="Passwd">
</body></html>"#;

pub const FEED_HTML: &str = "<html><body><main>Feed</main></body></html>";

/// Ordered record of driver calls, shared by every page of a session.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

/// What the simulated sites serve and how they misbehave.
#[derive(Debug, Clone)]
pub struct StubSite {
    /// HTML served per URL; unknown URLs load an empty document.
    pub pages: HashMap<String, String>,
    /// HTML of the provider popup, or `None` when the click opens nothing.
    pub popup_html: Option<String>,
    /// URLs whose navigation fails outright.
    pub failing_urls: HashSet<String>,
    /// URLs whose navigation never commits.
    pub hanging_urls: HashSet<String>,
    /// The provider popup opens but never finishes loading.
    pub stalled_popup: bool,
    /// Delay before every navigation completes.
    pub navigation_delay: Duration,
    /// Bytes written as the session's raw recording, if any.
    pub recording: Option<Vec<u8>>,
    /// Where raw recordings are written.
    pub scratch_dir: PathBuf,
}

impl StubSite {
    /// A site where sign-in succeeds and the given profile HTML is served.
    pub fn linkedin(scratch_dir: &Path, profile_url: &str, profile_html: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert(LOGIN_URL.to_string(), LOGIN_HTML.to_string());
        pages.insert(SIGNED_IN_URL.to_string(), FEED_HTML.to_string());
        pages.insert(profile_url.to_string(), profile_html.to_string());

        Self {
            pages,
            popup_html: Some(EMAIL_FORM_HTML.to_string()),
            failing_urls: HashSet::new(),
            hanging_urls: HashSet::new(),
            stalled_popup: false,
            navigation_delay: Duration::ZERO,
            recording: Some(b"\xff\xd8frame\xff\xd9".to_vec()),
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    /// A site serving a single page at `url`.
    pub fn single_page(scratch_dir: &Path, url: &str, html: &str) -> Self {
        let mut pages = HashMap::new();
        pages.insert(url.to_string(), html.to_string());

        Self {
            pages,
            popup_html: None,
            failing_urls: HashSet::new(),
            hanging_urls: HashSet::new(),
            stalled_popup: false,
            navigation_delay: Duration::ZERO,
            recording: Some(b"\xff\xd8frame\xff\xd9".to_vec()),
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }
}

#[derive(Debug)]
struct PageState {
    url: String,
    html: String,
}

#[derive(Debug)]
struct SessionState {
    primary: PageState,
    popup: PageState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Primary,
    Popup,
}

/// One page of a stub session.
pub struct StubPage {
    role: Role,
    state: Arc<Mutex<SessionState>>,
    site: Arc<StubSite>,
    log: CallLog,
}

impl StubPage {
    fn label(&self) -> &'static str {
        match self.role {
            Role::Primary => "primary",
            Role::Popup => "popup",
        }
    }

    fn html(&self) -> String {
        let state = self.state.lock().unwrap();
        match self.role {
            Role::Primary => state.primary.html.clone(),
            Role::Popup => state.popup.html.clone(),
        }
    }

    fn set_page(&self, role: Role, url: &str, html: &str) {
        let mut state = self.state.lock().unwrap();
        let page = match role {
            Role::Primary => &mut state.primary,
            Role::Popup => &mut state.popup,
        };
        page.url = url.to_string();
        page.html = html.to_string();
    }
}

/// Text content of every element matching `selector`, honoring `:has-text`.
fn matching_texts(html: &str, selector: &str) -> Result<Vec<String>, DriverError> {
    let document = Html::parse_document(html);
    let matches = matching_elements(&document, selector)?;
    Ok(matches.iter().map(element_text).collect())
}

fn matching_links(html: &str, selector: &str) -> Result<Vec<PageLink>, DriverError> {
    let document = Html::parse_document(html);
    let matches = matching_elements(&document, selector)?;
    Ok(matches
        .iter()
        .map(|el| PageLink {
            text: element_text(el).trim().to_string(),
            href: el.value().attr("href").unwrap_or_default().to_string(),
        })
        .collect())
}

fn matching_elements<'a>(
    document: &'a Html,
    selector: &str,
) -> Result<Vec<ElementRef<'a>>, DriverError> {
    let locator = Locator::parse(selector);
    let css = Selector::parse(&locator.css)
        .map_err(|e| DriverError::Protocol(format!("bad selector {}: {:?}", selector, e)))?;
    Ok(document
        .select(&css)
        .filter(|el| locator.accepts_text(&element_text(el)))
        .collect())
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl PageHandle for StubPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.log.push(format!("navigate {}", url));
        if !self.site.navigation_delay.is_zero() {
            tokio::time::sleep(self.site.navigation_delay).await;
        }
        if self.site.failing_urls.contains(url) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        if self.site.hanging_urls.contains(url) {
            return Err(DriverError::timeout(format!("navigation to {}", url), timeout));
        }
        let html = self.site.pages.get(url).cloned().unwrap_or_default();
        self.set_page(self.role, url, &html);
        Ok(())
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), DriverError> {
        if self.role == Role::Popup && self.site.stalled_popup {
            self.log.push("wait_ready popup".to_string());
            return Err(DriverError::timeout("document ready", timeout));
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.log.push(format!("wait {} {}", self.label(), selector));
        if matching_texts(&self.html(), selector)?.is_empty() {
            return Err(DriverError::timeout(selector, timeout));
        }
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        Ok(!matching_texts(&self.html(), selector)?.is_empty())
    }

    async fn query_single(&self, selector: &str) -> Result<Option<String>, DriverError> {
        self.log.push(format!("query {}", selector));
        Ok(matching_texts(&self.html(), selector)?.into_iter().next())
    }

    async fn query_all(&self, selector: &str, limit: usize) -> Result<Vec<String>, DriverError> {
        self.log.push(format!("query {}", selector));
        let mut texts = matching_texts(&self.html(), selector)?;
        texts.truncate(limit);
        Ok(texts)
    }

    async fn query_links(
        &self,
        selector: &str,
        limit: usize,
    ) -> Result<Vec<PageLink>, DriverError> {
        self.log.push(format!("query {}", selector));
        let mut links = matching_links(&self.html(), selector)?;
        links.truncate(limit);
        Ok(links)
    }

    async fn fill_and_submit(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        self.log.push(format!("fill {} {}", self.label(), selector));
        if matching_texts(&self.html(), selector)?.is_empty() {
            return Err(DriverError::NotFound(selector.to_string()));
        }

        if self.role == Role::Popup && selector == EMAIL_INPUT {
            self.set_page(
                Role::Popup,
                "https://accounts.google.com/signin/challenge/pwd",
                PASSWORD_FORM_HTML,
            );
        } else if self.role == Role::Popup && selector == PASSWORD_INPUT {
            if text == PASSWORD {
                self.set_page(Role::Popup, "about:blank", "");
                let feed = self
                    .site
                    .pages
                    .get(SIGNED_IN_URL)
                    .cloned()
                    .unwrap_or_default();
                self.set_page(Role::Primary, SIGNED_IN_URL, &feed);
            } else {
                self.set_page(
                    Role::Popup,
                    "https://accounts.google.com/signin/challenge/pwd",
                    WRONG_PASSWORD_HTML,
                );
            }
        }
        Ok(())
    }

    async fn scroll_to_bottom(&self, _idle: Duration) -> Result<(), DriverError> {
        self.log.push(format!("scroll {}", self.label()));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let state = self.state.lock().unwrap();
        Ok(match self.role {
            Role::Primary => state.primary.url.clone(),
            Role::Popup => state.popup.url.clone(),
        })
    }
}

/// A stub session owning one primary page and any popups it opened.
pub struct StubSession {
    primary: StubPage,
    popups_opened: usize,
    closed: Arc<Mutex<bool>>,
}

#[async_trait]
impl BrowserSession for StubSession {
    fn primary(&self) -> &dyn PageHandle {
        &self.primary
    }

    async fn click_expecting_popup(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Box<dyn PageHandle>, DriverError> {
        self.primary.log.push(format!("click {}", selector));
        if matching_texts(&self.primary.html(), selector)?.is_empty() {
            return Err(DriverError::NotFound(selector.to_string()));
        }
        let html = self
            .primary
            .site
            .popup_html
            .clone()
            .ok_or_else(|| DriverError::timeout("popup window", timeout))?;
        self.primary.set_page(
            Role::Popup,
            "https://accounts.google.com/o/oauth2/auth",
            &html,
        );
        self.popups_opened += 1;

        Ok(Box::new(StubPage {
            role: Role::Popup,
            state: self.primary.state.clone(),
            site: self.primary.site.clone(),
            log: self.primary.log.clone(),
        }))
    }

    async fn close(self: Box<Self>) -> Option<PathBuf> {
        for _ in 0..self.popups_opened {
            self.primary.log.push("close popup".to_string());
        }
        self.primary.log.push("close".to_string());
        *self.closed.lock().unwrap() = true;

        let bytes = self.primary.site.recording.clone()?;
        std::fs::create_dir_all(&self.primary.site.scratch_dir).ok()?;
        let raw = self
            .primary
            .site
            .scratch_dir
            .join(format!("{}.mjpeg", uuid::Uuid::new_v4()));
        std::fs::write(&raw, bytes).ok()?;
        Some(raw)
    }
}

/// Opens stub sessions over one site and records what they did.
pub struct StubFactory {
    site: Arc<StubSite>,
    pub log: CallLog,
    pub closed: Arc<Mutex<bool>>,
    pub sessions_opened: Arc<Mutex<usize>>,
}

impl StubFactory {
    pub fn new(site: StubSite) -> Self {
        Self {
            site: Arc::new(site),
            log: CallLog::default(),
            closed: Arc::new(Mutex::new(false)),
            sessions_opened: Arc::new(Mutex::new(0)),
        }
    }

    pub fn was_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl SessionFactory for StubFactory {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, SetupError> {
        *self.sessions_opened.lock().unwrap() += 1;
        let blank = || PageState {
            url: "about:blank".to_string(),
            html: String::new(),
        };
        let state = Arc::new(Mutex::new(SessionState {
            primary: blank(),
            popup: blank(),
        }));

        Ok(Box::new(StubSession {
            primary: StubPage {
                role: Role::Primary,
                state,
                site: self.site.clone(),
                log: self.log.clone(),
            },
            popups_opened: 0,
            closed: self.closed.clone(),
        }))
    }
}

/// Short timeouts and no settle delays.
pub fn fast_timing() -> Timing {
    Timing {
        login_page_ms: 200,
        provider_button_ms: 200,
        provider_page_ms: 200,
        credential_input_ms: 200,
        redirect_ms: 300,
        page_load_ms: 200,
        scroll_idle_ms: 200,
        ..Timing::default()
    }
    .without_settle()
}

/// Settings rooted at `root` with valid credentials and fast timing.
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::with_working_root(root.to_path_buf());
    settings.timing = fast_timing();
    settings.scratch_dir = root.join("scratch");
    settings.linkedin_email = Some(EMAIL.to_string());
    settings.linkedin_password = Some(Secret::new(PASSWORD));
    settings
}
