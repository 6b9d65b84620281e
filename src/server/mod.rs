//! HTTP surface for the game front end.
//!
//! Exposes scraping as JSON endpoints and serves stored session recordings
//! under `/videos`.

mod handlers;
mod routes;

pub use handlers::{ScrapeRequest, ScrapeResponse};
pub use routes::create_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::recorder::relative_reference;
use crate::scrapers::Scraper;

/// Default port when a bind address names only a host.
const DEFAULT_PORT: u16 = 8000;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub scraper: Arc<Scraper>,
    pub videos_dir: PathBuf,
    /// The videos directory relative to the working root. Stored recording
    /// references start with it, so it is served there as well as at `/videos`.
    pub videos_reference: Option<String>,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let scraper = Scraper::from_settings(settings)?;
        Ok(Self::with_scraper(scraper, settings))
    }

    pub fn with_scraper(scraper: Scraper, settings: &Settings) -> Self {
        Self {
            scraper: Arc::new(scraper),
            videos_dir: settings.videos_dir.clone(),
            videos_reference: relative_reference(&settings.videos_dir, &settings.working_root),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    if let Some(e) = state.scraper.profile_setup_error() {
        tracing::warn!("Profile scraping disabled: {}", e);
    }
    if state.videos_reference.is_none() {
        tracing::warn!(
            "Videos directory {} is outside the working root {}; recordings will not be stored",
            settings.videos_dir.display(),
            settings.working_root.display()
        );
    }
    std::fs::create_dir_all(&state.videos_dir)?;

    let app = create_router(state);

    let (host, port) = parse_bind_address(bind);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse a bind address that can be:
/// - Just a port: "8000" -> 127.0.0.1:8000
/// - Just a host: "0.0.0.0" -> 0.0.0.0:8000
/// - Host and port: "0.0.0.0:8000" -> 0.0.0.0:8000
pub fn parse_bind_address(bind: &str) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return ("127.0.0.1".to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), DEFAULT_PORT)
}
