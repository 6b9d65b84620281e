//! Encyclopedia articles via the MediaWiki query API.
//!
//! No browser, sign-in or recording is involved; the run is a single API call.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::outcome::finalize;
use crate::error::{ScrapeError, SetupError};
use crate::models::{ExtractionReport, ExtractionResult, FieldValue, ScrapeTarget, StageError};

/// Fields whose presence makes an article run useful.
pub const PRIMARY_FIELDS: &[&str] = &["title", "content", "intro", "headings"];

/// Longest intro kept before truncating.
pub const INTRO_LIMIT: usize = 500;

/// Most section headings kept.
pub const HEADING_LIMIT: usize = 15;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    query: Option<ApiQuery>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    #[serde(default)]
    pages: BTreeMap<String, ApiPage>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPage {
    title: Option<String>,
    extract: Option<String>,
    missing: Option<serde_json::Value>,
    original: Option<ApiImage>,
    thumbnail: Option<ApiImage>,
    #[serde(default)]
    categories: Vec<ApiCategory>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ApiCategory {
    title: String,
}

/// Fetches articles from a MediaWiki endpoint.
pub struct ArticleScraper {
    client: Client,
    endpoint: String,
}

impl ArticleScraper {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self, SetupError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| SetupError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub async fn scrape(&self, target: &ScrapeTarget) -> Result<ExtractionReport, ScrapeError> {
        let title = target.identifier();
        info!("Fetching article {}", title);

        let response: ApiResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("titles", title),
                ("prop", "extracts|pageimages|categories"),
                ("explaintext", "1"),
                ("piprop", "original"),
                ("pithumbsize", "400"),
                ("cllimit", "50"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let page = select_page(response, title)?;
        let result = build_result(page);
        finalize(target.clone(), PRIMARY_FIELDS, result)
    }
}

fn select_page(response: ApiResponse, title: &str) -> Result<ApiPage, ScrapeError> {
    let page = response
        .query
        .and_then(|q| q.pages.into_values().next())
        .ok_or_else(|| ScrapeError::Article(format!("Article not found: {}", title)))?;

    if page.missing.is_some() {
        return Err(ScrapeError::Article(format!(
            "Article does not exist: {}",
            title
        )));
    }
    Ok(page)
}

fn build_result(page: ApiPage) -> ExtractionResult {
    let mut result = ExtractionResult::new();

    match page.title.filter(|t| !t.trim().is_empty()) {
        Some(title) => result.set_field("title", FieldValue::Text(title)),
        None => result.push_error(missing_field("title")),
    }

    let content = page.extract.unwrap_or_default();
    if content.trim().is_empty() {
        result.push_error(missing_field("content"));
    } else {
        if let Some(intro) = extract_intro(&content) {
            result.set_field("intro", FieldValue::Text(intro));
        }
        result.set_field("headings", FieldValue::List(extract_headings(&content)));
        result.set_field("content", FieldValue::Text(content));
    }

    if let Some(image) = page.original.or(page.thumbnail) {
        result.set_field("image_url", FieldValue::Text(image.source));
    }

    let categories: Vec<String> = page
        .categories
        .into_iter()
        .map(|c| c.title.trim_start_matches("Category:").to_string())
        .collect();
    debug!("{} categories", categories.len());
    result.set_field("categories", FieldValue::List(categories));

    result
}

fn missing_field(field: &str) -> StageError {
    StageError::new(
        format!("scraping_{}", field),
        format!("Could not extract {} from article", field),
        "Query the MediaWiki API",
    )
}

/// The lead section: everything before the first blank line, capped at
/// [`INTRO_LIMIT`] characters.
pub fn extract_intro(content: &str) -> Option<String> {
    let first = content.split("\n\n").next()?.trim();
    if first.is_empty() {
        return None;
    }
    if first.chars().count() > INTRO_LIMIT {
        let mut intro: String = first.chars().take(INTRO_LIMIT).collect();
        intro.push_str("...");
        Some(intro)
    } else {
        Some(first.to_string())
    }
}

/// Section headings from plain-text `== Heading ==` lines.
pub fn extract_headings(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("==") && line.ends_with("=="))
        .map(|line| line.trim_matches(|c| c == '=' || c == ' ').to_string())
        .filter(|heading| !heading.is_empty())
        .take(HEADING_LIMIT)
        .collect()
}
