//! HTTP request handlers.

use std::collections::BTreeMap;
use std::future::Future;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::AppState;
use crate::error::ScrapeError;
use crate::models::{
    validate_url, ExtractionReport, FieldValue, RunStatus, ScrapedRecord, StageError, TargetKind,
};

/// Longest article text returned as a preview.
const CONTENT_PREVIEW_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub input: String,
}

/// Flattened scrape result for display.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub url: String,
    pub kind: TargetKind,
    pub title: Option<String>,
    pub content: BTreeMap<String, FieldValue>,
    pub video_path: Option<String>,
    pub scraping_errors: Vec<StageError>,
    pub status: RunStatus,
}

impl ScrapeResponse {
    pub fn from_report(url: &str, report: &ExtractionReport) -> Self {
        let kind = report.target.kind();
        let title_field = match kind {
            TargetKind::SocialProfile => "headline",
            TargetKind::EncyclopediaArticle | TargetKind::GenericPage => "title",
        };

        let mut content = BTreeMap::new();
        for (name, value) in report.result.fields() {
            if name == title_field {
                continue;
            }
            let (name, value) = match (kind, value) {
                (TargetKind::EncyclopediaArticle, FieldValue::Text(text)) if name == "content" => (
                    "content_preview".to_string(),
                    FieldValue::List(vec![text.chars().take(CONTENT_PREVIEW_LIMIT).collect()]),
                ),
                (_, FieldValue::Text(text)) => (name.clone(), FieldValue::List(vec![text.clone()])),
                (_, other) => (name.clone(), other.clone()),
            };
            content.insert(name, value);
        }

        Self {
            url: url.to_string(),
            kind,
            title: report.result.text(title_field).map(str::to_string),
            content,
            video_path: report.result.video_path().map(str::to_string),
            scraping_errors: report.result.errors().to_vec(),
            status: report.status,
        }
    }
}

/// A failed request, rendered as `{"detail": ...}` plus any stage context.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    stage_error: Option<StageError>,
    video_path: Option<String>,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
            stage_error: None,
            video_path: None,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
            stage_error: None,
            video_path: None,
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        let status = match &err {
            ScrapeError::Http(_) => StatusCode::BAD_GATEWAY,
            ScrapeError::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Scrape failed ({}): {}", status, err);

        let (stage_error, video_path) = match &err {
            ScrapeError::Stage(failure) => {
                (Some(failure.error.clone()), failure.video_path.clone())
            }
            _ => (None, None),
        };

        Self {
            status,
            detail: err.to_string(),
            stage_error,
            video_path,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({ "detail": self.detail });
        if let Some(stage_error) = self.stage_error {
            body["scraping_errors"] = serde_json::json!([stage_error]);
        }
        if let Some(video_path) = self.video_path {
            body["video_path"] = serde_json::json!(video_path);
        }
        (self.status, Json(body)).into_response()
    }
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Roast Battle API" }))
}

pub async fn health() -> &'static str {
    "ok"
}

/// Scrape a profile, article or page and return its content for display.
pub async fn scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    if !validate_url(&request.url) {
        return Err(ApiError::bad_request(
            "Invalid URL format. Please enter a valid URL starting with http:// or https://",
        ));
    }

    let scraper = state.scraper.clone();
    let url = request.url.clone();
    let report = detached(async move { scraper.scrape(&url).await }).await?;
    Ok(Json(ScrapeResponse::from_report(&request.url, &report)))
}

/// Enrich a player's input (URL, profile slug or article title) into a typed record.
pub async fn enrich(
    State(state): State<AppState>,
    Json(request): Json<EnrichRequest>,
) -> Result<Json<ScrapedRecord>, ApiError> {
    let scraper = state.scraper.clone();
    let record = detached(async move { scraper.enrich(&request.input).await }).await?;
    Ok(Json(record))
}

/// Run a scrape on its own task. Axum drops a handler whose client went
/// away; the run still closes its browser and stores its recording.
async fn detached<T, F>(run: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, ScrapeError>> + Send + 'static,
{
    match tokio::spawn(run).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::internal(format!("Scrape task failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionResult, PageLink, ScrapeTarget};

    #[test]
    fn test_article_response_uses_preview() {
        let mut result = ExtractionResult::new();
        result.set_field("title", FieldValue::Text("Ada Lovelace".into()));
        result.set_field("content", FieldValue::Text("x".repeat(900)));
        result.set_field("headings", FieldValue::List(vec!["Early life".into()]));
        let report = ExtractionReport {
            target: ScrapeTarget::article("Ada Lovelace").unwrap(),
            status: RunStatus::Complete,
            result,
        };

        let response = ScrapeResponse::from_report("https://en.wikipedia.org/wiki/Ada_Lovelace", &report);
        assert_eq!(response.title.as_deref(), Some("Ada Lovelace"));
        assert!(!response.content.contains_key("title"));
        let preview = response.content["content_preview"].as_list().unwrap();
        assert_eq!(preview[0].len(), CONTENT_PREVIEW_LIMIT);
    }

    #[test]
    fn test_page_response_keeps_links() {
        let mut result = ExtractionResult::new();
        result.set_field(
            "links",
            FieldValue::Links(vec![PageLink {
                text: "Docs".into(),
                href: "/docs".into(),
            }]),
        );
        let report = ExtractionReport {
            target: ScrapeTarget::generic("https://example.com").unwrap(),
            status: RunStatus::Partial,
            result,
        };

        let response = ScrapeResponse::from_report("https://example.com", &report);
        assert!(response.title.is_none());
        assert_eq!(response.content["links"].as_links().unwrap().len(), 1);
    }

    #[test]
    fn test_error_status_mapping() {
        let err = ApiError::from(ScrapeError::EmptyContent {
            target: "x".into(),
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(ScrapeError::from(
            crate::error::SetupError::MissingCredential("LI_PASSWORD"),
        ));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
