//! The accumulator a scrape run writes into, and the diagnostics it carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::target::ScrapeTarget;

/// Stage tag used when a caller supplies an empty one.
const UNTAGGED_STAGE: &str = "unknown";

/// An anchor pulled from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// A successfully extracted field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Links(Vec<PageLink>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Links(links) => links.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_links(&self) -> Option<&[PageLink]> {
        match self {
            Self::Links(links) => Some(links),
            _ => None,
        }
    }
}

/// A diagnostic record naming the pipeline stage that failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    pub message: String,
    pub attempted_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempted_selectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_causes: Option<Vec<String>>,
}

impl StageError {
    pub fn new(
        stage: impl Into<String>,
        message: impl Into<String>,
        attempted_action: impl Into<String>,
    ) -> Self {
        let stage = stage.into();
        Self {
            stage: if stage.trim().is_empty() {
                UNTAGGED_STAGE.to_string()
            } else {
                stage
            },
            step: None,
            message: message.into(),
            attempted_action: attempted_action.into(),
            attempted_selectors: None,
            possible_causes: None,
        }
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_selectors(mut self, selectors: &[&str]) -> Self {
        self.attempted_selectors = Some(selectors.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_causes(mut self, causes: &[&str]) -> Self {
        if !causes.is_empty() {
            self.possible_causes = Some(causes.iter().map(|s| s.to_string()).collect());
        }
        self
    }
}

/// Mutable accumulator for one scrape run.
///
/// Field values only ever get added; errors are append-only; the video
/// reference is set at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    fields: BTreeMap<String, FieldValue>,
    video_path: Option<String>,
    errors: Vec<StageError>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a field value. Empty values are dropped so a field is either
    /// absent or non-empty.
    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        if value.is_empty() {
            return;
        }
        self.fields.insert(name.to_string(), value);
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }

    pub fn list(&self, name: &str) -> &[String] {
        self.field(name).and_then(FieldValue::as_list).unwrap_or(&[])
    }

    pub fn links(&self, name: &str) -> &[PageLink] {
        self.field(name).and_then(FieldValue::as_links).unwrap_or(&[])
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn push_error(&mut self, error: StageError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[StageError] {
        &self.errors
    }

    /// Record the stored video reference. A second call is ignored.
    pub fn set_video(&mut self, path: Option<String>) {
        let Some(path) = path else {
            return;
        };
        if let Some(existing) = &self.video_path {
            warn!(
                "Ignoring second video reference {} (already have {})",
                path, existing
            );
            return;
        }
        self.video_path = Some(path);
    }

    pub fn video_path(&self) -> Option<&str> {
        self.video_path.as_deref()
    }
}

/// How a run that produced a result ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Data extracted and no stage reported a problem.
    Complete,
    /// Data extracted, but some fields are missing.
    Partial,
    /// Nothing extracted; the error trail explains why.
    SoftFailure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::SoftFailure => "soft_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::SoftFailure)
    }
}

/// A finished run: the target, its status and the accumulated result.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub target: ScrapeTarget,
    pub status: RunStatus,
    pub result: ExtractionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_not_stored() {
        let mut result = ExtractionResult::new();
        result.set_field("headline", FieldValue::Text(String::new()));
        result.set_field("skills", FieldValue::List(vec![]));
        assert!(result.is_empty());
        assert!(!result.has_value("headline"));
    }

    #[test]
    fn accessors_match_variant() {
        let mut result = ExtractionResult::new();
        result.set_field("headline", FieldValue::Text("Engineer".into()));
        result.set_field("skills", FieldValue::List(vec!["Rust".into()]));

        assert_eq!(result.text("headline"), Some("Engineer"));
        assert_eq!(result.list("skills"), ["Rust".to_string()]);
        assert!(result.text("skills").is_none());
        assert!(result.list("missing").is_empty());
        assert!(result.links("skills").is_empty());
    }

    #[test]
    fn video_is_set_at_most_once() {
        let mut result = ExtractionResult::new();
        result.set_video(None);
        assert!(result.video_path().is_none());

        result.set_video(Some("videos/a.mjpeg".into()));
        result.set_video(Some("videos/b.mjpeg".into()));
        assert_eq!(result.video_path(), Some("videos/a.mjpeg"));
    }

    #[test]
    fn stage_error_never_has_empty_stage() {
        let error = StageError::new("  ", "boom", "do a thing");
        assert_eq!(error.stage, "unknown");
    }

    #[test]
    fn stage_error_serializes_optional_fields_only_when_present() {
        let error = StageError::new("scraping_bio", "Could not extract bio", "Extract bio")
            .with_selectors(&["div.a", "div.b"]);
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["stage"], "scraping_bio");
        assert_eq!(json["attempted_selectors"][1], "div.b");
        assert!(json.get("step").is_none());
        assert!(json.get("possible_causes").is_none());
    }

    #[test]
    fn field_value_serializes_untagged() {
        let text = serde_json::to_value(FieldValue::Text("x".into())).unwrap();
        assert_eq!(text, serde_json::json!("x"));

        let links = serde_json::to_value(FieldValue::Links(vec![PageLink {
            text: "Home".into(),
            href: "/".into(),
        }]))
        .unwrap();
        assert_eq!(links, serde_json::json!([{"text": "Home", "href": "/"}]));
    }
}
