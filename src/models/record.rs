//! Typed records handed to the orchestration layer.
//!
//! A report's loose field map is turned into one variant per target kind so
//! downstream code can match on the shape instead of probing for fields.

use serde::{Deserialize, Serialize};

use super::result::{ExtractionReport, PageLink, RunStatus, StageError};
use super::target::TargetKind;

/// A social-network profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub url: String,
    pub headline: Option<String>,
    pub bio: Option<String>,
    pub experience: Vec<String>,
    pub skills: Vec<String>,
    pub education: Vec<String>,
}

/// An encyclopedia article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub content: Option<String>,
    pub intro: Option<String>,
    pub headings: Vec<String>,
    pub image_url: Option<String>,
    pub categories: Vec<String>,
}

/// Any other web page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: Option<String>,
    pub headings: Vec<String>,
    pub paragraphs: Vec<String>,
    pub links: Vec<PageLink>,
}

/// The record body, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    SocialProfile(ProfileRecord),
    EncyclopediaArticle(ArticleRecord),
    GenericPage(PageRecord),
}

/// An enriched record plus the run's diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    #[serde(flatten)]
    pub body: RecordBody,
    pub status: RunStatus,
    pub video_path: Option<String>,
    pub scraping_errors: Vec<StageError>,
}

impl From<&ExtractionReport> for ScrapedRecord {
    fn from(report: &ExtractionReport) -> Self {
        let result = &report.result;
        let owned_text = |name: &str| result.text(name).map(str::to_string);

        let body = match report.target.kind() {
            TargetKind::SocialProfile => RecordBody::SocialProfile(ProfileRecord {
                url: report.target.identifier().to_string(),
                headline: owned_text("headline"),
                bio: owned_text("bio"),
                experience: result.list("experience").to_vec(),
                skills: result.list("skills").to_vec(),
                education: result.list("education").to_vec(),
            }),
            TargetKind::EncyclopediaArticle => RecordBody::EncyclopediaArticle(ArticleRecord {
                title: owned_text("title")
                    .unwrap_or_else(|| report.target.identifier().to_string()),
                content: owned_text("content"),
                intro: owned_text("intro"),
                headings: result.list("headings").to_vec(),
                image_url: owned_text("image_url"),
                categories: result.list("categories").to_vec(),
            }),
            TargetKind::GenericPage => RecordBody::GenericPage(PageRecord {
                url: report.target.identifier().to_string(),
                title: owned_text("title"),
                headings: result.list("headings").to_vec(),
                paragraphs: result.list("paragraphs").to_vec(),
                links: result.links("links").to_vec(),
            }),
        };

        Self {
            body,
            status: report.status,
            video_path: result.video_path().map(str::to_string),
            scraping_errors: result.errors().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionResult, FieldValue, ScrapeTarget};

    #[test]
    fn profile_report_becomes_tagged_profile() {
        let mut result = ExtractionResult::new();
        result.set_field("headline", FieldValue::Text("Staff Engineer".into()));
        result.set_field("skills", FieldValue::List(vec!["Rust".into(), "Go".into()]));
        result.push_error(StageError::new("scraping_bio", "no bio", "Extract bio"));

        let report = ExtractionReport {
            target: ScrapeTarget::profile("jane-doe").unwrap(),
            status: RunStatus::Partial,
            result,
        };
        let record = ScrapedRecord::from(&report);

        let RecordBody::SocialProfile(profile) = &record.body else {
            panic!("expected a profile record");
        };
        assert_eq!(profile.headline.as_deref(), Some("Staff Engineer"));
        assert!(profile.bio.is_none());
        assert_eq!(profile.skills, vec!["Rust", "Go"]);
        assert_eq!(record.scraping_errors.len(), 1);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "social_profile");
        assert_eq!(json["status"], "partial");
    }

    #[test]
    fn article_title_falls_back_to_target() {
        let mut result = ExtractionResult::new();
        result.set_field("content", FieldValue::Text("Body".into()));
        let report = ExtractionReport {
            target: ScrapeTarget::article("Ada Lovelace").unwrap(),
            status: RunStatus::Partial,
            result,
        };

        let RecordBody::EncyclopediaArticle(article) = ScrapedRecord::from(&report).body else {
            panic!("expected an article record");
        };
        assert_eq!(article.title, "Ada Lovelace");
    }
}
