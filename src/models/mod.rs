//! Data models for scrape runs.

mod record;
mod result;
mod target;

pub use record::{ArticleRecord, PageRecord, ProfileRecord, RecordBody, ScrapedRecord};
pub use result::{
    ExtractionReport, ExtractionResult, FieldValue, PageLink, RunStatus, StageError,
};
pub use target::{
    is_article_url, validate_url, InvalidTarget, ScrapeTarget, TargetKind, PROFILE_BASE_URL,
};
