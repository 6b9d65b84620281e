//! Deciding how a finished run is reported.

use tracing::{info, warn};

use crate::error::ScrapeError;
use crate::models::{ExtractionReport, ExtractionResult, RunStatus, ScrapeTarget};

/// Apply the success / partial / soft-failure / hard-failure policy.
///
/// `primary_fields` are the fields whose presence makes a run useful. A run
/// with none of them is a soft failure when its error log explains why, and a
/// hard failure when it does not: an empty result with an empty log is never
/// reported as success.
pub fn finalize(
    target: ScrapeTarget,
    primary_fields: &[&str],
    result: ExtractionResult,
) -> Result<ExtractionReport, ScrapeError> {
    let has_data = primary_fields.iter().any(|name| result.has_value(name));
    let has_errors = !result.errors().is_empty();

    let status = match (has_data, has_errors) {
        (true, false) => RunStatus::Complete,
        (true, true) => RunStatus::Partial,
        (false, true) => RunStatus::SoftFailure,
        (false, false) => {
            warn!("{} produced no data and no errors", target);
            return Err(ScrapeError::EmptyContent {
                target: target.identifier().to_string(),
            });
        }
    };

    info!(
        "{} finished: {} ({} error(s))",
        target,
        status.as_str(),
        result.errors().len()
    );

    Ok(ExtractionReport {
        target,
        status,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, StageError};

    const PRIMARY: &[&str] = &["headline", "bio"];

    fn target() -> ScrapeTarget {
        ScrapeTarget::profile("jane-doe").unwrap()
    }

    #[test]
    fn test_data_without_errors_is_complete() {
        let mut result = ExtractionResult::new();
        result.set_field("headline", FieldValue::Text("Engineer".into()));
        let report = finalize(target(), PRIMARY, result).unwrap();
        assert_eq!(report.status, RunStatus::Complete);
    }

    #[test]
    fn test_data_with_errors_is_partial() {
        let mut result = ExtractionResult::new();
        result.set_field("bio", FieldValue::Text("Hi".into()));
        result.push_error(StageError::new("scraping_headline", "missing", "Extract"));
        let report = finalize(target(), PRIMARY, result).unwrap();
        assert_eq!(report.status, RunStatus::Partial);
        assert!(report.status.is_success());
    }

    #[test]
    fn test_errors_without_data_is_soft_failure() {
        let mut result = ExtractionResult::new();
        result.push_error(StageError::new("scraping_headline", "missing", "Extract"));
        let report = finalize(target(), PRIMARY, result).unwrap();
        assert_eq!(report.status, RunStatus::SoftFailure);
        assert!(report.result.is_empty());
        assert_eq!(report.result.errors().len(), 1);
    }

    #[test]
    fn test_no_data_and_no_errors_is_hard_failure() {
        let err = finalize(target(), PRIMARY, ExtractionResult::new()).unwrap_err();
        assert!(matches!(err, ScrapeError::EmptyContent { .. }));
        assert!(err.to_string().contains("jane-doe"));
    }

    #[test]
    fn test_non_primary_data_does_not_count() {
        let mut result = ExtractionResult::new();
        result.set_field("image_url", FieldValue::Text("https://x/y.png".into()));
        let err = finalize(target(), PRIMARY, result).unwrap_err();
        assert!(matches!(err, ScrapeError::EmptyContent { .. }));
    }
}
