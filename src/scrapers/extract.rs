//! Selector-fallback field extraction.

use tracing::{debug, info, warn};

use crate::browser::{PageHandle, RAW_QUERY_LIMIT};
use crate::models::{ExtractionResult, FieldValue, PageLink, StageError};

/// Longest link text kept for link-list fields.
pub const LINK_TEXT_LIMIT: usize = 100;

/// How many values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Single,
    List,
    LinkList,
}

/// A named field and the selectors to try for it, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub selectors: &'static [&'static str],
    pub arity: Arity,
    pub cap: Option<usize>,
}

impl FieldSpec {
    pub const fn single(name: &'static str, selectors: &'static [&'static str]) -> Self {
        Self {
            name,
            selectors,
            arity: Arity::Single,
            cap: None,
        }
    }

    pub const fn list(name: &'static str, selectors: &'static [&'static str], cap: usize) -> Self {
        Self {
            name,
            selectors,
            arity: Arity::List,
            cap: Some(cap),
        }
    }

    pub const fn links(name: &'static str, selectors: &'static [&'static str], cap: usize) -> Self {
        Self {
            name,
            selectors,
            arity: Arity::LinkList,
            cap: Some(cap),
        }
    }

    fn limit(&self) -> usize {
        self.cap.unwrap_or(RAW_QUERY_LIMIT)
    }
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run one field's selector chain against `page`.
///
/// Selectors are tried in order and the first one that yields anything wins;
/// later selectors are never evaluated. A driver error on a selector counts as
/// "no match" for that selector.
pub async fn extract_field(page: &dyn PageHandle, spec: &FieldSpec) -> Option<FieldValue> {
    for selector in spec.selectors {
        let value = match spec.arity {
            Arity::Single => single(page, spec, selector).await.map(FieldValue::Text),
            Arity::List => list(page, spec, selector).await.map(FieldValue::List),
            Arity::LinkList => links(page, spec, selector).await.map(FieldValue::Links),
        };
        if value.is_some() {
            debug!("{}: matched {}", spec.name, selector);
            return value;
        }
    }
    None
}

/// Extract every field into `result`.
///
/// A field that comes up empty leaves no value and appends exactly one
/// `scraping_<field>` error listing the whole selector chain.
pub async fn extract_fields(
    page: &dyn PageHandle,
    specs: &[FieldSpec],
    source: &str,
    result: &mut ExtractionResult,
) {
    for spec in specs {
        match extract_field(page, spec).await {
            Some(value) => {
                match &value {
                    FieldValue::Text(text) => {
                        info!("Found {}: {}", spec.name, preview(text))
                    }
                    FieldValue::List(items) => info!("Found {}: {} items", spec.name, items.len()),
                    FieldValue::Links(items) => info!("Found {}: {} links", spec.name, items.len()),
                }
                result.set_field(spec.name, value);
            }
            None => {
                warn!("{} not found", spec.name);
                result.push_error(
                    StageError::new(
                        format!("scraping_{}", spec.name),
                        format!("Could not extract {} from {}", spec.name, source),
                        format!(
                            "Extract {} using {} selector(s)",
                            spec.name,
                            spec.selectors.len()
                        ),
                    )
                    .with_selectors(spec.selectors),
                );
            }
        }
    }
}

async fn single(page: &dyn PageHandle, spec: &FieldSpec, selector: &str) -> Option<String> {
    match page.query_single(selector).await {
        Ok(Some(text)) => {
            let text = collapse_whitespace(&text);
            (!text.is_empty()).then_some(text)
        }
        Ok(None) => None,
        Err(e) => {
            debug!("{}: selector {} failed: {}", spec.name, selector, e);
            None
        }
    }
}

async fn list(page: &dyn PageHandle, spec: &FieldSpec, selector: &str) -> Option<Vec<String>> {
    let raw = match page.query_all(selector, RAW_QUERY_LIMIT).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("{}: selector {} failed: {}", spec.name, selector, e);
            return None;
        }
    };

    let limit = spec.limit();
    let mut collected: Vec<String> = Vec::new();
    for text in raw {
        let text = collapse_whitespace(&text);
        if text.is_empty() || collected.contains(&text) {
            continue;
        }
        collected.push(text);
        if collected.len() >= limit {
            break;
        }
    }

    (!collected.is_empty()).then_some(collected)
}

async fn links(page: &dyn PageHandle, spec: &FieldSpec, selector: &str) -> Option<Vec<PageLink>> {
    let raw = match page.query_links(selector, RAW_QUERY_LIMIT).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!("{}: selector {} failed: {}", spec.name, selector, e);
            return None;
        }
    };

    let limit = spec.limit();
    let mut collected: Vec<PageLink> = Vec::new();
    for link in raw {
        let href = link.href.trim().to_string();
        let text: String = collapse_whitespace(&link.text)
            .chars()
            .take(LINK_TEXT_LIMIT)
            .collect();
        if href.is_empty() || text.is_empty() {
            continue;
        }
        let link = PageLink { text, href };
        if collected.contains(&link) {
            continue;
        }
        collected.push(link);
        if collected.len() >= limit {
            break;
        }
    }

    (!collected.is_empty()).then_some(collected)
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(50).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Senior\n\n  Engineer\t at  X "), "Senior Engineer at X");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_spec_limits() {
        const SKILLS: FieldSpec = FieldSpec::list("skills", &["li"], 15);
        const TITLE: FieldSpec = FieldSpec::single("title", &["title"]);
        assert_eq!(SKILLS.limit(), 15);
        assert_eq!(TITLE.limit(), RAW_QUERY_LIMIT);
        assert_eq!(TITLE.arity, Arity::Single);
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "x".repeat(80);
        assert_eq!(preview(&long).len(), 53);
    }
}
