//! Scrape targets: what a run is pointed at and how it is named on disk.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Base URL used to expand bare profile identifiers.
pub const PROFILE_BASE_URL: &str = "https://www.linkedin.com/in/";

static URL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+\..+").expect("static regex"));

/// The kind of page a target points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    SocialProfile,
    EncyclopediaArticle,
    GenericPage,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SocialProfile => "social_profile",
            Self::EncyclopediaArticle => "encyclopedia_article",
            Self::GenericPage => "generic_page",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "social_profile" | "profile" => Some(Self::SocialProfile),
            "encyclopedia_article" | "article" => Some(Self::EncyclopediaArticle),
            "generic_page" | "page" => Some(Self::GenericPage),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why raw input could not be turned into a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {input:?}")]
pub struct InvalidTarget {
    pub input: String,
    pub reason: &'static str,
}

impl InvalidTarget {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A normalized, immutable scrape target.
///
/// Profiles and generic pages are identified by a canonical absolute URL
/// (query string, fragment and trailing slashes removed). Articles are
/// identified by their title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeTarget {
    identifier: String,
    kind: TargetKind,
}

impl ScrapeTarget {
    /// Classify raw caller input and normalize it.
    ///
    /// Anything mentioning `wikipedia.org` is an article, anything mentioning
    /// `linkedin.com` (or a bare identifier like `jane-doe`) is a profile, and
    /// any other well-formed http(s) URL is a generic page.
    pub fn parse(raw: &str) -> Result<Self, InvalidTarget> {
        let trimmed = raw.trim();
        let lower = trimmed.to_lowercase();

        if lower.contains("wikipedia.org") {
            Self::article(trimmed)
        } else if lower.contains("linkedin.com") || is_bare_identifier(trimmed) {
            Self::profile(trimmed)
        } else if has_http_scheme(&lower) {
            Self::generic(trimmed)
        } else {
            Err(InvalidTarget::new(raw, "not a profile, article or page URL"))
        }
    }

    /// Build a social-profile target from a URL or bare profile slug.
    pub fn profile(raw: &str) -> Result<Self, InvalidTarget> {
        let cleaned = strip_decorations(raw);
        if cleaned.is_empty() {
            return Err(InvalidTarget::new(raw, "empty profile identifier"));
        }

        let lower = cleaned.to_ascii_lowercase();
        let identifier = if has_http_scheme(&lower) {
            Url::parse(cleaned).map_err(|_| InvalidTarget::new(raw, "malformed profile URL"))?;
            cleaned.to_string()
        } else if lower.contains("linkedin.com/") {
            let absolute = format!("https://{}", cleaned);
            Url::parse(&absolute).map_err(|_| InvalidTarget::new(raw, "malformed profile URL"))?;
            absolute
        } else {
            let slug = cleaned.trim_start_matches("in/").trim_matches('/');
            if slug.is_empty() {
                return Err(InvalidTarget::new(raw, "empty profile identifier"));
            }
            format!("{}{}", PROFILE_BASE_URL, slug)
        };

        Ok(Self {
            identifier,
            kind: TargetKind::SocialProfile,
        })
    }

    /// Build an article target from an article URL or a bare title.
    pub fn article(raw: &str) -> Result<Self, InvalidTarget> {
        let trimmed = raw.trim();
        let title = if has_http_scheme(&trimmed.to_ascii_lowercase()) {
            let cleaned = strip_decorations(trimmed);
            let segment = cleaned
                .split_once("/wiki/")
                .map(|(_, rest)| rest)
                .ok_or_else(|| InvalidTarget::new(raw, "article URL has no /wiki/ path"))?;
            urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string())
        } else {
            trimmed.to_string()
        };

        let title = title.replace('_', " ").trim().to_string();
        if title.is_empty() {
            return Err(InvalidTarget::new(raw, "could not extract article title"));
        }

        Ok(Self {
            identifier: title,
            kind: TargetKind::EncyclopediaArticle,
        })
    }

    /// Build a generic-page target; only absolute http(s) URLs with a host are accepted.
    pub fn generic(raw: &str) -> Result<Self, InvalidTarget> {
        let cleaned = strip_decorations(raw);
        if !validate_url(cleaned) {
            return Err(InvalidTarget::new(
                raw,
                "URL must start with http:// or https://",
            ));
        }
        let parsed = Url::parse(cleaned).map_err(|_| InvalidTarget::new(raw, "malformed URL"))?;
        if parsed.host_str().is_none() {
            return Err(InvalidTarget::new(raw, "URL has no host"));
        }

        Ok(Self {
            identifier: cleaned.to_string(),
            kind: TargetKind::GenericPage,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// Filesystem-safe short name used in artifact filenames.
    ///
    /// Profiles use the path after `/in/`, pages use the host with dots
    /// replaced, articles use the title.
    pub fn slug(&self) -> String {
        let raw = match self.kind {
            TargetKind::SocialProfile => self
                .identifier
                .rsplit_once("/in/")
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_else(|| self.identifier.clone()),
            TargetKind::GenericPage => Url::parse(&self.identifier)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.replace('.', "_")))
                .unwrap_or_else(|| self.identifier.clone()),
            TargetKind::EncyclopediaArticle => self.identifier.clone(),
        };
        sanitize_filename_part(&raw)
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identifier)
    }
}

/// Check that a URL has the basic `http(s)://host.tld` shape.
pub fn validate_url(url: &str) -> bool {
    URL_SHAPE.is_match(url)
}

/// Check if a URL is a Wikipedia article URL.
pub fn is_article_url(url: &str) -> bool {
    (url.starts_with("https://") || url.starts_with("http://"))
        && url.contains("wikipedia.org")
        && url.contains("/wiki/")
}

fn has_http_scheme(lower: &str) -> bool {
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn strip_decorations(raw: &str) -> &str {
    let trimmed = raw.trim();
    let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
    trimmed[..end].trim_end_matches('/')
}

fn is_bare_identifier(raw: &str) -> bool {
    !raw.is_empty()
        && !raw.contains("://")
        && !raw.contains('.')
        && !raw.chars().any(char::is_whitespace)
        && raw.trim_start_matches("in/").chars().all(|c| c != '/')
}

fn sanitize_filename_part(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "target".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_is_cleaned() {
        let target =
            ScrapeTarget::profile("https://www.linkedin.com/in/jane-doe/?trk=public_profile").unwrap();
        assert_eq!(target.identifier(), "https://www.linkedin.com/in/jane-doe");
        assert_eq!(target.kind(), TargetKind::SocialProfile);
        assert_eq!(target.slug(), "jane-doe");
    }

    #[test]
    fn bare_profile_slug_is_expanded() {
        let target = ScrapeTarget::profile("jane-doe").unwrap();
        assert_eq!(target.identifier(), "https://www.linkedin.com/in/jane-doe");
    }

    #[test]
    fn bare_slug_starting_with_http_is_not_a_url() {
        let target = ScrapeTarget::parse("httpster").unwrap();
        assert_eq!(target.kind(), TargetKind::SocialProfile);
        assert_eq!(target.identifier(), "https://www.linkedin.com/in/httpster");
        assert_eq!(target.slug(), "httpster");
    }

    #[test]
    fn scheme_less_profile_url_gets_https() {
        let target = ScrapeTarget::parse("www.linkedin.com/in/jane-doe/").unwrap();
        assert_eq!(target.identifier(), "https://www.linkedin.com/in/jane-doe");
        assert_eq!(target.slug(), "jane-doe");

        let target = ScrapeTarget::profile("linkedin.com/in/jane-doe?trk=x").unwrap();
        assert_eq!(target.identifier(), "https://linkedin.com/in/jane-doe");
    }

    #[test]
    fn profile_scheme_is_case_insensitive() {
        let target = ScrapeTarget::profile("HTTPS://www.linkedin.com/in/jane-doe").unwrap();
        assert_eq!(target.kind(), TargetKind::SocialProfile);
        assert_eq!(target.slug(), "jane-doe");
    }

    #[test]
    fn nested_profile_path_slug_flattens_slashes() {
        let target = ScrapeTarget::profile("https://www.linkedin.com/in/jane-doe/details").unwrap();
        assert_eq!(target.slug(), "jane-doe_details");
    }

    #[test]
    fn article_title_from_url() {
        let target = ScrapeTarget::article("https://en.wikipedia.org/wiki/Ada_Lovelace").unwrap();
        assert_eq!(target.identifier(), "Ada Lovelace");
        assert_eq!(target.kind(), TargetKind::EncyclopediaArticle);
        assert_eq!(target.slug(), "Ada_Lovelace");
    }

    #[test]
    fn article_title_is_percent_decoded() {
        let target =
            ScrapeTarget::article("https://en.wikipedia.org/wiki/Caf%C3%A9_society?oldid=1").unwrap();
        assert_eq!(target.identifier(), "Café society");
    }

    #[test]
    fn article_url_without_wiki_path_is_rejected() {
        assert!(ScrapeTarget::article("https://en.wikipedia.org/").is_err());
    }

    #[test]
    fn generic_page_slug_uses_host() {
        let target = ScrapeTarget::generic("https://blog.example.com/post/1/").unwrap();
        assert_eq!(target.identifier(), "https://blog.example.com/post/1");
        assert_eq!(target.slug(), "blog_example_com");
    }

    #[test]
    fn parse_classifies_by_host() {
        assert_eq!(
            ScrapeTarget::parse("https://en.wikipedia.org/wiki/Rust").unwrap().kind(),
            TargetKind::EncyclopediaArticle
        );
        assert_eq!(
            ScrapeTarget::parse("https://www.linkedin.com/in/someone").unwrap().kind(),
            TargetKind::SocialProfile
        );
        assert_eq!(
            ScrapeTarget::parse("someone").unwrap().kind(),
            TargetKind::SocialProfile
        );
        assert_eq!(
            ScrapeTarget::parse("https://example.com").unwrap().kind(),
            TargetKind::GenericPage
        );
        assert!(ScrapeTarget::parse("not a url at all").is_err());
        assert!(ScrapeTarget::parse("ftp.example.com/file").is_err());
    }

    #[test]
    fn validate_url_requires_scheme_and_dot() {
        assert!(validate_url("https://example.com"));
        assert!(validate_url("http://a.b/c"));
        assert!(!validate_url("example.com"));
        assert!(!validate_url("https://localhost"));
    }

    #[test]
    fn article_url_detection() {
        assert!(is_article_url("https://en.wikipedia.org/wiki/Rust"));
        assert!(!is_article_url("https://en.wikipedia.org/"));
        assert!(!is_article_url("en.wikipedia.org/wiki/Rust"));
    }

    #[test]
    fn target_kind_round_trips_through_str() {
        for kind in [
            TargetKind::SocialProfile,
            TargetKind::EncyclopediaArticle,
            TargetKind::GenericPage,
        ] {
            assert_eq!(TargetKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
