//! Selector strings with an optional text filter.
//!
//! Plain CSS selectors pass through untouched. A trailing
//! `:has-text("...")` narrows the match to elements whose rendered text
//! contains the given string, e.g. `button:has-text("Continue with Google")`.

const HAS_TEXT: &str = ":has-text(";

/// A parsed selector: the CSS part plus an optional required substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub text: Option<String>,
}

impl Locator {
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if let Some(start) = selector.rfind(HAS_TEXT) {
            if let Some(inner) = selector[start + HAS_TEXT.len()..].strip_suffix(')') {
                let text = inner.trim().trim_matches(|c| c == '"' || c == '\'');
                let css = selector[..start].trim();
                return Self {
                    css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                    text: Some(text.to_string()),
                };
            }
        }
        Self {
            css: selector.to_string(),
            text: None,
        }
    }

    /// Whether an element's rendered text satisfies the text filter.
    pub fn accepts_text(&self, rendered: &str) -> bool {
        match &self.text {
            Some(needle) => rendered.contains(needle.as_str()),
            None => true,
        }
    }
}
