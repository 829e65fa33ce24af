use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the relay ports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("{message}")]
    Message { message: String },
    #[error("tab {0} is no longer available")]
    TabClosed(TabHandle),
    #[error("script execution failed: {0}")]
    Script(String),
}

impl RelayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::Script(message.into())
    }
}

/// Opaque identifier of a browser tab.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabHandle(pub String);

impl TabHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to every automation run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance of a captured invitation code.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeOrigin {
    /// Captured from the page's own clipboard write.
    Intercepted,
    /// Scraped from the rendered DOM.
    Scanned,
    None,
}

impl CodeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeOrigin::Intercepted => "intercepted",
            CodeOrigin::Scanned => "scanned",
            CodeOrigin::None => "none",
        }
    }
}

impl fmt::Display for CodeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A site the relay works against: the URL to open and the URL patterns that
/// identify an already open tab for it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteTarget {
    pub url: String,
    #[serde(default)]
    pub match_patterns: Vec<String>,
}

impl SiteTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            match_patterns: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_patterns.push(pattern.into());
        self
    }

    /// Effective patterns; falls back to `<url>/*` when none are configured.
    pub fn patterns(&self) -> Vec<String> {
        if self.match_patterns.is_empty() {
            vec![format!("{}/*", self.url.trim_end_matches('/'))]
        } else {
            self.match_patterns.clone()
        }
    }

    /// The site URL itself always matches, trailing slash aside.
    pub fn matches(&self, url: &str) -> bool {
        url.trim_end_matches('/') == self.url.trim_end_matches('/')
            || self
                .patterns()
                .iter()
                .any(|pattern| wildcard_match(pattern, url))
    }
}

/// Matches `candidate` against a pattern where `*` stands for any run of
/// characters (including none).
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return candidate.is_empty();
    };
    if !candidate.starts_with(first) {
        return false;
    }
    let mut rest = &candidate[first.len()..];
    let segments: Vec<&str> = parts.collect();
    let Some((last, middle)) = segments.split_last() else {
        return rest.is_empty();
    };
    for segment in middle {
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Wall-clock time in epoch milliseconds, the unit pages report copy times in.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_suffix_patterns() {
        assert!(wildcard_match("https://formbiz.biz/*", "https://formbiz.biz/"));
        assert!(wildcard_match(
            "https://formbiz.biz/*",
            "https://formbiz.biz/codes?page=2"
        ));
        assert!(!wildcard_match(
            "https://formbiz.biz/*",
            "https://www.formbiz.biz/"
        ));
        assert!(wildcard_match("https://*.example.com/*", "https://a.example.com/x"));
        assert!(wildcard_match("exact", "exact"));
        assert!(!wildcard_match("exact", "exact-not"));
    }

    #[test]
    fn site_target_derives_pattern_from_url() {
        let target = SiteTarget::new("https://sora.chatgpt.com/explore");
        assert_eq!(target.patterns(), vec!["https://sora.chatgpt.com/explore/*"]);
        assert!(target.matches("https://sora.chatgpt.com/explore"));
        assert!(target.matches("https://sora.chatgpt.com/explore/"));
        assert!(!target.matches("https://sora.chatgpt.com/explored"));

        let target = SiteTarget::new("https://sora.chatgpt.com/explore")
            .with_pattern("https://sora.chatgpt.com/*");
        assert!(target.matches("https://sora.chatgpt.com/drafts"));
        assert!(!target.matches("https://chatgpt.com/"));
    }

    #[test]
    fn site_target_fields_are_snake_case() {
        let target: SiteTarget = serde_json::from_str(
            r#"{"url": "https://invites.example.test/join", "match_patterns": ["https://invites.example.test/*"]}"#,
        )
        .unwrap();
        assert!(target.matches("https://invites.example.test/other"));

        let misspelled = serde_json::from_str::<SiteTarget>(
            r#"{"url": "https://invites.example.test/join", "matchPatterns": []}"#,
        );
        assert!(misspelled.is_err());
    }

    #[test]
    fn code_origin_serializes_lowercase() {
        let json = serde_json::to_string(&CodeOrigin::Intercepted).unwrap();
        assert_eq!(json, "\"intercepted\"");
    }
}
