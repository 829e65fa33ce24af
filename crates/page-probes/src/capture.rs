//! Invitation code capture on the code-source page.
//!
//! Two sources feed [`latest_code`]: the page's own clipboard writes, seen
//! through a hook installed by a [`ClipboardPort`], and a scan of the
//! rendered DOM for code-shaped tokens.

use std::collections::HashSet;

use action_locator::{DomError, DomPort, ElementHandle};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use relay_core_types::{now_millis, CodeOrigin};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Elements whose text or clipboard attribute may carry a code.
pub const SCAN_SELECTOR: &str =
    "[data-clipboard-text], code, pre, span, button, div, p, h1, h2, h3, h4";

const CLIPBOARD_ATTR: &str = "data-clipboard-text";
const CLIPBOARD_ATTR_MAX_LEN: usize = 16;
const TOKEN_LENGTHS: [usize; 3] = [6, 7, 8];

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

/// Text the page last wrote to the clipboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedText {
    pub text: String,
    /// Epoch milliseconds of the write
    pub copied_at: i64,
}

/// Clipboard interception on a page.
#[async_trait]
pub trait ClipboardPort: Send + Sync {
    /// Wrap the page's clipboard-write entry point. Calling it again on the
    /// same page load is a no-op.
    async fn install_hook(&self) -> Result<(), DomError>;

    /// Last write seen by the hook.
    async fn last_copied(&self) -> Result<Option<CopiedText>, DomError>;
}

/// Answer to a latest-code request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeReport {
    pub code: String,
    pub copied_at: i64,
    pub source: CodeOrigin,
}

impl CodeReport {
    pub fn none() -> Self {
        Self {
            code: String::new(),
            copied_at: 0,
            source: CodeOrigin::None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }
}

fn is_code_shaped(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn clipboard_attr_code(element: &ElementHandle) -> Option<String> {
    let raw = element.attr(CLIPBOARD_ATTR)?;
    if raw.chars().count() > CLIPBOARD_ATTR_MAX_LEN {
        return None;
    }
    let normalized = raw.trim().to_uppercase();
    let shaped = !normalized.is_empty()
        && is_code_shaped(&normalized)
        && (6..=10).contains(&normalized.len());
    shaped.then_some(normalized)
}

/// Code candidates in discovery order; the last one is the freshest.
pub fn collect_candidates(elements: &[ElementHandle]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for element in elements {
        if let Some(code) = clipboard_attr_code(element) {
            candidates.push(code);
            continue;
        }
        if element.text.is_empty() {
            continue;
        }
        let upper = element.text.to_uppercase();
        let tokens: Vec<&str> = WORD_RE.find_iter(&upper).map(|m| m.as_str()).collect();
        for length in TOKEN_LENGTHS {
            for token in tokens.iter().filter(|t| t.len() == length) {
                if is_code_shaped(token) && seen.insert(token.to_string()) {
                    candidates.push(token.to_string());
                }
            }
        }
    }
    candidates
}

pub async fn scan_code_candidates(dom: &dyn DomPort) -> Result<Vec<String>, DomError> {
    let elements = dom.query_selector_all(SCAN_SELECTOR, None).await?;
    let candidates = collect_candidates(&elements);
    trace!(count = candidates.len(), "dom scan finished");
    Ok(candidates)
}

/// Latest code visible on the page.
///
/// An intercepted clipboard write wins and keeps its own timestamp; a DOM
/// scan hit is stamped with the current time.
pub async fn latest_code(
    dom: &dyn DomPort,
    clipboard: &dyn ClipboardPort,
) -> Result<CodeReport, DomError> {
    if let Some(copied) = clipboard.last_copied().await? {
        let code = copied.text.trim();
        if !code.is_empty() {
            let copied_at = if copied.copied_at > 0 {
                copied.copied_at
            } else {
                now_millis()
            };
            return Ok(CodeReport {
                code: code.to_string(),
                copied_at,
                source: CodeOrigin::Intercepted,
            });
        }
    }

    match scan_code_candidates(dom).await?.pop() {
        Some(code) => Ok(CodeReport {
            code,
            copied_at: now_millis(),
            source: CodeOrigin::Scanned,
        }),
        None => Ok(CodeReport::none()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeClipboard;
    use action_locator::fake::{FakeDom, FakeElement};

    fn element(text: &str) -> ElementHandle {
        ElementHandle {
            tag: "span".into(),
            text: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn tokens_are_grouped_by_length_and_deduplicated() {
        let found = collect_candidates(&[
            element("codes: abcd1234 xyz789 q1w2e3r"),
            element("again XYZ789"),
        ]);
        assert_eq!(found, vec!["XYZ789", "Q1W2E3R", "ABCD1234"]);
    }

    #[test]
    fn rejects_words_embedded_in_identifiers() {
        let found = collect_candidates(&[element("user_ABC123 ABC-DEFGHI 123456789")]);
        assert_eq!(found, vec!["DEFGHI"]);
    }

    #[test]
    fn clipboard_attribute_is_taken_directly() {
        let mut attr = element("ignored TEXT01");
        attr.attributes
            .insert(CLIPBOARD_ATTR.into(), " ab12cd34ef ".into());
        let mut too_long = element("");
        too_long
            .attributes
            .insert(CLIPBOARD_ATTR.into(), "ABCDEFGHIJKLMNOPQ".into());
        assert_eq!(collect_candidates(&[attr.clone(), attr]), vec!["AB12CD34EF", "AB12CD34EF"]);
        assert!(collect_candidates(&[too_long]).is_empty());
    }

    #[tokio::test]
    async fn intercepted_code_wins() {
        let dom = FakeDom::new();
        dom.append(None, FakeElement::new("code").text("SCAN01"));
        let clipboard = FakeClipboard::new();
        clipboard.install_hook().await.unwrap();
        clipboard.copy(" hook77 ", 1_000);

        let report = latest_code(&dom, &clipboard).await.unwrap();
        assert_eq!(report.code, "hook77");
        assert_eq!(report.copied_at, 1_000);
        assert_eq!(report.source, CodeOrigin::Intercepted);
    }

    #[tokio::test]
    async fn falls_back_to_last_scanned_candidate() {
        let dom = FakeDom::new();
        dom.append(None, FakeElement::new("code").text("OLD111"));
        dom.append(None, FakeElement::new("code").text("NEW222"));
        let clipboard = FakeClipboard::new();

        let before = now_millis();
        let report = latest_code(&dom, &clipboard).await.unwrap();
        assert_eq!(report.code, "NEW222");
        assert_eq!(report.source, CodeOrigin::Scanned);
        assert!(report.copied_at >= before);
    }

    #[tokio::test]
    async fn empty_page_reports_none() {
        let dom = FakeDom::new();
        let report = latest_code(&dom, &FakeClipboard::new()).await.unwrap();
        assert_eq!(report, CodeReport::none());
        assert!(report.is_empty());
    }
}
