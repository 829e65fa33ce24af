use action_locator::{DomError, DomPort};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::policy::{first_match, ProbePolicy};
use crate::submit::find_invite_input;

/// Detail reported when the invite input has disappeared.
pub const INPUT_ABSENT_DETAIL: &str = "invite-input-absent";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
    Unknown,
}

/// Verdict read from the page after a submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Outcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn unknown(detail: Option<String>) -> Self {
        Self {
            status: OutcomeStatus::Unknown,
            detail,
        }
    }
}

/// Classify the page state after a submission.
///
/// A page without the invite input counts as success. Otherwise failure
/// keywords take precedence over success keywords.
pub async fn classify_outcome(dom: &dyn DomPort, policy: &ProbePolicy) -> Result<Outcome, DomError> {
    if find_invite_input(dom, policy).await?.is_none() {
        return Ok(Outcome::success(INPUT_ABSENT_DETAIL));
    }
    let text = relevant_text(dom, policy).await?;
    Ok(classify_text(&text, policy))
}

/// Keyword verdict for already lowercased text.
pub fn classify_text(text: &str, policy: &ProbePolicy) -> Outcome {
    if let Some(keyword) = first_match(text, &policy.failure_keywords) {
        return Outcome::failure(keyword);
    }
    if let Some(keyword) = first_match(text, &policy.success_keywords) {
        return Outcome::success(keyword);
    }
    Outcome::unknown(None)
}

/// Lowercased text of the error regions, or of the body when they are empty.
async fn relevant_text(dom: &dyn DomPort, policy: &ProbePolicy) -> Result<String, DomError> {
    let mut snippets = Vec::new();
    for selector in &policy.error_region_selectors {
        let nodes = match dom.query_selector_all(selector, None).await {
            Ok(nodes) => nodes,
            Err(err) if err.is_query_error() => {
                debug!(selector = %selector, %err, "skipping error region selector");
                continue;
            }
            Err(err) => return Err(err),
        };
        snippets.extend(
            nodes
                .into_iter()
                .map(|node| node.text.trim().to_string())
                .filter(|text| !text.is_empty()),
        );
    }
    if snippets.is_empty() {
        let body = dom.body_text().await?;
        let body = body.trim();
        if !body.is_empty() {
            snippets.push(body.to_string());
        }
    }
    Ok(snippets.join("\n").to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::fake::{FakeDom, FakeElement};

    fn page_with_input() -> FakeDom {
        let dom = FakeDom::new();
        dom.append(
            None,
            FakeElement::input("text").attr("placeholder", "Invite code"),
        );
        dom
    }

    #[tokio::test]
    async fn missing_input_is_success_regardless_of_text() {
        let dom = FakeDom::new();
        dom.set_body_text("Invalid code, please try again");
        let outcome = classify_outcome(&dom, &ProbePolicy::default()).await.unwrap();
        assert_eq!(outcome, Outcome::success(INPUT_ABSENT_DETAIL));
    }

    #[tokio::test]
    async fn failure_beats_success() {
        let dom = page_with_input();
        dom.set_body_text("Welcome! Create something. Error: code expired");
        let outcome = classify_outcome(&dom, &ProbePolicy::default()).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert_eq!(outcome.detail.as_deref(), Some("error"));
    }

    #[tokio::test]
    async fn error_region_text_is_preferred_over_body() {
        let dom = page_with_input();
        dom.append(
            None,
            FakeElement::new("div").attr("role", "alert").text("Code not recognized"),
        );
        dom.append(None, FakeElement::new("p").text("Start to create"));
        let outcome = classify_outcome(&dom, &ProbePolicy::default()).await.unwrap();
        assert_eq!(outcome, Outcome::failure("not recognized"));
    }

    #[tokio::test]
    async fn success_keyword_and_unknown() {
        let dom = page_with_input();
        dom.set_body_text("Access granted");
        let outcome = classify_outcome(&dom, &ProbePolicy::default()).await.unwrap();
        assert_eq!(outcome, Outcome::success("access granted"));

        dom.set_body_text("Please wait");
        let outcome = classify_outcome(&dom, &ProbePolicy::default()).await.unwrap();
        assert_eq!(outcome, Outcome::unknown(None));
    }

    #[test]
    fn outcome_serializes_lowercase() {
        let json = serde_json::to_value(Outcome::unknown(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "unknown" }));
    }
}
