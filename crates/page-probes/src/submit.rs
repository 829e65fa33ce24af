use action_locator::{matches_keywords, DomError, DomPort, ElementHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::SubmitError;
use crate::policy::{first_match, ProbePolicy};

/// Text inputs considered when looking for the invite field.
pub const INPUT_SELECTOR: &str = "input:not([type=\"hidden\"])";

/// Ancestor searched for the submit control.
const SUBMIT_SCOPE_SELECTOR: &str = "form, section, div, dialog";

const SUBMIT_BUTTON_SELECTOR: &str = "button, [role=\"button\"], input[type=\"submit\"]";

/// How the code was handed to the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitMethod {
    ButtonAndEnter,
    Form,
    EnterKey,
}

impl SubmitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMethod::ButtonAndEnter => "button-and-enter",
            SubmitMethod::Form => "form",
            SubmitMethod::EnterKey => "enter-key",
        }
    }
}

fn is_invite_input(input: &ElementHandle, keywords: &[String]) -> bool {
    let hints = [
        input.attr("placeholder"),
        input.attr("name"),
        input.attr("id"),
        input.aria_label(),
        input.attr("data-placeholder"),
        input.label_text.as_deref(),
    ];
    hints
        .into_iter()
        .flatten()
        .any(|hint| first_match(&hint.to_lowercase(), keywords).is_some())
}

/// Locate the invite input, preferring a rendered one.
pub async fn find_invite_input(
    dom: &dyn DomPort,
    policy: &ProbePolicy,
) -> Result<Option<ElementHandle>, DomError> {
    let inputs = dom.query_selector_all(INPUT_SELECTOR, None).await?;
    let matching: Vec<ElementHandle> = inputs
        .into_iter()
        .filter(|input| is_invite_input(input, &policy.input_keywords))
        .collect();
    let visible = matching.iter().find(|input| input.is_visible()).cloned();
    Ok(visible.or_else(|| matching.into_iter().next()))
}

async fn find_submit_button(
    dom: &dyn DomPort,
    policy: &ProbePolicy,
    input: &ElementHandle,
) -> Result<Option<ElementHandle>, DomError> {
    let scope = dom.closest(input.node, SUBMIT_SCOPE_SELECTOR).await?;
    let buttons = dom.query_selector_all(SUBMIT_BUTTON_SELECTOR, scope).await?;
    Ok(buttons
        .into_iter()
        .find(|button| matches_keywords(button, &policy.button_keywords)))
}

/// Fill the invite input with `code` and submit it.
///
/// A matching submit button is clicked when present; Enter is pressed on the
/// input either way. Without a button, the enclosing form is submitted.
pub async fn submit_invite(
    dom: &dyn DomPort,
    policy: &ProbePolicy,
    code: &str,
) -> Result<SubmitMethod, SubmitError> {
    let input = find_invite_input(dom, policy)
        .await?
        .ok_or(SubmitError::InviteInputNotFound)?;
    debug!(node = %input.node, "invite input found");

    dom.focus(input.node).await?;
    dom.set_value(input.node, code).await?;

    let button = find_submit_button(dom, policy, &input).await?;
    if let Some(button) = &button {
        if let Err(err) = dom.scroll_into_view(button.node).await {
            debug!(node = %button.node, %err, "scroll into view failed");
        }
        dom.click(button.node).await?;
    }

    dom.press_enter(input.node).await?;

    let method = if button.is_some() {
        SubmitMethod::ButtonAndEnter
    } else if dom.submit_form(input.node).await? {
        SubmitMethod::Form
    } else {
        SubmitMethod::EnterKey
    };
    info!(method = method.as_str(), "invite code submitted");
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::fake::{FakeDom, FakeElement};
    use action_locator::NodeRef;

    fn invite_form(dom: &FakeDom) -> (NodeRef, NodeRef) {
        let form = dom.append(None, FakeElement::new("form"));
        let input = dom.append(
            Some(form),
            FakeElement::input("text").attr("placeholder", "Enter invite code"),
        );
        (form, input)
    }

    #[tokio::test]
    async fn clicks_button_and_presses_enter() {
        let dom = FakeDom::new();
        let (form, input) = invite_form(&dom);
        let button = dom.append(Some(form), FakeElement::button("Continue"));

        let method = submit_invite(&dom, &ProbePolicy::default(), "ABC123")
            .await
            .unwrap();
        assert_eq!(method, SubmitMethod::ButtonAndEnter);
        assert_eq!(dom.value_of(input).as_deref(), Some("ABC123"));
        assert_eq!(dom.focused(), vec![input]);
        assert_eq!(dom.clicks(), vec![button]);
        assert_eq!(dom.entered(), vec![input]);
        assert!(dom.submitted().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_form_submission() {
        let dom = FakeDom::new();
        let (form, input) = invite_form(&dom);
        dom.append(Some(form), FakeElement::button("Cancel"));

        let method = submit_invite(&dom, &ProbePolicy::default(), "ABC123")
            .await
            .unwrap();
        assert_eq!(method, SubmitMethod::Form);
        assert_eq!(dom.entered(), vec![input]);
        assert_eq!(dom.submitted(), vec![form]);
    }

    #[tokio::test]
    async fn enter_key_without_form() {
        let dom = FakeDom::new();
        let section = dom.append(None, FakeElement::new("section"));
        dom.append(
            Some(section),
            FakeElement::input("text").label("Invitation"),
        );
        let method = submit_invite(&dom, &ProbePolicy::default(), "XYZ789")
            .await
            .unwrap();
        assert_eq!(method, SubmitMethod::EnterKey);
    }

    #[tokio::test]
    async fn prefers_visible_input_and_ignores_hidden() {
        let dom = FakeDom::new();
        dom.append(None, FakeElement::input("hidden").attr("name", "invite"));
        dom.append(None, FakeElement::input("text").attr("name", "invite").hidden());
        let visible = dom.append(None, FakeElement::input("text").attr("aria-label", "Access Code"));
        let found = find_invite_input(&dom, &ProbePolicy::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.node, visible);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let dom = FakeDom::new();
        dom.append(None, FakeElement::input("email").attr("placeholder", "Email"));
        let err = submit_invite(&dom, &ProbePolicy::default(), "ABC123")
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "invite-input-not-found");
    }

    #[tokio::test]
    async fn dom_failure_becomes_script_error() {
        let dom = FakeDom::new();
        invite_form(&dom);
        dom.fail_with(DomError::Transport("target closed".into()));
        let err = submit_invite(&dom, &ProbePolicy::default(), "ABC123")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Script(message) if message.contains("target closed")));
    }
}
