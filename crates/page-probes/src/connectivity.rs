use action_locator::{DomError, DomPort};

use crate::policy::{first_match, ProbePolicy};

/// True when the page shows a lost-connection banner.
pub async fn is_disconnected(dom: &dyn DomPort, policy: &ProbePolicy) -> Result<bool, DomError> {
    let text = dom.body_text().await?.to_lowercase();
    if text.trim().is_empty() {
        return Ok(false);
    }
    Ok(first_match(&text, &policy.disconnect_keywords).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_locator::fake::FakeDom;

    #[tokio::test]
    async fn detects_banner() {
        let dom = FakeDom::new();
        let policy = ProbePolicy::default();
        assert!(!is_disconnected(&dom, &policy).await.unwrap());

        dom.set_body_text("Connection lost. Reconnecting...");
        assert!(is_disconnected(&dom, &policy).await.unwrap());

        dom.set_body_text("连接已断开");
        assert!(is_disconnected(&dom, &policy).await.unwrap());
    }
}
