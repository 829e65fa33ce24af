//! Element resolution strategies
//!
//! Three strategies in fallback order:
//! 1. Selector - CSS selectors, fast path
//! 2. Path - XPath expressions, structural fallback
//! 3. Keyword - text / aria-label fragments on interactive elements

use async_trait::async_trait;
use tracing::debug;

use crate::dom::{DomPort, INTERACTIVE_SELECTOR};
use crate::errors::{DomError, LocatorError};
use crate::types::*;

/// Strategy trait for element resolution
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Collect every candidate this strategy finds for the descriptor
    async fn resolve(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Vec<Candidate>, LocatorError>;

    /// Get strategy type
    fn strategy_type(&self) -> LocatorStrategy;

    /// Get strategy name
    fn name(&self) -> &'static str {
        self.strategy_type().name()
    }
}

/// Swallows per-hint query errors; anything else aborts the resolution.
fn tolerate_query_error<T>(
    result: Result<Option<T>, DomError>,
    strategy: LocatorStrategy,
    hint: &str,
) -> Result<Option<T>, LocatorError> {
    match result {
        Ok(found) => Ok(found),
        Err(err) if err.is_query_error() => {
            debug!(strategy = strategy.name(), hint, %err, "skipping unusable hint");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// CSS selector resolution strategy
#[derive(Debug, Default)]
pub struct SelectorStrategy;

#[async_trait]
impl Strategy for SelectorStrategy {
    async fn resolve(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Vec<Candidate>, LocatorError> {
        let mut candidates = Vec::new();
        for selector in &descriptor.selectors {
            let found = tolerate_query_error(
                dom.query_selector(selector).await,
                LocatorStrategy::Selector,
                selector,
            )?;
            if let Some(element) = found {
                debug!(selector = %selector, node = %element.node, "selector matched");
                candidates.push(Candidate::new(element, LocatorStrategy::Selector));
            }
        }
        Ok(candidates)
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Selector
    }
}

/// XPath resolution strategy
#[derive(Debug, Default)]
pub struct PathStrategy;

#[async_trait]
impl Strategy for PathStrategy {
    async fn resolve(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Vec<Candidate>, LocatorError> {
        let mut candidates = Vec::new();
        for path in &descriptor.paths {
            let found =
                tolerate_query_error(dom.evaluate_xpath(path).await, LocatorStrategy::Path, path)?;
            if let Some(element) = found {
                debug!(path = %path, node = %element.node, "path matched");
                candidates.push(Candidate::new(element, LocatorStrategy::Path));
            }
        }
        Ok(candidates)
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Path
    }
}

/// Keyword matching strategy over buttons, links and `role="button"` nodes
#[derive(Debug, Default)]
pub struct KeywordStrategy;

#[async_trait]
impl Strategy for KeywordStrategy {
    async fn resolve(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Vec<Candidate>, LocatorError> {
        if descriptor.keywords.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = dom.query_selector_all(INTERACTIVE_SELECTOR, None).await?;
        let candidates: Vec<Candidate> = nodes
            .into_iter()
            .filter(|node| matches_keywords(node, &descriptor.keywords))
            .map(|node| Candidate::new(node, LocatorStrategy::Keyword))
            .collect();
        debug!(count = candidates.len(), "keyword scan finished");
        Ok(candidates)
    }

    fn strategy_type(&self) -> LocatorStrategy {
        LocatorStrategy::Keyword
    }
}

/// True when the trimmed, lowercased text or aria-label contains a keyword.
/// Elements with neither are never matched.
pub fn matches_keywords(element: &ElementHandle, keywords: &[String]) -> bool {
    let text = element.text.trim().to_lowercase();
    let aria = element
        .aria_label()
        .map(|label| label.trim().to_lowercase())
        .unwrap_or_default();
    if text.is_empty() && aria.is_empty() {
        return false;
    }
    keywords.iter().any(|keyword| {
        (!text.is_empty() && text.contains(keyword.as_str()))
            || (!aria.is_empty() && aria.contains(keyword.as_str()))
    })
}
