//! Element resolver with fallback chain orchestration

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dom::DomPort;
use crate::errors::{DomError, LocatorError};
use crate::strategies::*;
use crate::types::*;

/// Resolve-and-click rounds before a vanishing element counts as a miss.
const CLICK_ATTEMPTS: usize = 2;

/// Resolves descriptors against a document and acts on the result.
#[derive(Clone)]
pub struct ElementLocator {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl Default for ElementLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementLocator {
    /// Locator with the selector, path and keyword strategies in that order.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Arc::new(SelectorStrategy),
                Arc::new(PathStrategy),
                Arc::new(KeywordStrategy),
            ],
        }
    }

    /// Locator over a custom strategy chain.
    pub fn with_strategies(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// Run every strategy and collect their candidates in chain order.
    pub async fn candidates(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Vec<Candidate>, LocatorError> {
        if descriptor.is_empty() {
            debug!("descriptor has no hints; nothing to resolve");
            return Ok(Vec::new());
        }
        let mut collected = Vec::new();
        for strategy in &self.strategies {
            let mut found = strategy.resolve(dom, descriptor).await?;
            debug!(
                strategy = strategy.name(),
                count = found.len(),
                "strategy finished"
            );
            collected.append(&mut found);
        }
        Ok(collected)
    }

    pub async fn locate(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<Option<ElementHandle>, LocatorError> {
        let candidates = self.candidates(dom, descriptor).await?;
        Ok(select_candidate(candidates).map(|candidate| candidate.element))
    }

    pub async fn exists(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<bool, LocatorError> {
        Ok(self.locate(dom, descriptor).await?.is_some())
    }

    /// Scroll the resolved element into view and click it. An element that
    /// detaches before the click is resolved again; if it keeps vanishing
    /// the click is reported as missed.
    pub async fn click(
        &self,
        dom: &dyn DomPort,
        descriptor: &ElementDescriptor,
    ) -> Result<ClickOutcome, LocatorError> {
        for attempt in 0..CLICK_ATTEMPTS {
            let Some(element) = self.locate(dom, descriptor).await? else {
                return Ok(ClickOutcome::missed());
            };
            if let Err(err) = dom.scroll_into_view(element.node).await {
                debug!(node = %element.node, %err, "scroll into view failed; clicking anyway");
            }
            match dom.click(element.node).await {
                Ok(()) => return Ok(ClickOutcome::clicked(element.node)),
                Err(DomError::Detached(node)) => {
                    debug!(%node, attempt, "element detached before click");
                }
                Err(err) => return Err(err.into()),
            }
        }
        warn!("element kept detaching; click skipped");
        Ok(ClickOutcome::missed())
    }
}

/// First clickable and visible candidate, else the first candidate at all.
pub fn select_candidate(candidates: Vec<Candidate>) -> Option<Candidate> {
    let preferred = candidates.iter().position(Candidate::is_preferred);
    match preferred {
        Some(index) => candidates.into_iter().nth(index),
        None => {
            let first = candidates.into_iter().next();
            if let Some(candidate) = &first {
                warn!(
                    node = %candidate.element.node,
                    strategy = candidate.strategy.name(),
                    "no visible candidate; falling back to first match"
                );
            }
            first
        }
    }
}
