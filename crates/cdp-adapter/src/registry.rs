//! Registry of tabs handed out to the relay.

use chromiumoxide::Page;
use dashmap::DashMap;
use relay_core_types::TabHandle;

#[derive(Clone, Debug)]
pub struct TabEntry<P> {
    pub page: P,
    pub recent_url: Option<String>,
}

/// Concurrent map from tab handles to live pages.
pub struct Registry<P = Page> {
    pages: DashMap<TabHandle, TabEntry<P>>,
}

impl<P: Clone> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone> Registry<P> {
    pub fn new() -> Self {
        Self {
            pages: DashMap::new(),
        }
    }

    pub fn insert(&self, tab: TabHandle, page: P, url: Option<String>) {
        self.pages.insert(
            tab,
            TabEntry {
                page,
                recent_url: url,
            },
        );
    }

    pub fn remove(&self, tab: &TabHandle) {
        self.pages.remove(tab);
    }

    pub fn page(&self, tab: &TabHandle) -> Option<P> {
        self.pages.get(tab).map(|entry| entry.page.clone())
    }

    pub fn contains(&self, tab: &TabHandle) -> bool {
        self.pages.contains_key(tab)
    }

    pub fn set_recent_url(&self, tab: &TabHandle, url: String) {
        if let Some(mut entry) = self.pages.get_mut(tab) {
            entry.recent_url = Some(url);
        }
    }

    pub fn recent_url(&self, tab: &TabHandle) -> Option<String> {
        self.pages
            .get(tab)
            .and_then(|entry| entry.recent_url.clone())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
