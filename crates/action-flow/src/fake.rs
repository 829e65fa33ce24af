//! In-memory tabs and scripted site fixtures for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use action_locator::fake::{FakeDom, FakeElement};
use action_locator::{DomPort, NodeRef};
use async_trait::async_trait;
use page_probes::fake::FakeClipboard;
use page_probes::ClipboardPort;
use parking_lot::Mutex;
use relay_core_types::{now_millis, RelayError, SiteTarget, TabHandle};

use crate::ports::{LoadState, TabPort};

/// Document and clipboard of one fake tab.
#[derive(Clone, Default)]
pub struct FakePage {
    pub dom: FakeDom,
    pub clipboard: FakeClipboard,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            dom: FakeDom::new(),
            clipboard: FakeClipboard::new(),
        }
    }
}

/// Runs after a tab reload, outside the tab lock.
pub type ReloadHook = Arc<dyn Fn(&FakePage) + Send + Sync>;

struct FakeTab {
    handle: TabHandle,
    url: String,
    page: FakePage,
    pending_loads: u32,
    reloads: u32,
}

#[derive(Default)]
struct TabsInner {
    tabs: Vec<FakeTab>,
    next_id: u64,
    prepared: HashMap<String, FakePage>,
    creation_error: Option<RelayError>,
    created: Vec<TabHandle>,
    focused: Vec<TabHandle>,
    reload_hooks: HashMap<TabHandle, Vec<ReloadHook>>,
}

impl TabsInner {
    fn tab(&mut self, handle: &TabHandle) -> Result<&mut FakeTab, RelayError> {
        self.tabs
            .iter_mut()
            .find(|tab| &tab.handle == handle)
            .ok_or_else(|| RelayError::TabClosed(handle.clone()))
    }

    fn insert(&mut self, url: &str, page: FakePage) -> TabHandle {
        self.next_id += 1;
        let handle = TabHandle::new(format!("tab-{}", self.next_id));
        self.tabs.push(FakeTab {
            handle: handle.clone(),
            url: url.to_string(),
            page,
            pending_loads: 0,
            reloads: 0,
        });
        handle
    }
}

/// Scriptable in-memory [`TabPort`].
#[derive(Default)]
pub struct FakeTabs {
    inner: Mutex<TabsInner>,
}

impl FakeTabs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add an already open tab.
    pub fn open(&self, url: &str, page: FakePage) -> TabHandle {
        self.inner.lock().insert(url, page)
    }

    /// Page served when a tab is created for `url`.
    pub fn prepare(&self, url: &str, page: FakePage) {
        self.inner.lock().prepared.insert(url.to_string(), page);
    }

    /// Make tab creation fail with `err`.
    pub fn fail_creation(&self, err: RelayError) {
        self.inner.lock().creation_error = Some(err);
    }

    /// Report `Loading` for the next `polls` load checks.
    pub fn set_pending_loads(&self, tab: &TabHandle, polls: u32) {
        if let Ok(tab) = self.inner.lock().tab(tab) {
            tab.pending_loads = polls;
        }
    }

    pub fn on_reload(&self, tab: &TabHandle, hook: ReloadHook) {
        self.inner
            .lock()
            .reload_hooks
            .entry(tab.clone())
            .or_default()
            .push(hook);
    }

    pub fn page(&self, tab: &TabHandle) -> Option<FakePage> {
        self.inner.lock().tab(tab).ok().map(|tab| tab.page.clone())
    }

    pub fn created(&self) -> Vec<TabHandle> {
        self.inner.lock().created.clone()
    }

    pub fn focused(&self) -> Vec<TabHandle> {
        self.inner.lock().focused.clone()
    }

    pub fn reloads(&self, tab: &TabHandle) -> u32 {
        self.inner.lock().tab(tab).map(|tab| tab.reloads).unwrap_or(0)
    }

    /// Drop a tab as if the user closed it.
    pub fn close(&self, tab: &TabHandle) {
        self.inner.lock().tabs.retain(|candidate| &candidate.handle != tab);
    }
}

#[async_trait]
impl TabPort for FakeTabs {
    async fn find_or_create(&self, site: &SiteTarget) -> Result<TabHandle, RelayError> {
        let mut inner = self.inner.lock();
        if let Some(tab) = inner.tabs.iter().find(|tab| site.matches(&tab.url)) {
            return Ok(tab.handle.clone());
        }
        if let Some(err) = &inner.creation_error {
            return Err(err.clone());
        }
        let page = inner.prepared.remove(&site.url).unwrap_or_else(FakePage::new);
        let handle = inner.insert(&site.url, page);
        inner.created.push(handle.clone());
        Ok(handle)
    }

    async fn load_state(&self, tab: &TabHandle) -> Result<LoadState, RelayError> {
        let mut inner = self.inner.lock();
        let tab = inner.tab(tab)?;
        if tab.pending_loads > 0 {
            tab.pending_loads -= 1;
            return Ok(LoadState::Loading);
        }
        Ok(LoadState::Complete)
    }

    async fn focus(&self, tab: &TabHandle) -> Result<(), RelayError> {
        let mut inner = self.inner.lock();
        inner.tab(tab)?;
        inner.focused.push(tab.clone());
        Ok(())
    }

    async fn reload(&self, tab: &TabHandle) -> Result<(), RelayError> {
        let (page, hooks) = {
            let mut inner = self.inner.lock();
            let hooks = inner.reload_hooks.get(tab).cloned().unwrap_or_default();
            let entry = inner.tab(tab)?;
            entry.reloads += 1;
            (entry.page.clone(), hooks)
        };
        page.clipboard.reload();
        for hook in hooks {
            hook(&page);
        }
        Ok(())
    }

    fn dom(&self, tab: &TabHandle) -> Result<Arc<dyn DomPort>, RelayError> {
        let dom = self.inner.lock().tab(tab)?.page.dom.clone();
        Ok(Arc::new(dom))
    }

    fn clipboard(&self, tab: &TabHandle) -> Result<Arc<dyn ClipboardPort>, RelayError> {
        let clipboard = self.inner.lock().tab(tab)?.page.clipboard.clone();
        Ok(Arc::new(clipboard))
    }
}

#[derive(Default)]
struct SourceState {
    codes: VecDeque<String>,
    copy_control: Option<NodeRef>,
    fetches: u32,
    copies: u32,
    marks: u32,
}

/// Code-generation page: the fetch control reveals a copy control, the copy
/// control writes the current code to the clipboard, and the mark control
/// moves on to the next code.
#[derive(Clone)]
pub struct CodeSourceFixture {
    pub page: FakePage,
    state: Arc<Mutex<SourceState>>,
}

impl CodeSourceFixture {
    pub fn new(codes: &[&str]) -> Self {
        let fixture = Self::inert(codes);
        let state = fixture.state.clone();
        let clipboard = fixture.page.clipboard.clone();
        let fetch = fixture.page.dom.append(
            None,
            FakeElement::button("Get code").class("generate-code"),
        );
        fixture.page.dom.on_click(
            fetch,
            Arc::new(move |dom: &FakeDom| {
                let mut source = state.lock();
                source.fetches += 1;
                if source.copy_control.is_some() || source.codes.is_empty() {
                    return;
                }
                let copy = dom.append(None, FakeElement::button("Copy").class("copy-code"));
                source.copy_control = Some(copy);
                let state = state.clone();
                let clipboard = clipboard.clone();
                dom.on_click(
                    copy,
                    Arc::new(move |_: &FakeDom| {
                        let mut source = state.lock();
                        source.copies += 1;
                        if let Some(code) = source.codes.front() {
                            clipboard.copy(code, now_millis());
                        }
                    }),
                );
            }),
        );

        let state = fixture.state.clone();
        let mark = fixture
            .page
            .dom
            .append(None, FakeElement::button("Next").class("next-code"));
        fixture.page.dom.on_click(
            mark,
            Arc::new(move |dom: &FakeDom| {
                let mut source = state.lock();
                source.marks += 1;
                source.codes.pop_front();
                if let Some(copy) = source.copy_control.take() {
                    dom.remove(copy);
                }
            }),
        );
        fixture
    }

    /// Page whose fetch control never reveals anything.
    pub fn inert(codes: &[&str]) -> Self {
        let page = FakePage::new();
        page.dom.set_host("formbiz.biz");
        Self {
            page,
            state: Arc::new(Mutex::new(SourceState {
                codes: codes.iter().map(|code| code.to_string()).collect(),
                ..SourceState::default()
            })),
        }
    }

    pub fn fetches(&self) -> u32 {
        self.state.lock().fetches
    }

    pub fn copies(&self) -> u32 {
        self.state.lock().copies
    }

    pub fn marks(&self) -> u32 {
        self.state.lock().marks
    }
}

/// How the target page reacts to one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The invite input goes away
    Accept,
    /// An alert with this text appears
    Reject(String),
    /// Nothing changes
    Silent,
}

#[derive(Default)]
struct TargetState {
    verdicts: VecDeque<Verdict>,
    submitted: Vec<String>,
}

/// Invite intake page with one input and a continue button. Each Enter on
/// the input consumes the next scripted verdict; once they run out the page
/// stays silent.
#[derive(Clone)]
pub struct TargetFixture {
    pub page: FakePage,
    pub input: NodeRef,
    state: Arc<Mutex<TargetState>>,
}

impl TargetFixture {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        let page = FakePage::new();
        let dom = &page.dom;
        dom.set_host("sora.chatgpt.com");
        let form = dom.append(None, FakeElement::new("form"));
        let input = dom.append(
            Some(form),
            FakeElement::input("text").attr("placeholder", "Enter invite code"),
        );
        dom.append(Some(form), FakeElement::button("Continue"));
        let alert = dom.append(None, FakeElement::new("div").attr("role", "alert"));

        let state = Arc::new(Mutex::new(TargetState {
            verdicts: verdicts.into(),
            submitted: Vec::new(),
        }));
        let hook_state = state.clone();
        dom.on_submit(Arc::new(move |dom: &FakeDom| {
            let mut target = hook_state.lock();
            target
                .submitted
                .push(dom.value_of(input).unwrap_or_default());
            dom.set_text(alert, "");
            match target.verdicts.pop_front().unwrap_or(Verdict::Silent) {
                Verdict::Accept => dom.remove(form),
                Verdict::Reject(text) => dom.set_text(alert, &text),
                Verdict::Silent => {}
            }
        }));

        Self { page, input, state }
    }

    /// Codes typed into the input at each submission.
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }
}
