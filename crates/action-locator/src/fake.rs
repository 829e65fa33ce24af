//! In-memory document for tests.
//!
//! Understands a small CSS subset (comma lists of compound selectors built
//! from tag, `*`, `.class`, `#id`, `[attr]`, `[attr="v"]` and `:not(...)`).
//! Anything else is reported as [`DomError::InvalidQuery`], the same way a
//! browser rejects a malformed selector.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dom::DomPort;
use crate::errors::DomError;
use crate::types::{ElementHandle, NodeRef};

/// Callback run after an interaction, outside the document lock.
pub type DomHook = Arc<dyn Fn(&FakeDom) + Send + Sync>;

/// Blueprint for a node appended to a [`FakeDom`].
#[derive(Clone, Debug)]
pub struct FakeElement {
    tag: String,
    text: String,
    label: Option<String>,
    attributes: BTreeMap<String, String>,
    width: f64,
    height: f64,
    clickable: bool,
}

impl FakeElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            text: String::new(),
            label: None,
            attributes: BTreeMap::new(),
            width: 120.0,
            height: 32.0,
            clickable: true,
        }
    }

    pub fn button(text: &str) -> Self {
        Self::new("button").text(text)
    }

    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn class(self, class: &str) -> Self {
        let merged = match self.attributes.get("class") {
            Some(existing) => format!("{existing} {class}"),
            None => class.to_string(),
        };
        self.attr("class", &merged)
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Zero-sized box.
    pub fn hidden(mut self) -> Self {
        self.width = 0.0;
        self.height = 0.0;
        self
    }

    pub fn not_clickable(mut self) -> Self {
        self.clickable = false;
        self
    }
}

struct FakeNode {
    element: FakeElement,
    parent: Option<u64>,
    attached: bool,
    value: Option<String>,
}

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<u64, FakeNode>,
    next_id: u64,
    xpaths: HashMap<String, u64>,
    body_override: Option<String>,
    host: String,
    failure: Option<DomError>,
    stale_clicks: u32,
    clicks: Vec<NodeRef>,
    scrolled: Vec<NodeRef>,
    focused: Vec<NodeRef>,
    entered: Vec<NodeRef>,
    submitted: Vec<NodeRef>,
    click_hooks: HashMap<u64, Vec<DomHook>>,
    submit_hooks: Vec<DomHook>,
}

impl Inner {
    fn check(&self) -> Result<(), DomError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn attached(&self, node: NodeRef) -> Result<&FakeNode, DomError> {
        match self.nodes.get(&node.0) {
            Some(entry) if entry.attached => Ok(entry),
            _ => Err(DomError::Detached(node)),
        }
    }

    fn is_within(&self, id: u64, scope: u64) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == scope {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    fn rendered_text(&self, id: u64) -> String {
        let Some(node) = self.nodes.get(&id) else {
            return String::new();
        };
        let mut parts = Vec::new();
        if !node.element.text.is_empty() {
            parts.push(node.element.text.clone());
        }
        for (child_id, child) in &self.nodes {
            if child.parent == Some(id) && child.attached {
                let text = self.rendered_text(*child_id);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
        parts.join("\n")
    }

    fn snapshot(&self, id: u64) -> Option<ElementHandle> {
        let node = self.nodes.get(&id)?;
        let element = &node.element;
        Some(ElementHandle {
            node: NodeRef(id),
            tag: element.tag.clone(),
            text: self.rendered_text(id),
            label_text: element.label.clone(),
            attributes: element.attributes.clone(),
            width: element.width,
            height: element.height,
            clickable: element.clickable,
        })
    }

    fn select(&self, selector: &str, scope: Option<NodeRef>) -> Result<Vec<u64>, DomError> {
        let list = parse_selector_list(selector)?;
        Ok(self
            .nodes
            .iter()
            .filter(|(_, node)| node.attached)
            .filter(|(id, _)| match scope {
                Some(scope) => **id != scope.0 && self.is_within(**id, scope.0),
                None => true,
            })
            .filter(|(_, node)| list.iter().any(|compound| compound.matches(&node.element)))
            .map(|(id, _)| *id)
            .collect())
    }
}

/// Scriptable in-memory [`DomPort`].
#[derive(Clone, Default)]
pub struct FakeDom {
    inner: Arc<Mutex<Inner>>,
}

impl FakeDom {
    pub fn new() -> Self {
        let dom = Self::default();
        dom.inner.lock().host = "localhost".to_string();
        dom
    }

    /// Append an element under `parent` (or at the root) in document order.
    pub fn append(&self, parent: Option<NodeRef>, element: FakeElement) -> NodeRef {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.nodes.insert(
            id,
            FakeNode {
                element,
                parent: parent.map(|p| p.0),
                attached: true,
                value: None,
            },
        );
        NodeRef(id)
    }

    /// Detach a node and its subtree.
    pub fn remove(&self, node: NodeRef) {
        let mut inner = self.inner.lock();
        let doomed: Vec<u64> = inner
            .nodes
            .keys()
            .copied()
            .filter(|id| inner.is_within(*id, node.0))
            .collect();
        for id in doomed {
            if let Some(entry) = inner.nodes.get_mut(&id) {
                entry.attached = false;
            }
        }
    }

    /// Remove every node, registered path and hook.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.nodes.clear();
        inner.xpaths.clear();
        inner.click_hooks.clear();
        inner.submit_hooks.clear();
        inner.body_override = None;
    }

    pub fn set_text(&self, node: NodeRef, text: &str) {
        if let Some(entry) = self.inner.lock().nodes.get_mut(&node.0) {
            entry.element.text = text.to_string();
        }
    }

    pub fn register_xpath(&self, path: &str, node: NodeRef) {
        self.inner.lock().xpaths.insert(path.to_string(), node.0);
    }

    /// Replace the computed body text.
    pub fn set_body_text(&self, text: &str) {
        self.inner.lock().body_override = Some(text.to_string());
    }

    pub fn set_host(&self, host: &str) {
        self.inner.lock().host = host.to_string();
    }

    /// Every subsequent call fails with `err`.
    pub fn fail_with(&self, err: DomError) {
        self.inner.lock().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.inner.lock().failure = None;
    }

    /// The next `count` clicks find their node detached, as when the page
    /// re-renders between lookup and click.
    pub fn detach_next_clicks(&self, count: u32) {
        self.inner.lock().stale_clicks = count;
    }

    pub fn on_click(&self, node: NodeRef, hook: DomHook) {
        self.inner
            .lock()
            .click_hooks
            .entry(node.0)
            .or_default()
            .push(hook);
    }

    /// Runs on Enter presses and form submissions.
    pub fn on_submit(&self, hook: DomHook) {
        self.inner.lock().submit_hooks.push(hook);
    }

    pub fn clicks(&self) -> Vec<NodeRef> {
        self.inner.lock().clicks.clone()
    }

    pub fn scrolled(&self) -> Vec<NodeRef> {
        self.inner.lock().scrolled.clone()
    }

    pub fn focused(&self) -> Vec<NodeRef> {
        self.inner.lock().focused.clone()
    }

    pub fn entered(&self) -> Vec<NodeRef> {
        self.inner.lock().entered.clone()
    }

    pub fn submitted(&self) -> Vec<NodeRef> {
        self.inner.lock().submitted.clone()
    }

    pub fn value_of(&self, node: NodeRef) -> Option<String> {
        self.inner
            .lock()
            .nodes
            .get(&node.0)
            .and_then(|n| n.value.clone())
    }

    fn run_hooks(&self, hooks: Vec<DomHook>) {
        for hook in hooks {
            hook(self);
        }
    }
}

#[async_trait]
impl DomPort for FakeDom {
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        let ids = inner.select(selector, None)?;
        Ok(ids.first().and_then(|id| inner.snapshot(*id)))
    }

    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<NodeRef>,
    ) -> Result<Vec<ElementHandle>, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        if let Some(scope) = scope {
            inner.attached(scope)?;
        }
        let ids = inner.select(selector, scope)?;
        Ok(ids.into_iter().filter_map(|id| inner.snapshot(id)).collect())
    }

    async fn evaluate_xpath(&self, path: &str) -> Result<Option<ElementHandle>, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        if !path.starts_with('/') {
            return Err(DomError::InvalidQuery(path.to_string()));
        }
        Ok(inner
            .xpaths
            .get(path)
            .filter(|id| inner.nodes.get(id).is_some_and(|n| n.attached))
            .and_then(|id| inner.snapshot(*id)))
    }

    async fn closest(&self, node: NodeRef, selector: &str) -> Result<Option<NodeRef>, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        inner.attached(node)?;
        let list = parse_selector_list(selector)?;
        let mut cursor = Some(node.0);
        while let Some(id) = cursor {
            let Some(entry) = inner.nodes.get(&id) else {
                break;
            };
            if list.iter().any(|compound| compound.matches(&entry.element)) {
                return Ok(Some(NodeRef(id)));
            }
            cursor = entry.parent;
        }
        Ok(None)
    }

    async fn body_text(&self) -> Result<String, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        if let Some(text) = &inner.body_override {
            return Ok(text.clone());
        }
        let roots: Vec<String> = inner
            .nodes
            .iter()
            .filter(|(_, node)| node.attached && node.parent.is_none())
            .map(|(id, _)| inner.rendered_text(*id))
            .filter(|text| !text.is_empty())
            .collect();
        Ok(roots.join("\n"))
    }

    async fn scroll_into_view(&self, node: NodeRef) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.attached(node)?;
        inner.scrolled.push(node);
        Ok(())
    }

    async fn click(&self, node: NodeRef) -> Result<(), DomError> {
        let hooks = {
            let mut inner = self.inner.lock();
            inner.check()?;
            inner.attached(node)?;
            if inner.stale_clicks > 0 {
                inner.stale_clicks -= 1;
                return Err(DomError::Detached(node));
            }
            inner.clicks.push(node);
            inner.click_hooks.get(&node.0).cloned().unwrap_or_default()
        };
        self.run_hooks(hooks);
        Ok(())
    }

    async fn focus(&self, node: NodeRef) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.attached(node)?;
        inner.focused.push(node);
        Ok(())
    }

    async fn set_value(&self, node: NodeRef, value: &str) -> Result<(), DomError> {
        let mut inner = self.inner.lock();
        inner.check()?;
        inner.attached(node)?;
        if let Some(entry) = inner.nodes.get_mut(&node.0) {
            entry.value = Some(value.to_string());
        }
        Ok(())
    }

    async fn press_enter(&self, node: NodeRef) -> Result<(), DomError> {
        let hooks = {
            let mut inner = self.inner.lock();
            inner.check()?;
            inner.attached(node)?;
            inner.entered.push(node);
            inner.submit_hooks.clone()
        };
        self.run_hooks(hooks);
        Ok(())
    }

    async fn submit_form(&self, node: NodeRef) -> Result<bool, DomError> {
        let form = self.closest(node, "form").await?;
        let Some(form) = form else {
            return Ok(false);
        };
        let hooks = {
            let mut inner = self.inner.lock();
            inner.submitted.push(form);
            inner.submit_hooks.clone()
        };
        self.run_hooks(hooks);
        Ok(true)
    }

    async fn host(&self) -> Result<String, DomError> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner.host.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SimpleSelector {
    Universal,
    Tag(String),
    Class(String),
    Id(String),
    Attr { name: String, value: Option<String> },
    Not(Compound),
}

#[derive(Debug, Clone, PartialEq)]
struct Compound(Vec<SimpleSelector>);

impl Compound {
    fn matches(&self, element: &FakeElement) -> bool {
        self.0.iter().all(|simple| simple.matches(element))
    }
}

impl SimpleSelector {
    fn matches(&self, element: &FakeElement) -> bool {
        match self {
            SimpleSelector::Universal => true,
            SimpleSelector::Tag(tag) => element.tag == *tag,
            SimpleSelector::Class(class) => element
                .attributes
                .get("class")
                .is_some_and(|list| list.split_whitespace().any(|c| c == class)),
            SimpleSelector::Id(id) => element.attributes.get("id") == Some(id),
            SimpleSelector::Attr { name, value } => match (element.attributes.get(name), value) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            },
            SimpleSelector::Not(inner) => !inner.matches(element),
        }
    }
}

fn parse_selector_list(input: &str) -> Result<Vec<Compound>, DomError> {
    let invalid = || DomError::InvalidQuery(input.to_string());
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(invalid());
    }
    parts.push(&input[start..]);
    parts
        .into_iter()
        .map(|part| parse_compound(part.trim()).ok_or_else(invalid))
        .collect()
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn parse_compound(input: &str) -> Option<Compound> {
    let chars: Vec<char> = input.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let mut pos = 0;
    let mut simples = Vec::new();

    let read_ident = |pos: &mut usize| -> Option<String> {
        let begin = *pos;
        while *pos < chars.len() && is_ident_char(chars[*pos]) {
            *pos += 1;
        }
        (*pos > begin).then(|| chars[begin..*pos].iter().collect())
    };

    if chars[0] == '*' {
        simples.push(SimpleSelector::Universal);
        pos = 1;
    } else if chars[0].is_ascii_alphabetic() {
        let tag = read_ident(&mut pos)?;
        simples.push(SimpleSelector::Tag(tag.to_ascii_lowercase()));
    }

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                simples.push(SimpleSelector::Class(read_ident(&mut pos)?));
            }
            '#' => {
                pos += 1;
                simples.push(SimpleSelector::Id(read_ident(&mut pos)?));
            }
            '[' => {
                pos += 1;
                let name = read_ident(&mut pos)?;
                let value = match chars.get(pos)? {
                    ']' => None,
                    '=' => {
                        pos += 1;
                        match chars.get(pos)? {
                            q @ ('"' | '\'') => {
                                let q = *q;
                                pos += 1;
                                let begin = pos;
                                while pos < chars.len() && chars[pos] != q {
                                    pos += 1;
                                }
                                let value: String = chars.get(begin..pos)?.iter().collect();
                                pos += 1;
                                Some(value)
                            }
                            _ => Some(read_ident(&mut pos)?),
                        }
                    }
                    _ => return None,
                };
                if chars.get(pos) != Some(&']') {
                    return None;
                }
                pos += 1;
                simples.push(SimpleSelector::Attr { name, value });
            }
            ':' => {
                let rest: String = chars[pos..].iter().collect();
                if !rest.starts_with(":not(") {
                    return None;
                }
                pos += ":not(".len();
                let begin = pos;
                let mut depth = 1;
                while pos < chars.len() {
                    match chars[pos] {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    pos += 1;
                }
                if depth != 0 {
                    return None;
                }
                let inner: String = chars[begin..pos].iter().collect();
                simples.push(SimpleSelector::Not(parse_compound(inner.trim())?));
                pos += 1;
            }
            _ => return None,
        }
    }

    (!simples.is_empty()).then_some(Compound(simples))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_subset_matches() {
        let dom = FakeDom::new();
        let form = dom.append(None, FakeElement::new("form"));
        let input = dom.append(
            Some(form),
            FakeElement::input("text").attr("placeholder", "Invite code"),
        );
        dom.append(Some(form), FakeElement::input("hidden"));
        let copy = dom.append(
            None,
            FakeElement::button("Copy").class("btn copy-btn").attr("data-role", "copy-code"),
        );

        let found = tokio_test::block_on(
            dom.query_selector_all("input:not([type=\"hidden\"]), textarea", None),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, input);

        let by_attr =
            tokio_test::block_on(dom.query_selector("button[data-role='copy-code']")).unwrap();
        assert_eq!(by_attr.map(|h| h.node), Some(copy));
        let by_class = tokio_test::block_on(dom.query_selector("button.copy-btn")).unwrap();
        assert_eq!(by_class.map(|h| h.node), Some(copy));

        let scoped =
            tokio_test::block_on(dom.query_selector_all("input", Some(form))).unwrap();
        assert_eq!(scoped.len(), 2);
        assert_eq!(
            tokio_test::block_on(dom.closest(input, "form")).unwrap(),
            Some(form)
        );
    }

    #[test]
    fn unsupported_syntax_is_invalid_query() {
        let dom = FakeDom::new();
        for selector in ["div > span", "button[data-role=", "a:hover", ""] {
            let err = tokio_test::block_on(dom.query_selector(selector)).unwrap_err();
            assert!(err.is_query_error(), "{selector}");
        }
    }

    #[test]
    fn removed_nodes_are_detached() {
        let dom = FakeDom::new();
        let section = dom.append(None, FakeElement::new("section").text("Welcome"));
        let button = dom.append(Some(section), FakeElement::button("Go"));
        assert_eq!(tokio_test::block_on(dom.body_text()).unwrap(), "Welcome\nGo");

        dom.remove(section);
        assert_eq!(
            tokio_test::block_on(dom.click(button)).unwrap_err(),
            DomError::Detached(button)
        );
        assert!(tokio_test::block_on(dom.body_text()).unwrap().is_empty());
    }

    #[test]
    fn hooks_run_after_interaction() {
        let dom = FakeDom::new();
        let status = dom.append(None, FakeElement::new("p").text("Waiting"));
        let button = dom.append(None, FakeElement::button("Submit"));
        dom.on_click(
            button,
            Arc::new(move |dom: &FakeDom| dom.set_text(status, "Access granted")),
        );
        tokio_test::block_on(dom.click(button)).unwrap();
        assert!(tokio_test::block_on(dom.body_text())
            .unwrap()
            .contains("Access granted"));
    }
}
