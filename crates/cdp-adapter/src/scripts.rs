//! Page-side scripts behind [`ChromiumDom`](crate::ChromiumDom) and
//! [`ChromiumClipboard`](crate::ChromiumClipboard).
//!
//! Every script is a self-contained IIFE returning a JSON string shaped as
//! `{"ok": value}` or `{"err": {"kind": ..., "message": ...}}`. Elements are
//! addressed across calls through a `data-relay-node` attribute assigned on
//! first sight.

use action_locator::{DomError, NodeRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Attribute carrying the node number.
pub const NODE_ATTR: &str = "data-relay-node";

const PRELUDE: &str = r#"
  const ok = (value) => JSON.stringify({ ok: value === undefined ? null : value });
  const fail = (kind, message) => JSON.stringify({ err: { kind, message: String(message) } });
  const ATTRS = ['placeholder', 'name', 'id', 'aria-label', 'role', 'type', 'class',
    'data-placeholder', 'data-clipboard-text', 'data-role'];
  const nodeOf = (id) => document.querySelector('[data-relay-node="' + id + '"]');
  const describe = (el) => {
    let id = el.getAttribute('data-relay-node');
    if (!id) {
      window.__relayNodeSeq = (window.__relayNodeSeq || 0) + 1;
      id = String(window.__relayNodeSeq);
      el.setAttribute('data-relay-node', id);
    }
    const attributes = {};
    for (const name of ATTRS) {
      const value = el.getAttribute(name);
      if (value !== null) attributes[name] = value;
    }
    let labelText = null;
    if (el.id) {
      const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (label) labelText = (label.innerText || label.textContent || '').trim();
    }
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    const clickable = typeof el.click === 'function' && style.pointerEvents !== 'none' && !el.disabled;
    return {
      node: Number(id),
      tag: el.tagName.toLowerCase(),
      text: (el.innerText || el.textContent || '').trim(),
      labelText,
      attributes,
      width: rect.width,
      height: rect.height,
      clickable,
    };
  };
"#;

fn wrap(body: &str) -> String {
    format!(
        "(() => {{{PRELUDE}\n  try {{\n{body}\n  }} catch (error) {{\n    return fail('script', error && error.message ? error.message : error);\n  }}\n}})()"
    )
}

fn literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn scope_literal(scope: Option<NodeRef>) -> String {
    scope.map_or_else(|| "null".to_string(), |node| node.0.to_string())
}

/// Body that resolves `node` into `el` or bails out as detached.
fn with_node(node: NodeRef, rest: &str) -> String {
    wrap(&format!(
        "    const el = nodeOf({id});\n    if (!el || !el.isConnected) return fail('detached', {id});\n{rest}",
        id = node.0
    ))
}

pub fn query_all(selector: &str, scope: Option<NodeRef>) -> String {
    wrap(&format!(
        r#"    const scope = {scope};
    const root = scope === null ? document : nodeOf(scope);
    if (!root) return fail('detached', scope);
    let found;
    try {{
      found = root.querySelectorAll({selector});
    }} catch (error) {{
      return fail('query', {selector});
    }}
    return ok(Array.from(found).map(describe));"#,
        scope = scope_literal(scope),
        selector = literal(selector),
    ))
}

pub fn query_first(selector: &str) -> String {
    wrap(&format!(
        r#"    let found;
    try {{
      found = document.querySelector({selector});
    }} catch (error) {{
      return fail('query', {selector});
    }}
    return ok(found ? describe(found) : null);"#,
        selector = literal(selector),
    ))
}

pub fn xpath_first(path: &str) -> String {
    wrap(&format!(
        r#"    let found;
    try {{
      found = document.evaluate({path}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    }} catch (error) {{
      return fail('query', {path});
    }}
    return ok(found && found.nodeType === Node.ELEMENT_NODE ? describe(found) : null);"#,
        path = literal(path),
    ))
}

pub fn closest(node: NodeRef, selector: &str) -> String {
    with_node(
        node,
        &format!(
            r#"    let found;
    try {{
      found = el.closest({selector});
    }} catch (error) {{
      return fail('query', {selector});
    }}
    return ok(found ? describe(found).node : null);"#,
            selector = literal(selector),
        ),
    )
}

pub fn body_text() -> String {
    wrap("    return ok(document.body ? (document.body.innerText || document.body.textContent || '') : '');")
}

pub fn host() -> String {
    wrap("    return ok(window.location.hostname || '');")
}

pub fn ready_state() -> String {
    wrap("    return ok(document.readyState);")
}

pub fn scroll_into_view(node: NodeRef) -> String {
    with_node(
        node,
        "    el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'auto' });\n    return ok(null);",
    )
}

pub fn click(node: NodeRef) -> String {
    with_node(node, "    el.click();\n    return ok(null);")
}

pub fn focus(node: NodeRef) -> String {
    with_node(node, "    el.focus();\n    return ok(null);")
}

pub fn set_value(node: NodeRef, value: &str) -> String {
    with_node(
        node,
        &format!(
            r#"    const value = {value};
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
    if (descriptor && descriptor.set && el instanceof proto.constructor) {{
      descriptor.set.call(el, value);
    }} else {{
      el.value = value;
    }}
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    if (typeof el.setSelectionRange === 'function') {{
      try {{ el.setSelectionRange(value.length, value.length); }} catch (_) {{}}
    }}
    return ok(null);"#,
            value = literal(value),
        ),
    )
}

pub fn press_enter(node: NodeRef) -> String {
    with_node(
        node,
        r#"    const init = { key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true };
    for (const type of ['keydown', 'keypress', 'keyup']) {
      el.dispatchEvent(new KeyboardEvent(type, init));
    }
    return ok(null);"#,
    )
}

pub fn submit_form(node: NodeRef) -> String {
    with_node(
        node,
        r#"    const form = el.form || el.closest('form');
    if (!form) return ok(false);
    form.dispatchEvent(new Event('submit', { bubbles: true, cancelable: true }));
    if (typeof form.submit === 'function') form.submit();
    return ok(true);"#,
    )
}

pub fn install_clipboard_hook() -> String {
    wrap(
        r#"    if (window.__relayClipboardHookInstalled) return ok(false);
    if (!navigator.clipboard || typeof navigator.clipboard.writeText !== 'function') {
      return fail('script', 'clipboard api unavailable');
    }
    window.__relayClipboardHookInstalled = true;
    const original = navigator.clipboard.writeText.bind(navigator.clipboard);
    navigator.clipboard.writeText = async function (text) {
      window.__relayLastCopied = { text: String(text), copiedAt: Date.now() };
      return original(text);
    };
    return ok(true);"#,
    )
}

pub fn last_copied() -> String {
    wrap("    return ok(window.__relayLastCopied || null);")
}

#[derive(Deserialize)]
struct ScriptFailure {
    kind: String,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum Envelope<T> {
    Ok(T),
    Err(ScriptFailure),
}

/// Decode a script result into `T` or the matching [`DomError`].
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, DomError> {
    let envelope: Envelope<T> = serde_json::from_str(raw)
        .map_err(|err| DomError::Script(format!("malformed script result: {err}")))?;
    match envelope {
        Envelope::Ok(value) => Ok(value),
        Envelope::Err(failure) => Err(match failure.kind.as_str() {
            "query" => DomError::InvalidQuery(failure.message),
            "detached" => DomError::Detached(NodeRef(failure.message.parse().unwrap_or_default())),
            _ => DomError::Script(failure.message),
        }),
    }
}
