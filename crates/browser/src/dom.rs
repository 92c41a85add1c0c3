//! Raw page-element tree collection.
//!
//! A script evaluated in the page walks the DOM (elements, shadow roots,
//! same-origin iframes, text nodes) and returns a JSON tree with per-node
//! layout visibility and scrollability. Elements are registered in a
//! window-scoped handle table under a stable id, so later actions can resolve
//! a snapshot ref back to the live element.
//!
//! The collector reports what layout says; deciding which nodes the agent
//! should see is the snapshot pipeline's job.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle table used by the collector and by action resolution.
pub const NODE_REGISTRY: &str = "window.__jpNodes";

/// One node of the collected tree, exactly as the page script reports it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawNode {
    /// "document" | "fragment" | "element" | "text"
    pub kind: String,
    /// Lowercased tag name (elements only).
    pub tag: String,
    /// Trimmed text content (text nodes only).
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Layout visibility: rendered, non-transparent, non-empty client rect.
    pub visible: bool,
    pub scrollable: bool,
    /// Stable in-page handle id (elements only, 0 otherwise).
    pub node_id: i64,
    pub children: Vec<RawNode>,
}

/// The collector script. Returns the raw tree for the whole document.
pub const COLLECTOR_JS: &str = r#"
(() => {
    if (!window.__jpNodes) { window.__jpNodes = {}; window.__jpNextId = 0; }
    const MAX_DEPTH = 48;
    const ATTR_VALUE_LIMIT = 250;

    function register(el) {
        if (!el.__jpId) { el.__jpId = ++window.__jpNextId; }
        window.__jpNodes[el.__jpId] = el;
        return el.__jpId;
    }

    function isVisible(el, style) {
        if (style.display === 'none' || style.visibility === 'hidden') return false;
        if (parseFloat(style.opacity || '1') === 0) return false;
        const rect = el.getBoundingClientRect();
        return rect.width > 0.5 && rect.height > 0.5;
    }

    function isScrollable(el, style) {
        const oy = style.overflowY, ox = style.overflowX;
        const declared = oy === 'auto' || oy === 'scroll' || ox === 'auto' || ox === 'scroll';
        if (!declared) return false;
        return el.scrollHeight > el.clientHeight + 1 || el.scrollWidth > el.clientWidth + 1;
    }

    function collectAttributes(el) {
        const out = {};
        for (const attr of el.attributes) {
            let v = attr.value;
            if (v.length > ATTR_VALUE_LIMIT) v = v.slice(0, ATTR_VALUE_LIMIT);
            out[attr.name] = v;
        }
        if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT') {
            if (el.value !== undefined && el.value !== null && String(el.value).length <= ATTR_VALUE_LIMIT) {
                out['value'] = String(el.value);
            }
            if (el.checked) out['checked'] = 'true';
        }
        return out;
    }

    function walkChildren(node, parentVisible, depth) {
        const out = [];
        for (const child of node.childNodes) {
            const walked = walk(child, parentVisible, depth + 1);
            if (walked) out.push(walked);
        }
        return out;
    }

    function walk(node, parentVisible, depth) {
        if (depth > MAX_DEPTH) return null;

        if (node.nodeType === Node.TEXT_NODE) {
            const text = (node.nodeValue || '').trim();
            if (!text) return null;
            return { kind: 'text', text: text, visible: parentVisible };
        }

        if (node.nodeType !== Node.ELEMENT_NODE) return null;

        const el = node;
        const style = window.getComputedStyle(el);
        const visible = isVisible(el, style);
        const raw = {
            kind: 'element',
            tag: el.tagName.toLowerCase(),
            attributes: collectAttributes(el),
            visible: visible,
            scrollable: isScrollable(el, style),
            nodeId: register(el),
            children: [],
        };

        if ((el.tagName === 'IFRAME' || el.tagName === 'FRAME')) {
            try {
                if (el.contentDocument && el.contentDocument.body) {
                    raw.children = walkChildren(el.contentDocument.body, visible, depth);
                }
            } catch (e) { /* cross-origin */ }
            return raw;
        }

        raw.children = walkChildren(el, visible, depth);

        if (el.shadowRoot) {
            raw.children.push({
                kind: 'fragment',
                visible: visible,
                children: walkChildren(el.shadowRoot, visible, depth),
            });
        }

        return raw;
    }

    const root = document.documentElement
        ? walk(document.documentElement, true, 1)
        : null;
    return { kind: 'document', children: root ? [root] : [] };
})()
"#;

impl RawNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_node_deserializes_collector_shape() {
        let json = serde_json::json!({
            "kind": "document",
            "children": [{
                "kind": "element",
                "tag": "html",
                "attributes": {},
                "visible": true,
                "scrollable": false,
                "nodeId": 1,
                "children": [
                    {"kind": "text", "text": "Hello", "visible": true}
                ]
            }]
        });

        let node: RawNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.kind, "document");
        assert_eq!(node.children[0].tag, "html");
        assert_eq!(node.children[0].node_id, 1);
        assert_eq!(node.children[0].children[0].text, "Hello");
        // Fields absent from the JSON default cleanly.
        assert_eq!(node.children[0].children[0].node_id, 0);
    }
}
