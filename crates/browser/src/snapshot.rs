//! Simplified page tree and interactive-element classification.
//!
//! Turns the raw collected tree into the compact outline the agent reasons
//! over, in three passes: build the simplified tree, prune dead branches,
//! assign interactive refs (e1, e2, ...).
//!
//! Job boards render radio groups, checkboxes and file pickers as styled
//! custom controls layered over the native input, which layout reports as
//! hidden. Those inputs must stay visible and selectable or multi-step
//! application forms become dead ends, so every pass carries an exception
//! for them.

use crate::dom::RawNode;
use crate::safe_truncate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Non-content elements never worth showing to the agent.
const DISABLED_ELEMENTS: &[&str] = &["style", "script", "head", "meta", "link", "title"];

/// SVG internals. The <svg> host itself may be kept, its guts never.
const SVG_ELEMENTS: &[&str] = &[
    "path", "rect", "g", "circle", "ellipse", "line", "polyline", "polygon",
    "use", "defs", "clippath", "mask", "pattern", "tspan",
];

/// Tags that are interactive by nature.
const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "option", "summary", "label",
];

/// ARIA roles considered interactive.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "textbox", "searchbox", "combobox", "listbox",
    "menuitem", "menuitemcheckbox", "menuitemradio", "option",
    "radio", "checkbox", "switch", "slider", "spinbutton",
    "tab", "treeitem", "gridcell",
];

/// Attribute that opts an element (and its subtree) out of snapshots.
const EXCLUDE_ATTR: &str = "data-agent-exclude";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Fragment,
}

/// A kept node of the simplified tree.
#[derive(Debug, Clone)]
pub struct SimplifiedNode {
    pub kind: NodeKind,
    pub tag: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Raw layout visibility; the input exception is applied at use sites,
    /// not folded in here.
    pub visible: bool,
    pub scrollable: bool,
    pub node_id: i64,
    pub is_shadow_host: bool,
    pub children: Vec<SimplifiedNode>,
    pub ref_id: Option<String>,
    /// Interactive and absent from the previous snapshot.
    pub is_new: bool,
}

/// What a snapshot ref points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefEntry {
    /// Stable in-page handle id.
    pub node_id: i64,
    pub tag: String,
    pub label: String,
}

/// The rendered snapshot plus its ref map.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub text: String,
    pub refs: HashMap<String, RefEntry>,
}

/// Native inputs that styled custom controls hide while keeping functional.
/// These stay visible and selectable regardless of what layout reports.
fn input_visibility_exempt(tag: &str, attributes: &HashMap<String, String>) -> bool {
    tag == "input"
        && matches!(
            attributes.get("type").map(|s| s.as_str()),
            Some("file") | Some("radio") | Some("checkbox")
        )
}

// ─── Pass 1: build ────────────────────────────────────────────────────

/// Build the simplified tree from the raw collected tree.
pub fn build_simplified_tree(raw: &RawNode) -> Option<SimplifiedNode> {
    match raw.kind.as_str() {
        "document" => {
            for child in &raw.children {
                if let Some(simplified) = build_simplified_tree(child) {
                    return Some(simplified);
                }
            }
            None
        }
        "fragment" => {
            let children: Vec<SimplifiedNode> = raw
                .children
                .iter()
                .filter_map(build_simplified_tree)
                .collect();
            Some(SimplifiedNode {
                kind: NodeKind::Fragment,
                tag: String::new(),
                text: String::new(),
                attributes: HashMap::new(),
                visible: raw.visible,
                scrollable: false,
                node_id: 0,
                is_shadow_host: false,
                children,
                ref_id: None,
                is_new: false,
            })
        }
        "element" => {
            let tag = raw.tag.as_str();
            if DISABLED_ELEMENTS.contains(&tag) || SVG_ELEMENTS.contains(&tag) {
                return None;
            }
            if raw.attr(EXCLUDE_ATTR) == Some("true") {
                return None;
            }

            let is_shadow_host = raw.children.iter().any(|c| c.kind == "fragment");

            if tag == "iframe" || tag == "frame" {
                let children: Vec<SimplifiedNode> = raw
                    .children
                    .iter()
                    .filter_map(build_simplified_tree)
                    .collect();
                return Some(element_node(raw, children, is_shadow_host));
            }

            let mut visible = raw.visible;
            if !visible && input_visibility_exempt(tag, &raw.attributes) {
                visible = true;
            }
            let has_raw_children = !raw.children.is_empty();

            if visible || raw.scrollable || has_raw_children || is_shadow_host {
                let children: Vec<SimplifiedNode> = raw
                    .children
                    .iter()
                    .filter_map(build_simplified_tree)
                    .collect();
                let node = element_node(raw, children, is_shadow_host);
                if is_shadow_host && !node.children.is_empty() {
                    return Some(node);
                }
                if visible || raw.scrollable || !node.children.is_empty() {
                    return Some(node);
                }
            }
            None
        }
        "text" => {
            let trimmed = raw.text.trim();
            if raw.visible && trimmed.len() > 1 {
                Some(SimplifiedNode {
                    kind: NodeKind::Text,
                    tag: String::new(),
                    text: trimmed.to_string(),
                    attributes: HashMap::new(),
                    visible: true,
                    scrollable: false,
                    node_id: 0,
                    is_shadow_host: false,
                    children: Vec::new(),
                    ref_id: None,
                    is_new: false,
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn element_node(raw: &RawNode, children: Vec<SimplifiedNode>, is_shadow_host: bool) -> SimplifiedNode {
    SimplifiedNode {
        kind: NodeKind::Element,
        tag: raw.tag.clone(),
        text: String::new(),
        attributes: raw.attributes.clone(),
        visible: raw.visible,
        scrollable: raw.scrollable,
        node_id: raw.node_id,
        is_shadow_host,
        children,
        ref_id: None,
        is_new: false,
    }
}

// ─── Pass 2: prune ────────────────────────────────────────────────────

/// Drop branches that carry nothing: invisible, non-scrollable elements with
/// no surviving children, unless they are exempt inputs.
pub fn prune_tree(mut node: SimplifiedNode) -> Option<SimplifiedNode> {
    let children = std::mem::take(&mut node.children);
    node.children = children.into_iter().filter_map(prune_tree).collect();

    let exempt = input_visibility_exempt(&node.tag, &node.attributes);

    if node.visible
        || exempt
        || node.scrollable
        || node.kind == NodeKind::Text
        || !node.children.is_empty()
    {
        Some(node)
    } else {
        None
    }
}

// ─── Pass 3: refs ─────────────────────────────────────────────────────

fn is_interactive_element(node: &SimplifiedNode) -> bool {
    if node.kind != NodeKind::Element {
        return false;
    }
    if node.tag == "input" && node.attributes.get("type").map(|s| s.as_str()) == Some("hidden") {
        return false;
    }
    if INTERACTIVE_TAGS.contains(&node.tag.as_str()) {
        return true;
    }
    if let Some(role) = node.attributes.get("role") {
        if INTERACTIVE_ROLES.contains(&role.to_lowercase().as_str()) {
            return true;
        }
    }
    if node.attributes.contains_key("onclick") {
        return true;
    }
    if let Some(tabindex) = node.attributes.get("tabindex") {
        if tabindex.parse::<i32>().map(|v| v >= 0).unwrap_or(false) {
            return true;
        }
    }
    node.attributes.get("contenteditable").map(|s| s.as_str()) == Some("true")
}

fn is_dropdown_scrollable(node: &SimplifiedNode) -> bool {
    let role = node
        .attributes
        .get("role")
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    if matches!(role.as_str(), "listbox" | "menu" | "combobox") {
        return true;
    }
    if node.tag == "select" {
        return true;
    }
    node.attributes
        .get("class")
        .map(|c| c.to_lowercase().contains("dropdown"))
        .unwrap_or(false)
}

fn has_interactive_descendants(node: &SimplifiedNode) -> bool {
    node.children
        .iter()
        .any(|c| is_interactive_element(c) || has_interactive_descendants(c))
}

/// Walk the kept tree assigning refs to interactive nodes and recording them
/// in the ref map. Nodes absent from `previous_ids` are marked new.
pub fn assign_interactive_refs(
    node: &mut SimplifiedNode,
    counter: &mut u32,
    refs: &mut HashMap<String, RefEntry>,
    previous_ids: &HashSet<i64>,
) {
    let exempt = input_visibility_exempt(&node.tag, &node.attributes);

    let should_make_interactive = if node.scrollable {
        // Scrollable containers become targets when they are dropdown-like,
        // or when nothing inside them would be individually actionable.
        is_dropdown_scrollable(node) || !has_interactive_descendants(node)
    } else {
        is_interactive_element(node) && (node.visible || exempt)
    };

    if should_make_interactive && node.node_id != 0 {
        *counter += 1;
        let ref_id = format!("e{}", counter);
        node.ref_id = Some(ref_id.clone());
        // Only meaningful once a previous snapshot exists; the first
        // snapshot of a page marks nothing as new.
        node.is_new = !previous_ids.is_empty() && !previous_ids.contains(&node.node_id);
        refs.insert(
            ref_id,
            RefEntry {
                node_id: node.node_id,
                tag: node.tag.clone(),
                label: accessible_label(node),
            },
        );
    }

    for child in node.children.iter_mut() {
        assign_interactive_refs(child, counter, refs, previous_ids);
    }
}

// ─── Rendering ────────────────────────────────────────────────────────

fn accessible_label(node: &SimplifiedNode) -> String {
    for key in ["aria-label", "placeholder", "title", "alt", "name"] {
        if let Some(v) = node.attributes.get(key) {
            if !v.trim().is_empty() {
                return v.trim().to_string();
            }
        }
    }
    // Fall back to the first text child.
    for child in &node.children {
        if child.kind == NodeKind::Text {
            return child.text.clone();
        }
    }
    String::new()
}

/// Render the simplified tree as an indented outline for the LLM.
pub fn render_tree(node: &SimplifiedNode, max_depth: usize) -> String {
    let mut output = String::new();
    render_node(&mut output, node, 0, max_depth);
    output
}

fn render_node(output: &mut String, node: &SimplifiedNode, indent: usize, max_depth: usize) {
    if indent > max_depth {
        return;
    }

    match node.kind {
        NodeKind::Fragment => {
            // Structural only; render children at the same depth.
            for child in &node.children {
                render_node(output, child, indent, max_depth);
            }
            return;
        }
        NodeKind::Text => {
            let text = if node.text.len() > 80 {
                format!("{}...", safe_truncate(&node.text, 77))
            } else {
                node.text.clone()
            };
            output.push_str(&format!("{}- text \"{}\"\n", "  ".repeat(indent), text));
            return;
        }
        NodeKind::Element => {}
    }

    // Containers with nothing to say are skipped; children move up a level.
    let label = accessible_label(node);
    let interesting = node.ref_id.is_some()
        || node.scrollable
        || !label.is_empty()
        || is_interactive_element(node);
    if !interesting {
        for child in &node.children {
            render_node(output, child, indent, max_depth);
        }
        return;
    }

    let mut line = format!("{}- {}", "  ".repeat(indent), node.tag);
    if let Some(input_type) = node.attributes.get("type") {
        if node.tag == "input" {
            line.push_str(&format!("[type={}]", input_type));
        }
    }
    if !label.is_empty() {
        let label = if label.len() > 80 {
            format!("{}...", safe_truncate(&label, 77))
        } else {
            label.clone()
        };
        line.push_str(&format!(" \"{}\"", label));
    }
    if let Some(ref ref_id) = node.ref_id {
        line.push_str(&format!(" [ref={}]", ref_id));
    }
    if node.is_new {
        line.push_str(" [new]");
    }
    if node.attributes.get("checked").map(|s| s.as_str()) == Some("true") {
        line.push_str(" [checked]");
    }
    if node.attributes.contains_key("disabled") {
        line.push_str(" [disabled]");
    }
    if node.scrollable {
        line.push_str(" [scrollable]");
    }
    if let Some(value) = node.attributes.get("value") {
        if !value.is_empty() && *value != label {
            let value = if value.len() > 60 {
                format!("{}...", safe_truncate(value, 57))
            } else {
                value.clone()
            };
            line.push_str(&format!(" value=\"{}\"", value));
        }
    }

    output.push_str(&line);
    output.push('\n');

    for child in &node.children {
        render_node(output, child, indent + 1, max_depth);
    }
}

/// Run the full pipeline over a raw tree.
pub fn snapshot_from_raw(
    raw: &RawNode,
    previous_ids: &HashSet<i64>,
    max_depth: usize,
) -> PageSnapshot {
    let mut refs = HashMap::new();
    let mut counter = 0u32;

    let tree = build_simplified_tree(raw).and_then(prune_tree);
    let text = match tree {
        Some(mut tree) => {
            assign_interactive_refs(&mut tree, &mut counter, &mut refs, previous_ids);
            render_tree(&tree, max_depth)
        }
        None => String::new(),
    };

    PageSnapshot { text, refs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: &str, attrs: &[(&str, &str)], visible: bool, node_id: i64, children: Vec<RawNode>) -> RawNode {
        RawNode {
            kind: "element".to_string(),
            tag: tag.to_string(),
            text: String::new(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            visible,
            scrollable: false,
            node_id,
            children,
        }
    }

    fn text(content: &str, visible: bool) -> RawNode {
        RawNode {
            kind: "text".to_string(),
            text: content.to_string(),
            visible,
            ..Default::default()
        }
    }

    fn document(children: Vec<RawNode>) -> RawNode {
        RawNode {
            kind: "document".to_string(),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn test_hidden_radio_input_is_kept_and_ref_assigned() {
        // LinkedIn-style custom radio: the native input is layout-hidden,
        // the visible label is a sibling.
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![element(
                "fieldset",
                &[],
                true,
                2,
                vec![
                    element("input", &[("type", "radio"), ("name", "workAuth")], false, 3, vec![]),
                    element("label", &[], true, 4, vec![text("Yes", true)]),
                ],
            )],
        )]);

        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        let radio = snapshot
            .refs
            .values()
            .find(|r| r.tag == "input")
            .expect("hidden radio should receive a ref");
        assert_eq!(radio.node_id, 3);
        assert!(snapshot.text.contains("input[type=radio]"));
    }

    #[test]
    fn test_hidden_checkbox_and_file_inputs_survive() {
        for input_type in ["checkbox", "file"] {
            let raw = document(vec![element(
                "body",
                &[],
                true,
                1,
                vec![element("input", &[("type", input_type)], false, 2, vec![])],
            )]);
            let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
            assert_eq!(
                snapshot.refs.len(),
                1,
                "hidden {} input should be selectable",
                input_type
            );
        }
    }

    #[test]
    fn test_hidden_text_input_is_dropped() {
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![element("input", &[("type", "text")], false, 2, vec![])],
        )]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(snapshot.refs.is_empty());
    }

    #[test]
    fn test_invisible_container_with_no_content_is_pruned() {
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![element(
                "div",
                &[],
                false,
                2,
                vec![element("span", &[], false, 3, vec![])],
            )],
        )]);
        let tree = build_simplified_tree(&raw).and_then(prune_tree).unwrap();
        // body survives, the invisible div/span branch does not.
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_script_and_svg_internals_skipped() {
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![
                element("script", &[], true, 2, vec![]),
                element("svg", &[], true, 3, vec![element("path", &[], true, 4, vec![])]),
                element("button", &[], true, 5, vec![text("Apply", true)]),
            ],
        )]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(!snapshot.text.contains("script"));
        assert!(!snapshot.text.contains("path"));
        assert!(snapshot.refs.values().any(|r| r.tag == "button"));
    }

    #[test]
    fn test_exclusion_attribute_drops_subtree() {
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![element(
                "div",
                &[("data-agent-exclude", "true")],
                true,
                2,
                vec![element("button", &[], true, 3, vec![])],
            )],
        )]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(snapshot.refs.is_empty());
    }

    #[test]
    fn test_new_nodes_marked_against_previous_snapshot() {
        let make_raw = |with_modal: bool| {
            let mut children = vec![element("button", &[("aria-label", "Easy Apply")], true, 2, vec![])];
            if with_modal {
                children.push(element("button", &[("aria-label", "Next")], true, 9, vec![]));
            }
            document(vec![element("body", &[], true, 1, children)])
        };

        let first = snapshot_from_raw(&make_raw(false), &HashSet::new(), 20);
        let previous_ids: HashSet<i64> = first.refs.values().map(|r| r.node_id).collect();

        let second = snapshot_from_raw(&make_raw(true), &previous_ids, 20);
        // The modal button appeared after the click: it is new, the other is not.
        assert!(second.text.contains("\"Next\" [ref=e2] [new]") || second.text.contains("[new]"));
        let new_count = second.text.matches("[new]").count();
        assert_eq!(new_count, 1);
    }

    #[test]
    fn test_shadow_root_content_is_walked() {
        let shadow = RawNode {
            kind: "fragment".to_string(),
            visible: true,
            children: vec![element("button", &[("aria-label", "Submit")], true, 7, vec![])],
            ..Default::default()
        };
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![element("custom-widget", &[], true, 2, vec![shadow])],
        )]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(snapshot.refs.values().any(|r| r.label == "Submit"));
    }

    #[test]
    fn test_render_outline_shape() {
        let raw = document(vec![element(
            "body",
            &[],
            true,
            1,
            vec![
                element("h1", &[], true, 2, vec![text("Software Engineer", true)]),
                element("button", &[("aria-label", "Easy Apply")], true, 3, vec![]),
            ],
        )]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(snapshot.text.contains("- text \"Software Engineer\""));
        assert!(snapshot.text.contains("- button \"Easy Apply\" [ref=e1]"));
    }

    #[test]
    fn test_dropdown_scrollable_gets_ref() {
        let mut listbox = element(
            "div",
            &[("role", "listbox")],
            true,
            4,
            vec![text("Option A", true)],
        );
        listbox.scrollable = true;
        let raw = document(vec![element("body", &[], true, 1, vec![listbox])]);
        let snapshot = snapshot_from_raw(&raw, &HashSet::new(), 20);
        assert!(snapshot.refs.values().any(|r| r.node_id == 4));
    }
}
