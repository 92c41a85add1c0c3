//! Page actions executed against a Chrome session.
//!
//! Elements are addressed either by a snapshot ref (resolved through the
//! in-page handle table) or by CSS selector (used by the scripted login,
//! which runs before any snapshot exists).

use crate::chrome::ChromeSession;
use crate::dom::{RawNode, COLLECTOR_JS, NODE_REGISTRY};
use crate::snapshot::{snapshot_from_raw, PageSnapshot};
use crate::safe_truncate;
use jobpilot_core::{Error, Result};
use serde_json::{json, Value};
use tracing::debug;

/// Element addressing for click/fill/upload.
#[derive(Debug, Clone)]
pub enum Target {
    Ref(String),
    Selector(String),
}

impl Target {
    /// Resolve from tool-call arguments: `ref` wins over `selector`.
    pub fn from_args(args: &Value) -> Result<Target> {
        if let Some(r) = args.get("ref").and_then(|v| v.as_str()) {
            return Ok(Target::Ref(r.trim_start_matches('@').to_string()));
        }
        if let Some(s) = args.get("selector").and_then(|v| v.as_str()) {
            return Ok(Target::Selector(s.to_string()));
        }
        Err(Error::Validation(
            "action requires 'ref' (from snapshot) or 'selector' (CSS)".to_string(),
        ))
    }
}

/// Navigate and give the page time to settle.
pub async fn navigate(session: &mut ChromeSession, url: &str, settle_ms: u64) -> Result<()> {
    session.cdp.navigate(url).await?;
    session.current_url = Some(url.to_string());
    tokio::time::sleep(std::time::Duration::from_millis(settle_ms)).await;
    Ok(())
}

/// Collect the page tree and run the simplification pipeline. Updates the
/// session's ref map and previous-snapshot ids.
pub async fn snapshot(session: &mut ChromeSession, max_depth: usize) -> Result<PageSnapshot> {
    let result = session.cdp.evaluate_js(COLLECTOR_JS).await?;
    let value = result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .ok_or_else(|| Error::Browser("page collector returned nothing".to_string()))?;
    let raw: RawNode = serde_json::from_value(value)?;

    let previous_ids = std::mem::take(&mut session.previous_node_ids);
    let snap = snapshot_from_raw(&raw, &previous_ids, max_depth);

    session.previous_node_ids = snap.refs.values().map(|r| r.node_id).collect();
    session.refs = snap.refs.clone();
    debug!(refs = snap.refs.len(), "Page snapshot taken");
    Ok(snap)
}

pub async fn current_url(session: &ChromeSession) -> Result<String> {
    let result = session.cdp.evaluate_js("window.location.href").await?;
    Ok(result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string())
}

/// Visible page text, truncated.
pub async fn page_text(session: &ChromeSession, max_chars: usize) -> Result<String> {
    let result = session
        .cdp
        .evaluate_js("document.body ? document.body.innerText : ''")
        .await?;
    let text = result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if text.len() > max_chars {
        Ok(format!(
            "{}...\n[truncated, {} total chars]",
            safe_truncate(text, max_chars),
            text.len()
        ))
    } else {
        Ok(text.to_string())
    }
}

/// Resolve a snapshot ref to a remote object id via the handle table.
async fn resolve_ref(session: &ChromeSession, ref_id: &str) -> Result<String> {
    let entry = session
        .refs
        .get(ref_id)
        .ok_or_else(|| Error::NotFound(format!("ref '{}' not in snapshot; take a new snapshot", ref_id)))?;
    session
        .cdp
        .evaluate_object(&format!("{}[{}]", NODE_REGISTRY, entry.node_id))
        .await
        .map_err(|_| {
            Error::NotFound(format!(
                "ref '{}' ({} \"{}\") went stale; take a new snapshot",
                ref_id, entry.tag, entry.label
            ))
        })
}

pub async fn click(session: &mut ChromeSession, target: &Target) -> Result<()> {
    match target {
        Target::Ref(ref_id) => {
            let object_id = resolve_ref(session, ref_id).await?;
            click_object(session, &object_id).await?;
        }
        Target::Selector(selector) => {
            click_by_selector(session, selector).await?;
        }
    }
    // Brief wait for UI update.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    Ok(())
}

/// Click a remote element: mouse events at the box-model center when the
/// element has layout, element.click() otherwise. Layout-hidden inputs
/// (custom radio/checkbox/file controls) only respond to the second path.
async fn click_object(session: &ChromeSession, object_id: &str) -> Result<()> {
    if let Ok(bm) = session.cdp.get_box_model(object_id).await {
        let (x, y) = extract_center_from_box_model(&bm);
        if x > 0.0 && y > 0.0 {
            session
                .cdp
                .call_function_on(object_id, "function() { this.scrollIntoViewIfNeeded ? this.scrollIntoViewIfNeeded() : this.scrollIntoView({block: 'center'}); }")
                .await?;
            session
                .cdp
                .dispatch_mouse_event("mousePressed", x, y, "left", 1)
                .await?;
            session
                .cdp
                .dispatch_mouse_event("mouseReleased", x, y, "left", 1)
                .await?;
            return Ok(());
        }
    }

    session
        .cdp
        .call_function_on(
            object_id,
            "function() { this.scrollIntoView({block: 'center'}); this.click(); }",
        )
        .await?;
    Ok(())
}

async fn click_by_selector(session: &ChromeSession, selector: &str) -> Result<()> {
    let escaped = selector.replace('\\', "\\\\").replace('\'', "\\'");
    let js = format!(
        concat!(
            "(function() {{ var el = document.querySelector('{}');",
            " if (!el) return false;",
            " el.scrollIntoView({{block: 'center'}});",
            " el.click(); return true; }})()"
        ),
        escaped
    );

    let result = session.cdp.evaluate_js(&js).await?;
    let clicked = result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !clicked {
        return Err(Error::NotFound(format!("element not found: {}", selector)));
    }
    Ok(())
}

pub async fn fill(session: &mut ChromeSession, target: &Target, text: &str) -> Result<()> {
    match target {
        Target::Ref(ref_id) => {
            let object_id = resolve_ref(session, ref_id).await?;
            session.cdp.focus(&object_id).await?;
        }
        Target::Selector(selector) => {
            focus_by_selector(session, selector).await?;
        }
    }

    // Clear existing content, insert, and let frameworks see the change.
    session
        .cdp
        .evaluate_js(
            "document.activeElement && (document.activeElement.value = '', document.activeElement.textContent = '')",
        )
        .await?;
    session.cdp.insert_text(text).await?;
    session
        .cdp
        .evaluate_js(
            "document.activeElement && document.activeElement.dispatchEvent(new Event('input', {bubbles: true}))",
        )
        .await?;
    Ok(())
}

async fn focus_by_selector(session: &ChromeSession, selector: &str) -> Result<()> {
    let escaped = selector.replace('\\', "\\\\").replace('\'', "\\'");
    let js = format!(
        "(function() {{ var el = document.querySelector('{}'); if (!el) return false; el.focus(); return true; }})()",
        escaped
    );
    let result = session.cdp.evaluate_js(&js).await?;
    let focused = result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !focused {
        return Err(Error::NotFound(format!("element not found: {}", selector)));
    }
    Ok(())
}

/// Check whether a selector matches anything on the page.
pub async fn element_exists(session: &ChromeSession, selector: &str) -> Result<bool> {
    let escaped = selector.replace('\\', "\\\\").replace('\'', "\\'");
    let js = format!("!!document.querySelector('{}')", escaped);
    let result = session.cdp.evaluate_js(&js).await?;
    Ok(result
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

pub async fn press_key(session: &ChromeSession, key: &str) -> Result<()> {
    let (key_name, code, modifiers) = parse_key_spec(key);
    session
        .cdp
        .dispatch_key_event("keyDown", &key_name, &code, modifiers)
        .await?;
    session
        .cdp
        .dispatch_key_event("keyUp", &key_name, &code, modifiers)
        .await?;
    Ok(())
}

pub async fn scroll(session: &ChromeSession, direction: &str, amount: i64) -> Result<()> {
    let (dx, dy) = match direction {
        "up" => (0, -amount),
        "down" => (0, amount),
        "left" => (-amount, 0),
        "right" => (amount, 0),
        _ => (0, amount),
    };
    let js = format!("window.scrollBy({}, {})", dx, dy);
    session.cdp.evaluate_js(&js).await?;
    Ok(())
}

/// Wait until a selector appears, up to `timeout_ms`. Returns whether it did.
pub async fn wait_for_selector(
    session: &ChromeSession,
    selector: &str,
    timeout_ms: u64,
) -> Result<bool> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    loop {
        if element_exists(session, selector).await? {
            return Ok(true);
        }
        if start.elapsed() > timeout {
            return Ok(false);
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Attach files to a file input. The input may be layout-hidden; the
/// DevTools protocol sets files regardless.
pub async fn upload(session: &mut ChromeSession, target: &Target, files: &[String]) -> Result<()> {
    if files.is_empty() {
        return Err(Error::Validation("upload requires at least one file".to_string()));
    }
    for f in files {
        if !std::path::Path::new(f).exists() {
            return Err(Error::NotFound(format!("file not found: {}", f)));
        }
    }

    let object_id = match target {
        Target::Ref(ref_id) => resolve_ref(session, ref_id).await?,
        Target::Selector(selector) => {
            let escaped = selector.replace('\\', "\\\\").replace('\'', "\\'");
            session
                .cdp
                .evaluate_object(&format!("document.querySelector('{}')", escaped))
                .await
                .map_err(|_| Error::NotFound(format!("file input not found: {}", selector)))?
        }
    };

    session
        .cdp
        .set_file_input_files(files.to_vec(), &object_id)
        .await?;

    session
        .cdp
        .call_function_on(
            &object_id,
            "function() { this.dispatchEvent(new Event('change', {bubbles: true})); }",
        )
        .await?;
    Ok(())
}

/// Run a JavaScript expression and return its value (diagnostics and the
/// login fallback path).
pub async fn execute_js(session: &ChromeSession, expression: &str) -> Result<Value> {
    let result = session.cdp.evaluate_js(expression).await?;
    if let Some(exception) = result
        .get("exceptionDetails")
        .and_then(|e| e.get("text"))
        .and_then(|t| t.as_str())
    {
        return Err(Error::Browser(format!("script error: {}", exception)));
    }
    Ok(result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null))
}

/// Capture a screenshot PNG to a file.
pub async fn screenshot_to(session: &ChromeSession, path: &std::path::Path) -> Result<usize> {
    use base64::Engine;
    let data = session.cdp.screenshot().await?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&data)
        .map_err(|e| Error::Browser(format!("base64 decode: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;
    Ok(bytes.len())
}

fn extract_center_from_box_model(bm: &Value) -> (f64, f64) {
    if let Some(content) = bm
        .get("model")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
    {
        if content.len() >= 8 {
            let x1 = content[0].as_f64().unwrap_or(0.0);
            let y1 = content[1].as_f64().unwrap_or(0.0);
            let x2 = content[4].as_f64().unwrap_or(0.0);
            let y2 = content[5].as_f64().unwrap_or(0.0);
            return ((x1 + x2) / 2.0, (y1 + y2) / 2.0);
        }
    }
    (0.0, 0.0)
}

/// Parse a key specification like "Enter", "Tab", "Ctrl+A".
fn parse_key_spec(key: &str) -> (String, String, i32) {
    let parts: Vec<&str> = key.split('+').collect();
    let mut modifiers = 0i32;
    let mut main_key = key.to_string();

    if parts.len() > 1 {
        for &part in &parts[..parts.len() - 1] {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= 2,
                "alt" | "option" => modifiers |= 1,
                "shift" => modifiers |= 8,
                "meta" | "cmd" | "command" => modifiers |= 4,
                _ => {}
            }
        }
        main_key = parts.last().unwrap_or(&key).to_string();
    }

    let code = match main_key.as_str() {
        "Enter" | "Return" => "Enter",
        "Tab" => "Tab",
        "Escape" | "Esc" => "Escape",
        "Backspace" => "Backspace",
        "Delete" => "Delete",
        "ArrowUp" | "Up" => "ArrowUp",
        "ArrowDown" | "Down" => "ArrowDown",
        "ArrowLeft" | "Left" => "ArrowLeft",
        "ArrowRight" | "Right" => "ArrowRight",
        "Home" => "Home",
        "End" => "End",
        "PageUp" => "PageUp",
        "PageDown" => "PageDown",
        "Space" | " " => "Space",
        _ => {
            if main_key.len() == 1 {
                return (
                    main_key.clone(),
                    format!("Key{}", main_key.to_uppercase()),
                    modifiers,
                );
            }
            &main_key
        }
    }
    .to_string();

    (main_key, code, modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_args_prefers_ref() {
        let args = json!({"ref": "@e3", "selector": "button"});
        match Target::from_args(&args).unwrap() {
            Target::Ref(r) => assert_eq!(r, "e3"),
            _ => panic!("expected ref target"),
        }
    }

    #[test]
    fn test_target_from_args_requires_one() {
        assert!(Target::from_args(&json!({})).is_err());
    }

    #[test]
    fn test_parse_key_spec() {
        assert_eq!(parse_key_spec("Enter"), ("Enter".to_string(), "Enter".to_string(), 0));
        assert_eq!(parse_key_spec("a"), ("a".to_string(), "KeyA".to_string(), 0));
        let (key, code, mods) = parse_key_spec("Ctrl+A");
        assert_eq!(key, "A");
        assert_eq!(code, "KeyA");
        assert_eq!(mods, 2);
    }

    #[test]
    fn test_extract_center_from_box_model() {
        let bm = json!({"model": {"content": [10.0, 20.0, 110.0, 20.0, 110.0, 60.0, 10.0, 60.0]}});
        let (x, y) = extract_center_from_box_model(&bm);
        assert_eq!(x, 60.0);
        assert_eq!(y, 40.0);
    }
}
