//! Browser storage-state capture and restore.
//!
//! The opaque blob the session store persists: cookies for the whole browser
//! plus localStorage for the origins a run touched. Replaying it against a
//! fresh browser restores the logged-in session without credentials.

use crate::chrome::ChromeSession;
use jobpilot_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Value>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

/// Cookie fields Network.setCookies accepts. getAllCookies returns extras
/// (size, session, priority, ...) that must not be replayed.
const COOKIE_PARAM_KEYS: &[&str] = &[
    "name", "value", "domain", "path", "expires", "httpOnly", "secure", "sameSite",
];

fn to_cookie_param(cookie: &Value) -> Value {
    let mut out = serde_json::Map::new();
    if let Some(obj) = cookie.as_object() {
        for key in COOKIE_PARAM_KEYS {
            if let Some(v) = obj.get(*key) {
                // A session cookie reports expires: -1, which setCookies rejects.
                if *key == "expires" && v.as_f64().map(|e| e < 0.0).unwrap_or(false) {
                    continue;
                }
                out.insert(key.to_string(), v.clone());
            }
        }
    }
    Value::Object(out)
}

impl StorageState {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }
}

/// Capture the browser's cookies and the current page origin's localStorage.
pub async fn capture(session: &ChromeSession) -> Result<StorageState> {
    let cookies = session.cdp.get_all_cookies().await?;

    let mut origins = Vec::new();
    let dump = session
        .cdp
        .evaluate_js(
            r#"(() => {
                const entries = [];
                try {
                    for (let i = 0; i < localStorage.length; i++) {
                        const key = localStorage.key(i);
                        entries.push({name: key, value: localStorage.getItem(key)});
                    }
                } catch (e) { /* opaque origin */ }
                return {origin: location.origin, localStorage: entries};
            })()"#,
        )
        .await?;

    if let Some(value) = dump.get("result").and_then(|r| r.get("value")) {
        if let Ok(origin) = serde_json::from_value::<OriginState>(value.clone()) {
            if !origin.local_storage.is_empty() && origin.origin.starts_with("http") {
                origins.push(origin);
            }
        }
    }

    debug!(
        cookies = cookies.len(),
        origins = origins.len(),
        "Captured storage state"
    );
    Ok(StorageState { cookies, origins })
}

/// Replay cookies into a fresh browser. Call before the first navigation.
pub async fn restore_cookies(session: &ChromeSession, state: &StorageState) -> Result<()> {
    if state.cookies.is_empty() {
        return Ok(());
    }
    let params: Vec<Value> = state.cookies.iter().map(to_cookie_param).collect();
    match session.cdp.set_cookies(params).await {
        Ok(()) => {
            debug!(cookies = state.cookies.len(), "Restored cookies");
        }
        Err(e) => {
            // A stale blob must not kill the run; the login flow recovers.
            warn!(error = %e, "Cookie restore failed, continuing without");
        }
    }
    Ok(())
}

/// Replay localStorage entries for the origin currently loaded in the page.
/// Call after navigating to a page on that origin.
pub async fn inject_local_storage(session: &ChromeSession, state: &StorageState) -> Result<()> {
    if state.origins.is_empty() {
        return Ok(());
    }
    let current = session
        .cdp
        .evaluate_js("location.origin")
        .await?
        .get("result")
        .and_then(|r| r.get("value"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    for origin in &state.origins {
        if origin.origin != current {
            continue;
        }
        for entry in &origin.local_storage {
            let script = format!(
                "try {{ localStorage.setItem({}, {}); }} catch (e) {{}}",
                json!(entry.name),
                json!(entry.value)
            );
            session.cdp.evaluate_js(&script).await?;
        }
        debug!(origin = %origin.origin, entries = origin.local_storage.len(), "Injected localStorage");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_param_filters_readonly_fields() {
        let cookie = json!({
            "name": "li_at",
            "value": "token",
            "domain": ".linkedin.com",
            "path": "/",
            "expires": 1893456000.0,
            "httpOnly": true,
            "secure": true,
            "sameSite": "None",
            "size": 120,
            "session": false,
            "priority": "Medium"
        });
        let param = to_cookie_param(&cookie);
        assert_eq!(param["name"], "li_at");
        assert_eq!(param["domain"], ".linkedin.com");
        assert!(param.get("size").is_none());
        assert!(param.get("priority").is_none());
    }

    #[test]
    fn test_session_cookie_expires_dropped() {
        let cookie = json!({"name": "sid", "value": "x", "domain": "a.com", "expires": -1});
        let param = to_cookie_param(&cookie);
        assert!(param.get("expires").is_none());
        assert_eq!(param["name"], "sid");
    }

    #[test]
    fn test_state_round_trip() {
        let state = StorageState {
            cookies: vec![json!({"name": "a", "value": "1"})],
            origins: vec![OriginState {
                origin: "https://www.linkedin.com".to_string(),
                local_storage: vec![StorageEntry {
                    name: "theme".to_string(),
                    value: "dark".to_string(),
                }],
            }],
        };
        let value = state.to_value().unwrap();
        let back = StorageState::from_value(&value);
        assert_eq!(back.cookies.len(), 1);
        assert_eq!(back.origins[0].local_storage[0].name, "theme");
        assert!(!back.is_empty());
    }

    #[test]
    fn test_from_value_tolerates_garbage() {
        let state = StorageState::from_value(&json!("not an object"));
        assert!(state.is_empty());
    }
}
