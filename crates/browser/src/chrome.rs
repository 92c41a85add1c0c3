//! Chrome process lifecycle.
//!
//! Launches a local Chrome/Chromium with a persistent user-data dir, discovers
//! the page target's CDP WebSocket, and tears the process down with the
//! session. One session per agent run.

use crate::cdp::CdpClient;
use crate::snapshot::RefEntry;
use jobpilot_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Persistent profile dir; cookies held by Chrome itself survive runs.
    pub user_data_dir: PathBuf,
    /// Visible window. Job boards are less hostile to headed sessions.
    pub headed: bool,
    /// Binary override; auto-discovered when unset.
    pub executable: Option<String>,
}

/// A running Chrome with its CDP connection and per-page snapshot state.
pub struct ChromeSession {
    pub debug_port: u16,
    chrome_process: Child,
    pub cdp: CdpClient,
    pub user_data_dir: PathBuf,
    pub current_url: Option<String>,
    /// Ref map from the latest snapshot: "e1" -> element handle.
    pub refs: HashMap<String, RefEntry>,
    /// Element ids seen interactive in the previous snapshot, for marking
    /// newly appeared controls.
    pub previous_node_ids: HashSet<i64>,
}

impl ChromeSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let browser_path = match &options.executable {
            Some(path) => path.clone(),
            None => find_chrome_binary()
                .ok_or_else(|| Error::Browser("Chrome not found. Please install it.".to_string()))?,
        };

        std::fs::create_dir_all(&options.user_data_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_chrome_args(debug_port, &options.user_data_dir, options.headed);

        info!(
            port = debug_port,
            headed = options.headed,
            profile = %options.user_data_dir.display(),
            "Launching Chrome"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("launch {}: {}", browser_path, e)))?;

        wait_for_cdp_ready(debug_port, 15).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;

        let cdp = CdpClient::connect(&page_ws_url).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("DOM").await?;
        cdp.enable_domain("Network").await?;

        info!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(Self {
            debug_port,
            chrome_process: child,
            cdp,
            user_data_dir: options.user_data_dir.clone(),
            current_url: None,
            refs: HashMap::new(),
            previous_node_ids: HashSet::new(),
        })
    }

    /// Close the browser session.
    pub async fn close(&mut self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.chrome_process.kill().await;
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Best-effort kill on drop.
        let _ = self.chrome_process.start_kill();
    }
}

fn build_chrome_args(debug_port: u16, user_data_dir: &Path, headed: bool) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--safebrowsing-disable-auto-update".to_string(),
        "--password-store=basic".to_string(),
    ];
    if !headed {
        args.push("--headless=new".to_string());
    }
    args.push("--window-size=1280,720".to_string());
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome/Chromium binary on the system.
pub fn find_chrome_binary() -> Option<String> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Find a free TCP port for the debugging endpoint.
async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Browser(format!("bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Browser(format!("local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Poll /json/version until the CDP endpoint responds.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Chrome CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Connect to the first page target's WebSocket URL via /json/list.
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Browser("no page target found after retries".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_args_headless_flag() {
        let dir = PathBuf::from("/tmp/profile");
        let headed = build_chrome_args(9222, &dir, true);
        assert!(!headed.iter().any(|a| a.starts_with("--headless")));

        let headless = build_chrome_args(9222, &dir, false);
        assert!(headless.iter().any(|a| a == "--headless=new"));
        assert!(headless.iter().any(|a| a == "--remote-debugging-port=9222"));
    }
}
