//! Scripted credential login, run before the agent takes over.
//!
//! Deterministic where possible: fill the known selectors, try the submit
//! tiers, then watch the URL for authenticated markers. Everything here is
//! non-fatal; when the script cannot finish the login (captcha, 2FA, layout
//! drift), the agent inherits the page as-is.

use jobpilot_browser::actions::{self, Target};
use jobpilot_browser::ChromeSession;
use jobpilot_core::{PlatformProfile, Result};
use tracing::{info, warn};

/// Seconds the verification loop polls the URL after submitting.
const VERIFY_ATTEMPTS: u32 = 5;

/// Navigate to the login page and authenticate if needed.
/// Returns true when an authenticated URL was observed.
pub async fn ensure_logged_in(
    session: &mut ChromeSession,
    profile: &PlatformProfile,
    username: &str,
    password: &str,
    settle_ms: u64,
) -> Result<bool> {
    actions::navigate(session, &profile.login_url, settle_ms).await?;

    // Restored storage state often skips the form entirely: the login URL
    // redirects straight to an authenticated page.
    let url = actions::current_url(session).await?;
    if profile.is_logged_in_url(&url) {
        info!(url = %url, "Session restored, login skipped");
        return Ok(true);
    }

    if username.is_empty() || password.is_empty() {
        warn!("No credentials provided and no restored session; handing over to agent");
        return Ok(false);
    }

    info!(platform = %profile.name, username = %username, "Attempting scripted login");

    if let Err(e) = fill_credentials(session, profile, username, password).await {
        warn!(error = %e, "Credential fill failed");
    }

    submit_login(session, profile).await;

    // Watch navigation for an authenticated URL.
    for attempt in 0..VERIFY_ATTEMPTS {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        let url = actions::current_url(session).await?;
        info!(attempt = attempt + 1, url = %url, "Monitoring login navigation");
        if profile.is_logged_in_url(&url) {
            info!(url = %url, "Login verified");
            return Ok(true);
        }
    }

    warn!("Authenticated page not reached yet; handing over to agent");
    Ok(false)
}

async fn fill_credentials(
    session: &mut ChromeSession,
    profile: &PlatformProfile,
    username: &str,
    password: &str,
) -> Result<()> {
    for selector in &profile.username_selectors {
        if actions::element_exists(session, selector).await? {
            actions::fill(session, &Target::Selector(selector.clone()), username).await?;
            break;
        }
    }
    for selector in &profile.password_selectors {
        if actions::element_exists(session, selector).await? {
            actions::fill(session, &Target::Selector(selector.clone()), password).await?;
            break;
        }
    }
    Ok(())
}

/// Multi-tier submission: known submit buttons, then Enter, then a raw form
/// submit if the URL still looks like a login page.
async fn submit_login(session: &mut ChromeSession, profile: &PlatformProfile) {
    let mut submitted = false;
    for selector in &profile.submit_selectors {
        match actions::click(session, &Target::Selector(selector.clone())).await {
            Ok(()) => {
                info!(selector = %selector, "Clicked submit");
                submitted = true;
                break;
            }
            Err(_) => continue,
        }
    }

    if !submitted {
        info!("No submit button matched, pressing Enter");
        if let Err(e) = actions::press_key(session, "Enter").await {
            warn!(error = %e, "Enter key submission failed");
        }
    }

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    if let Ok(url) = actions::current_url(session).await {
        if url.to_lowercase().contains("login") {
            info!("Still on login page, falling back to form.submit()");
            let _ = actions::execute_js(
                session,
                "(() => { const f = document.querySelector('form'); if (f) f.submit(); })()",
            )
            .await;
        }
    }
}
