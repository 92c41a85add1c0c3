//! Recruiting-platform presets.
//!
//! Each profile carries what the scripted login and the task prompt need:
//! where the login form lives, how to find the credential fields, the
//! submit-button tiers to try, and the URL markers that prove a session is
//! authenticated.

/// Login/navigation knowledge for one recruiting platform.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub name: String,
    pub login_url: String,
    pub username_selectors: Vec<String>,
    pub password_selectors: Vec<String>,
    /// Tried in order; the first clickable one wins.
    pub submit_selectors: Vec<String>,
    /// URL substrings that indicate an authenticated page.
    pub success_markers: Vec<String>,
    /// Landing page for job search when the request has no usable URL.
    pub jobs_url: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn linkedin() -> PlatformProfile {
    PlatformProfile {
        name: "LinkedIn".to_string(),
        login_url: "https://www.linkedin.com/login".to_string(),
        username_selectors: strings(&["input#username", "input[name=\"session_key\"]"]),
        password_selectors: strings(&["input#password", "input[name=\"session_password\"]"]),
        submit_selectors: strings(&[
            "button[type=\"submit\"]",
            "button#login-submit",
            "button.btn__primary--large",
        ]),
        success_markers: strings(&["/feed", "/jobs", "/search", "/mynetwork", "/manage", "/talent"]),
        jobs_url: "https://www.linkedin.com/jobs/".to_string(),
    }
}

fn indeed() -> PlatformProfile {
    PlatformProfile {
        name: "Indeed".to_string(),
        login_url: "https://secure.indeed.com/auth".to_string(),
        username_selectors: strings(&["input[type=\"email\"]", "input[name=\"__email\"]"]),
        password_selectors: strings(&["input[type=\"password\"]", "input[name=\"__password\"]"]),
        submit_selectors: strings(&["button[type=\"submit\"]"]),
        success_markers: strings(&["/jobs", "/m/", "/career", "/viewjob"]),
        jobs_url: "https://www.indeed.com/jobs".to_string(),
    }
}

fn glassdoor() -> PlatformProfile {
    PlatformProfile {
        name: "Glassdoor".to_string(),
        login_url: "https://www.glassdoor.com/profile/login_input.htm".to_string(),
        username_selectors: strings(&["input#inlineUserEmail", "input[type=\"email\"]"]),
        password_selectors: strings(&["input#inlineUserPassword", "input[type=\"password\"]"]),
        submit_selectors: strings(&["button[type=\"submit\"]", "button[name=\"submit\"]"]),
        success_markers: strings(&["/Job/", "/member", "/Community", "/job-listing"]),
        jobs_url: "https://www.glassdoor.com/Job/index.htm".to_string(),
    }
}

/// Generic fallback for platforms without a preset. Only usable with a
/// login URL override; the selectors cover the common form shapes.
fn generic(name: &str, login_url: &str) -> PlatformProfile {
    PlatformProfile {
        name: name.to_string(),
        login_url: login_url.to_string(),
        username_selectors: strings(&[
            "input[type=\"email\"]",
            "input[name=\"username\"]",
            "input[name=\"email\"]",
        ]),
        password_selectors: strings(&["input[type=\"password\"]"]),
        submit_selectors: strings(&["button[type=\"submit\"]", "input[type=\"submit\"]"]),
        success_markers: strings(&["/jobs", "/dashboard", "/home", "/feed"]),
        jobs_url: login_url.to_string(),
    }
}

impl PlatformProfile {
    /// Resolve a profile by (case-insensitive) platform name, applying a
    /// login URL override when given. Unknown platforms get the generic
    /// profile; without an override that still points at LinkedIn's flow so
    /// the request fails loudly in the login step rather than silently.
    pub fn resolve(platform: &str, login_url_override: Option<&str>) -> PlatformProfile {
        let mut profile = match platform.to_lowercase().as_str() {
            "linkedin" => linkedin(),
            "indeed" => indeed(),
            "glassdoor" => glassdoor(),
            other => match login_url_override {
                Some(url) => generic(other, url),
                None => {
                    let mut p = linkedin();
                    p.name = platform.to_string();
                    p
                }
            },
        };
        if let Some(url) = login_url_override {
            if !url.trim().is_empty() {
                profile.login_url = url.to_string();
            }
        }
        profile
    }

    /// True when the URL looks like an authenticated page for this platform.
    pub fn is_logged_in_url(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        if lower.contains("login") || lower.contains("/auth") {
            return false;
        }
        self.success_markers
            .iter()
            .any(|m| lower.contains(&m.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_platforms() {
        assert_eq!(PlatformProfile::resolve("linkedin", None).name, "LinkedIn");
        assert_eq!(PlatformProfile::resolve("INDEED", None).name, "Indeed");
        assert_eq!(PlatformProfile::resolve("Glassdoor", None).name, "Glassdoor");
    }

    #[test]
    fn test_login_url_override() {
        let profile = PlatformProfile::resolve("LinkedIn", Some("https://corp.example.com/sso"));
        assert_eq!(profile.login_url, "https://corp.example.com/sso");
        // Selectors stay platform-specific.
        assert!(profile.username_selectors[0].contains("#username"));
    }

    #[test]
    fn test_unknown_platform_with_override_is_generic() {
        let profile = PlatformProfile::resolve("wellfound", Some("https://wellfound.com/login"));
        assert_eq!(profile.name, "wellfound");
        assert!(profile.username_selectors.iter().any(|s| s.contains("email")));
    }

    #[test]
    fn test_logged_in_url_detection() {
        let profile = linkedin();
        assert!(profile.is_logged_in_url("https://www.linkedin.com/feed/"));
        assert!(profile.is_logged_in_url("https://www.linkedin.com/jobs/view/123"));
        assert!(!profile.is_logged_in_url("https://www.linkedin.com/login"));
        assert!(!profile.is_logged_in_url("https://www.linkedin.com/checkpoint/challenge"));
    }
}
