//! Task and system prompt construction.
//!
//! The task prompt is the only control program the LLM receives: target,
//! search context, a resume excerpt, and the user's rules.

use jobpilot_core::PlatformProfile;

/// Resume excerpt length in the task prompt. The full text would blow the
/// per-step budget; the first page carries the identity fields forms ask for.
const RESUME_EXCERPT_CHARS: usize = 2000;

/// How the run should approach the target.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPlan {
    pub target_url: String,
    /// Search terms when the target is not a direct job link.
    pub search_context: String,
    pub direct_apply: bool,
}

/// Decide between DIRECT APPLY and SEARCH & APPLY.
///
/// A URL that looks like a specific job view goes straight to the form; a
/// non-URL input becomes a search query on the platform's jobs page; a login
/// URL is never a target.
pub fn plan_task(raw_url: &str, profile: &PlatformProfile) -> TaskPlan {
    let trimmed = raw_url.trim();
    let lower = trimmed.to_lowercase();
    let is_url = lower.starts_with("http");

    let is_direct_job = is_url
        && (lower.contains("view") || lower.contains("currentjobid"))
        && !lower.contains("login");

    let mut target_url = if is_url {
        trimmed.to_string()
    } else {
        profile.jobs_url.clone()
    };
    if target_url.to_lowercase().contains("login") {
        target_url = profile.jobs_url.clone();
    }

    let search_context = if is_url {
        "jobs matching my skills".to_string()
    } else {
        trimmed.to_string()
    };

    TaskPlan {
        target_url,
        search_context,
        direct_apply: is_direct_job,
    }
}

fn excerpt(text: &str) -> &str {
    if text.len() <= RESUME_EXCERPT_CHARS {
        return text;
    }
    let mut end = RESUME_EXCERPT_CHARS;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// The task prompt handed to the LLM for one run.
pub fn task_prompt(plan: &TaskPlan, platform: &str, resume_text: &str, rules: &str) -> String {
    let mut prompt = format!(
        "Objective: Apply for jobs on {} via {}\n\
         Status: Already logged in.\n\n\
         Instructions:\n\
         1. Go to {}\n",
        platform, plan.target_url, plan.target_url
    );

    if plan.direct_apply {
        prompt.push_str("2. This is a direct job link. Open the application form (look for 'Easy Apply' or 'Apply').\n");
    } else {
        prompt.push_str(&format!(
            "2. If you see a search bar, search for \"{}\".\n\
             3. Find a job with 'Easy Apply' (or equivalent one-page apply) and open its application form.\n",
            plan.search_context
        ));
    }

    prompt.push_str(&format!(
        "\nFill the application using this resume:\n---\n{}\n---\n",
        excerpt(resume_text)
    ));

    if !rules.trim().is_empty() {
        prompt.push_str(&format!("\nCustom rules from the candidate:\n{}\n", rules.trim()));
    }

    prompt.push_str(
        "\nCRITICAL: Limit yourself to simple navigation, clicking and form filling. \
         Always verify you are on the right page before acting. \
         When the application is submitted (or cannot proceed), call done with a summary.",
    );

    prompt
}

/// The system prompt describing the action protocol.
pub fn system_prompt(platform: &str, max_actions_per_step: u32) -> String {
    format!(
        "You are a careful job-application assistant driving a web browser on {}.\n\n\
         Each step you receive the current page URL and an outline of the page. \
         Interactive elements carry refs like [ref=e12]; newly appeared elements are marked [new]. \
         Act by calling the provided tools with those refs.\n\n\
         Rules:\n\
         - Call at most {} tools per step, in the order they should run.\n\
         - Radio buttons, checkboxes and file inputs are listed even when styled as custom controls; click them by ref.\n\
         - Use upload_resume on file inputs instead of click.\n\
         - Fill every required field before advancing a multi-step form.\n\
         - Never invent information that is not in the resume; leave such fields for defaults or skip the job.\n\
         - If the same error repeats, try a different element or call done explaining the blocker.\n\
         - Call done as soon as the application is submitted.",
        platform, max_actions_per_step
    )
}

/// The per-step observation message.
pub fn observation(step: u32, max_steps: u32, url: &str, snapshot_text: &str) -> String {
    format!(
        "Step {}/{}\nCurrent URL: {}\n\nPage outline:\n{}",
        step, max_steps, url, snapshot_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobpilot_core::PlatformProfile;

    fn linkedin() -> PlatformProfile {
        PlatformProfile::resolve("linkedin", None)
    }

    #[test]
    fn test_plan_direct_job_url() {
        let plan = plan_task("https://www.linkedin.com/jobs/view/3791234567", &linkedin());
        assert!(plan.direct_apply);
        assert_eq!(plan.target_url, "https://www.linkedin.com/jobs/view/3791234567");
    }

    #[test]
    fn test_plan_current_job_id_url() {
        let plan = plan_task(
            "https://www.linkedin.com/jobs/search/?currentJobId=123",
            &linkedin(),
        );
        assert!(plan.direct_apply);
    }

    #[test]
    fn test_plan_search_query() {
        let plan = plan_task("senior rust engineer remote", &linkedin());
        assert!(!plan.direct_apply);
        assert_eq!(plan.target_url, "https://www.linkedin.com/jobs/");
        assert_eq!(plan.search_context, "senior rust engineer remote");
    }

    #[test]
    fn test_plan_login_url_redirected_to_jobs() {
        let plan = plan_task("https://www.linkedin.com/login", &linkedin());
        assert!(!plan.direct_apply);
        assert_eq!(plan.target_url, "https://www.linkedin.com/jobs/");
    }

    #[test]
    fn test_task_prompt_includes_resume_excerpt_and_rules() {
        let plan = plan_task("https://www.linkedin.com/jobs/view/1", &linkedin());
        let long_resume = "x".repeat(5000);
        let prompt = task_prompt(&plan, "LinkedIn", &long_resume, "Only remote roles");
        assert!(prompt.contains("Only remote roles"));
        // Excerpt, not the whole resume.
        assert!(prompt.len() < 3500);
        assert!(prompt.contains(&"x".repeat(100)));
    }

    #[test]
    fn test_system_prompt_mentions_action_budget() {
        let prompt = system_prompt("LinkedIn", 4);
        assert!(prompt.contains("at most 4 tools"));
    }
}
