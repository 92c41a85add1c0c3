//! The agent run: one bounded observe-decide-act loop per task request,
//! bracketed by session restore and capture.

use jobpilot_browser::actions::{self, Target};
use jobpilot_browser::{storage_state, ChromeSession, LaunchOptions};
use jobpilot_core::types::{ChatMessage, TaskRequest, ToolCallRequest};
use jobpilot_core::{Config, Error, PlatformProfile, Paths, Result};
use jobpilot_providers::Provider;
use jobpilot_storage::{PlatformSessionStore, SubmissionLog};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::prompt;
use crate::resume;
use crate::tools;
use crate::login;

/// Snapshot outline cap per observation.
const SNAPSHOT_MAX_CHARS: usize = 20_000;
/// Render depth for page outlines.
const SNAPSHOT_MAX_DEPTH: usize = 18;

/// Terminal state reported by the `done` tool.
#[derive(Debug, Clone)]
struct DoneSignal {
    result: String,
    success: bool,
}

pub struct AgentRuntime {
    config: Config,
    paths: Paths,
    provider: Arc<dyn Provider>,
    sessions: Arc<PlatformSessionStore>,
    submissions: Arc<SubmissionLog>,
}

impl AgentRuntime {
    pub fn new(
        config: Config,
        paths: Paths,
        provider: Box<dyn Provider>,
        sessions: Arc<PlatformSessionStore>,
        submissions: Arc<SubmissionLog>,
    ) -> Self {
        Self {
            config,
            paths,
            provider: Arc::from(provider),
            sessions,
            submissions,
        }
    }

    /// Run one job-application task end to end. Browser teardown and session
    /// capture happen regardless of how the run ends.
    pub async fn run_task(&self, request: &TaskRequest) -> Result<String> {
        request.validate()?;

        let profile = PlatformProfile::resolve(&request.platform, request.login_url.as_deref());
        let resume_text = resume::resolve_resume_text(
            &request.resume_text,
            request.resume_path.as_deref(),
        );

        info!(
            platform = %profile.name,
            url = %request.url,
            resume_chars = resume_text.len(),
            "Task received"
        );

        let stored = if request.username.is_empty() {
            None
        } else {
            self.sessions.load(&request.username, &profile.name)?
        };

        let profile_owner = if request.username.is_empty() {
            "anonymous"
        } else {
            request.username.as_str()
        };
        let options = LaunchOptions {
            user_data_dir: self.paths.profile_dir(profile_owner, &profile.name),
            headed: self.config.browser.headed,
            executable: self.config.browser.executable.clone(),
        };
        let mut session = ChromeSession::launch(&options).await?;

        let outcome = self
            .drive(&mut session, request, &profile, &resume_text, stored.map(|r| r.storage_state))
            .await;

        // Capture the session before teardown, success or not, since a failed run
        // may still have refreshed the login.
        if !request.username.is_empty() {
            match storage_state::capture(&session).await {
                Ok(state) if !state.is_empty() => {
                    if let Err(e) = self.sessions.save(
                        &request.username,
                        &profile.name,
                        &state.to_value()?,
                    ) {
                        warn!(error = %e, "Failed to persist session state");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Storage state capture failed"),
            }
        }

        session.close().await;

        match outcome {
            Ok((result, submitted)) => {
                if submitted {
                    if let Err(e) = self.submissions.record(
                        &request.username,
                        &profile.name,
                        &request.url,
                        "ok",
                    ) {
                        warn!(error = %e, "Failed to record submission");
                    }
                }
                Ok(result)
            }
            Err(e) => {
                error!(error = %e, "Agent run failed");
                Err(e)
            }
        }
    }

    /// The run body: restore, login, then the bounded loop.
    /// Returns (final text, whether an application was submitted).
    async fn drive(
        &self,
        session: &mut ChromeSession,
        request: &TaskRequest,
        profile: &PlatformProfile,
        resume_text: &str,
        stored_state: Option<Value>,
    ) -> Result<(String, bool)> {
        let browser_cfg = &self.config.browser;
        let agent_cfg = &self.config.agent;

        let state = stored_state
            .map(|v| storage_state::StorageState::from_value(&v))
            .unwrap_or_default();
        storage_state::restore_cookies(session, &state).await?;

        login::ensure_logged_in(
            session,
            profile,
            &request.username,
            &request.password,
            browser_cfg.navigate_settle_ms,
        )
        .await?;
        storage_state::inject_local_storage(session, &state).await?;

        let plan = prompt::plan_task(&request.url, profile);
        info!(
            mode = if plan.direct_apply { "DIRECT APPLY" } else { "SEARCH & APPLY" },
            target = %plan.target_url,
            "Task planned"
        );

        actions::navigate(session, &plan.target_url, browser_cfg.navigate_settle_ms).await?;

        let mut messages = vec![
            ChatMessage::system(&prompt::system_prompt(&profile.name, agent_cfg.max_actions_per_step)),
            ChatMessage::user(&prompt::task_prompt(&plan, &profile.name, resume_text, &request.rules)),
        ];
        let action_tools = tools::action_tools();

        let mut consecutive_failures = 0u32;

        for step in 1..=agent_cfg.max_steps {
            let snap = actions::snapshot(session, SNAPSHOT_MAX_DEPTH).await?;
            let url = actions::current_url(session).await?;
            let outline = if snap.text.len() > SNAPSHOT_MAX_CHARS {
                format!(
                    "{}...\n[outline truncated]",
                    jobpilot_browser::safe_truncate(&snap.text, SNAPSHOT_MAX_CHARS)
                )
            } else {
                snap.text.clone()
            };

            elide_previous_observation(&mut messages);
            messages.push(ChatMessage::user(&prompt::observation(
                step,
                agent_cfg.max_steps,
                &url,
                &outline,
            )));

            let response = self.chat_with_retry(&messages, &action_tools, step).await?;

            if response.tool_calls.is_empty() {
                // No actions requested: the model is talking, not acting.
                // Its text is the closest thing to a result.
                let text = response
                    .content
                    .unwrap_or_else(|| "Agent finished with no result.".to_string());
                info!(step, "Agent ended run without done tool");
                return Ok((text, false));
            }

            let mut assistant = ChatMessage::assistant(response.content.as_deref().unwrap_or(""));
            assistant.tool_calls = Some(response.tool_calls.clone());
            messages.push(assistant);

            let budget = agent_cfg.max_actions_per_step as usize;
            for (index, call) in response.tool_calls.iter().enumerate() {
                if index >= budget {
                    // Over-budget calls still need a protocol answer.
                    let mut msg = ChatMessage::tool_result(
                        &call.id,
                        &json!({"status": "skipped", "reason": "action budget exceeded for this step"}).to_string(),
                    );
                    msg.name = Some(call.name.clone());
                    messages.push(msg);
                    continue;
                }

                if call.name == "done" {
                    let done = parse_done(call);
                    info!(success = done.success, "Agent reported done");
                    return Ok((done.result, done.success));
                }

                let result = match self.execute_action(session, request, call).await {
                    Ok(value) => {
                        consecutive_failures = 0;
                        value.to_string()
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(
                            action = %call.name,
                            error = %e,
                            consecutive_failures,
                            "Action failed"
                        );
                        json!({"status": "error", "error": e.to_string()}).to_string()
                    }
                };

                let mut msg = ChatMessage::tool_result(&call.id, &result);
                msg.name = Some(call.name.clone());
                messages.push(msg);

                if consecutive_failures >= agent_cfg.max_failures {
                    warn!(failures = consecutive_failures, "Failure threshold reached, aborting run");
                    self.diagnostic_screenshot(session, step).await;
                    return Ok((
                        format!(
                            "Aborted after {} consecutive action failures. Last error included above.",
                            consecutive_failures
                        ),
                        false,
                    ));
                }

                tokio::time::sleep(std::time::Duration::from_millis(
                    browser_cfg.wait_between_actions_ms,
                ))
                .await;
            }
        }

        warn!(max_steps = agent_cfg.max_steps, "Step limit reached");
        Ok((
            format!(
                "Reached the step limit ({}) without completing the application.",
                agent_cfg.max_steps
            ),
            false,
        ))
    }

    /// Best-effort screenshot of the page an aborted run was stuck on.
    async fn diagnostic_screenshot(&self, session: &ChromeSession, step: u32) {
        let path = self
            .paths
            .media_dir()
            .join(format!("failure_{}_step{}.png", std::process::id(), step));
        match actions::screenshot_to(session, &path).await {
            Ok(bytes) => info!(path = %path.display(), bytes, "Failure screenshot saved"),
            Err(e) => warn!(error = %e, "Failure screenshot could not be captured"),
        }
    }

    /// LLM call with bounded retry and exponential backoff.
    async fn chat_with_retry(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
        step: u32,
    ) -> Result<jobpilot_core::types::LLMResponse> {
        let max_retries = self.config.agent.llm_max_retries;
        let base_delay_ms = self.config.agent.llm_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay_ms = base_delay_ms * (1u64 << (attempt - 1).min(3));
                warn!(attempt, max_retries, delay_ms, step, "Retrying LLM call after error");
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
            match self.provider.chat(messages, tools).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(attempt, step, "LLM call succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    warn!(error = %e, attempt, max_retries, step, "LLM call failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Provider("LLM call failed".to_string())))
    }

    async fn execute_action(
        &self,
        session: &mut ChromeSession,
        request: &TaskRequest,
        call: &ToolCallRequest,
    ) -> Result<Value> {
        let args = &call.arguments;
        match call.name.as_str() {
            "navigate" => {
                let url = args
                    .get("url")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::Validation("navigate requires 'url'".to_string()))?;
                actions::navigate(session, url, self.config.browser.navigate_settle_ms).await?;
                Ok(json!({"status": "navigated", "url": url}))
            }
            "click" => {
                let target = Target::from_args(args)?;
                actions::click(session, &target).await?;
                Ok(json!({"status": "clicked"}))
            }
            "fill" => {
                let text = args
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::Validation("fill requires 'text'".to_string()))?;
                let target = Target::from_args(args)?;
                actions::fill(session, &target, text).await?;
                Ok(json!({"status": "filled", "text": text}))
            }
            "press_key" => {
                let key = args
                    .get("key")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::Validation("press_key requires 'key'".to_string()))?;
                actions::press_key(session, key).await?;
                Ok(json!({"status": "key_pressed", "key": key}))
            }
            "scroll" => {
                let direction = args.get("direction").and_then(|v| v.as_str()).unwrap_or("down");
                let amount = args.get("amount").and_then(|v| v.as_i64()).unwrap_or(600);
                actions::scroll(session, direction, amount).await?;
                Ok(json!({"status": "scrolled", "direction": direction}))
            }
            "upload_resume" => {
                let path = request.resume_path.as_deref().ok_or_else(|| {
                    Error::Validation(
                        "no resume file available; the request carried only resume text".to_string(),
                    )
                })?;
                let target = Target::from_args(args)?;
                actions::upload(session, &target, &[path.to_string()]).await?;
                Ok(json!({"status": "resume_attached", "file": path}))
            }
            "read_page" => {
                let text = actions::page_text(session, 5000).await?;
                Ok(json!({"content": text}))
            }
            "wait" => {
                if let Some(selector) = args.get("selector").and_then(|v| v.as_str()) {
                    let found = actions::wait_for_selector(session, selector, 10_000).await?;
                    Ok(json!({"status": if found { "found" } else { "timeout" }, "selector": selector}))
                } else {
                    let seconds = args
                        .get("seconds")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(2)
                        .min(10);
                    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
                    Ok(json!({"status": "waited", "seconds": seconds}))
                }
            }
            other => Err(Error::Agent(format!("unknown action: {}", other))),
        }
    }
}

fn parse_done(call: &ToolCallRequest) -> DoneSignal {
    DoneSignal {
        result: call
            .arguments
            .get("result")
            .and_then(|v| v.as_str())
            .unwrap_or("Agent finished with no result.")
            .to_string(),
        success: call
            .arguments
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
    }
}

/// Keep the transcript bounded: strip the page outline from the previous
/// observation, keeping only its header lines. The newest observation is the
/// only full outline the model needs.
fn elide_previous_observation(messages: &mut [ChatMessage]) {
    for msg in messages.iter_mut().rev() {
        if msg.role == "user" && msg.content.starts_with("Step ") {
            if let Some(idx) = msg.content.find("\nPage outline:") {
                msg.content.truncate(idx);
                msg.content.push_str("\n(page outline elided)");
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_done() {
        let call = ToolCallRequest {
            id: "c1".to_string(),
            name: "done".to_string(),
            arguments: json!({"result": "Application submitted.", "success": true}),
        };
        let done = parse_done(&call);
        assert!(done.success);
        assert_eq!(done.result, "Application submitted.");

        let empty = ToolCallRequest {
            id: "c2".to_string(),
            name: "done".to_string(),
            arguments: json!({}),
        };
        let done = parse_done(&empty);
        assert!(!done.success);
    }

    #[test]
    fn test_elide_previous_observation() {
        let mut messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("task"),
            ChatMessage::user("Step 1/20\nCurrent URL: https://a\n\nPage outline:\n- button \"x\""),
            ChatMessage::assistant("ok"),
        ];
        elide_previous_observation(&mut messages);
        assert!(messages[2].content.contains("(page outline elided)"));
        assert!(!messages[2].content.contains("button"));
        // The task prompt is untouched.
        assert_eq!(messages[1].content, "task");
    }
}
