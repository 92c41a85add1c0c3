//! One-shot application run from the command line.

use jobpilot_agent::AgentRuntime;
use jobpilot_core::types::TaskRequest;
use jobpilot_core::{Config, Paths};
use jobpilot_providers::create_provider;
use jobpilot_storage::{PlatformSessionStore, SubmissionLog};
use std::sync::Arc;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    url: String,
    resume: Option<String>,
    resume_text: String,
    platform: String,
    login_url: Option<String>,
    username: String,
    password: String,
    rules: String,
) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let provider = create_provider(&config, &config.agent.model)?;
    let sessions = Arc::new(PlatformSessionStore::open(&paths.db_file())?);
    let submissions = Arc::new(SubmissionLog::open(&paths.db_file())?);
    let runtime = AgentRuntime::new(config, paths, provider, sessions, submissions);

    let request = TaskRequest {
        url,
        resume_text,
        resume_path: resume,
        platform,
        login_url,
        username,
        password,
        rules,
    };

    let result = runtime.run_task(&request).await?;
    println!("{}", result);
    Ok(())
}
