//! Environment diagnostics: browser binary, provider key, storage.

use jobpilot_browser::chrome::find_chrome_binary;
use jobpilot_core::{Config, Paths};
use jobpilot_providers::infer_provider_from_model;
use jobpilot_storage::PlatformSessionStore;

pub fn run() -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let mut ok = true;

    match find_chrome_binary().or(config.browser.executable.clone()) {
        Some(path) => println!("✓ Browser: {}", path),
        None => {
            println!("✗ Browser: Chrome/Chromium not found (install it or set browser.executable)");
            ok = false;
        }
    }

    let model = &config.agent.model;
    let provider = config
        .agent
        .provider
        .clone()
        .or_else(|| infer_provider_from_model(model).map(|s| s.to_string()));
    match provider {
        Some(name) => match config.api_key(&name) {
            Some(_) => println!("✓ Provider: {} ({})", name, model),
            None => {
                println!(
                    "✗ Provider: {} has no API key (set providers.{}.apiKey or {}_API_KEY)",
                    name,
                    name,
                    name.to_uppercase()
                );
                ok = false;
            }
        },
        None => {
            println!("✗ Provider: cannot infer provider from model '{}'", model);
            ok = false;
        }
    }

    match PlatformSessionStore::open(&paths.db_file()) {
        Ok(store) => {
            let count = store.list().map(|r| r.len()).unwrap_or(0);
            println!("✓ Storage: {} ({} stored sessions)", paths.db_file().display(), count);
        }
        Err(e) => {
            println!("✗ Storage: {}", e);
            ok = false;
        }
    }

    if paths.config_file().exists() {
        println!("✓ Config: {}", paths.config_file().display());
    } else {
        println!("- Config: using defaults (run `jobpilot init` to write one)");
    }

    if !ok {
        anyhow::bail!("environment is not ready");
    }
    println!("\nAll checks passed.");
    Ok(())
}
