use jobpilot_core::config::ProviderConfig;
use jobpilot_core::{Config, Paths};

pub fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;

    let config_path = paths.config_file();
    if config_path.exists() && !force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }

    let mut config = Config::default();
    // Seed provider entries so the keys are easy to find and fill in.
    config
        .providers
        .insert("gemini".to_string(), ProviderConfig::default());
    config
        .providers
        .insert("openai".to_string(), ProviderConfig::default());

    config.save(&paths)?;
    println!("Wrote {}", config_path.display());
    println!("Fill in providers.gemini.apiKey (or export GEMINI_API_KEY) and run `jobpilot doctor`.");
    Ok(())
}
