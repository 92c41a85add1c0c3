use jobpilot_core::Config;

use crate::{GeminiProvider, OpenAIProvider, Provider};

/// Default api_base for OpenAI-compatible providers.
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Infer the provider name from the model string prefix.
/// Returns None when the prefix is not recognized.
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("gemini/") || model.starts_with("gemini-") {
        Some("gemini")
    } else if model.starts_with("openai/") || model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
        Some("openai")
    } else if model.starts_with("deepseek") {
        Some("deepseek")
    } else if model.starts_with("groq/") {
        Some("groq")
    } else {
        None
    }
}

/// Find the first provider with a usable API key as a fallback.
fn fallback_provider_name(config: &Config) -> Option<&'static str> {
    for name in ["gemini", "openai", "openrouter", "deepseek", "groq"] {
        if config.api_key(name).is_some() {
            return Some(name);
        }
    }
    None
}

/// Unified provider creation.
///
/// Resolution order:
/// 1. explicit provider from config (`agent.provider`)
/// 2. model string prefix (e.g. "gemini-flash-latest" -> gemini)
/// 3. first provider in config/env with an API key
pub fn create_provider(config: &Config, model: &str) -> anyhow::Result<Box<dyn Provider>> {
    let max_tokens = config.agent.max_tokens;
    let temperature = config.agent.temperature;

    let effective: String = if let Some(ep) = &config.agent.provider {
        ep.clone()
    } else if let Some(inferred) = infer_provider_from_model(model) {
        inferred.to_string()
    } else if let Some(fallback) = fallback_provider_name(config) {
        fallback.to_string()
    } else {
        anyhow::bail!(
            "No LLM provider configured. Use a recognized model prefix (e.g. 'gemini-...', \
             'gpt-...'), set agent.provider in config, or export GEMINI_API_KEY/OPENAI_API_KEY."
        );
    };

    let api_key = config.api_key(&effective).ok_or_else(|| {
        anyhow::anyhow!(
            "Provider '{}' has no API key. Set providers.{}.apiKey in config or export {}_API_KEY.",
            effective,
            effective,
            effective.to_uppercase()
        )
    })?;
    let api_base = config.api_base(&effective);

    let provider: Box<dyn Provider> = match effective.as_str() {
        "gemini" => Box::new(GeminiProvider::new(
            &api_key,
            api_base.as_deref(),
            model,
            max_tokens,
            temperature,
        )),
        other => Box::new(OpenAIProvider::new(
            &api_key,
            api_base.as_deref().or(Some(default_api_base(other))),
            model,
            max_tokens,
            temperature,
        )),
    };

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_provider_from_model() {
        assert_eq!(infer_provider_from_model("gemini-flash-latest"), Some("gemini"));
        assert_eq!(infer_provider_from_model("gemini/gemini-1.5-pro"), Some("gemini"));
        assert_eq!(infer_provider_from_model("gpt-4o-mini"), Some("openai"));
        assert_eq!(infer_provider_from_model("deepseek-chat"), Some("deepseek"));
        assert_eq!(infer_provider_from_model("mystery-model"), None);
    }

    #[test]
    fn test_create_provider_requires_key() {
        let mut config = Config::default();
        config.agent.provider = Some("acme".to_string());
        let result = create_provider(&config, "acme-large");
        assert!(result.is_err());
    }
}
