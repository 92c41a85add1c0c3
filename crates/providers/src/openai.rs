use async_trait::async_trait;
use jobpilot_core::types::{ChatMessage, LLMResponse, ToolCallRequest};
use jobpilot_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::Provider;

/// OpenAI-compatible chat-completions provider. Also covers relays that speak
/// the same wire format (DeepSeek, Groq, OpenRouter) via `api_base`.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Strip a "provider/" prefix, e.g. "openai/gpt-4o" -> "gpt-4o".
    fn normalize_model(model: &str) -> &str {
        model.split_once('/').map(|(_, m)| m).unwrap_or(model)
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let mut obj = serde_json::json!({
                    "role": msg.role,
                    "content": msg.content,
                });
                if let Some(tool_calls) = &msg.tool_calls {
                    obj["tool_calls"] = serde_json::to_value(tool_calls)
                        .unwrap_or(Value::Array(Vec::new()));
                }
                if let Some(id) = &msg.tool_call_id {
                    obj["tool_call_id"] = Value::String(id.clone());
                }
                obj
            })
            .collect()
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse> {
        let url = format!("{}/chat/completions", self.api_base);
        let model = Self::normalize_model(&self.model);

        let mut request = serde_json::json!({
            "model": model,
            "messages": Self::convert_messages(messages),
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            request["tools"] = Value::Array(tools.to_vec());
        }

        info!(
            model = %model,
            tools_count = tools.len(),
            messages_count = messages.len(),
            "Calling OpenAI-compatible API"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "OpenAI API error");
            return Err(Error::Provider(format!(
                "OpenAI API error {}: {}",
                status, raw_body
            )));
        }

        debug!(body_len = raw_body.len(), "OpenAI raw response");

        let resp: OpenAIResponse = serde_json::from_str(&raw_body).map_err(|e| {
            Error::Provider(format!(
                "Failed to parse OpenAI response: {}. Body: {}",
                e,
                &raw_body[..raw_body.len().min(500)]
            ))
        })?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("No choices in OpenAI response".to_string()))?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let finish_reason = choice.finish_reason.unwrap_or_else(|| {
            if tool_calls.is_empty() {
                "stop".to_string()
            } else {
                "tool_calls".to_string()
            }
        });

        Ok(LLMResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls,
            finish_reason,
            usage: resp.usage.unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_model() {
        assert_eq!(OpenAIProvider::normalize_model("openai/gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(OpenAIProvider::normalize_model("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_convert_messages_includes_tool_plumbing() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = Some(vec![ToolCallRequest {
            id: "call_0".to_string(),
            name: "navigate".to_string(),
            arguments: serde_json::json!({"url": "https://example.com"}),
        }]);
        let result = ChatMessage::tool_result("call_0", r#"{"status": "navigated"}"#);

        let converted = OpenAIProvider::convert_messages(&[assistant, result]);
        assert_eq!(converted[0]["tool_calls"][0]["function"]["name"], "navigate");
        assert_eq!(converted[1]["tool_call_id"], "call_0");
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "click", "arguments": "{\"ref\": \"e4\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20}
        }"#;

        let resp: OpenAIResponse = serde_json::from_str(json).unwrap();
        let choice = &resp.choices[0];
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].name, "click");
        assert_eq!(calls[0].arguments["ref"], "e4");
    }
}
