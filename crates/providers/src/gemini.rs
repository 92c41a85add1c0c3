use async_trait::async_trait;
use jobpilot_core::types::{ChatMessage, LLMResponse, ToolCallRequest};
use jobpilot_core::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::Provider;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        api_base: Option<&str>,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    /// Normalize model name: strip "gemini/" prefix if present.
    /// Config may store "gemini/gemini-flash-latest" but the API expects
    /// "gemini-flash-latest".
    fn normalize_model(model: &str) -> &str {
        model.strip_prefix("gemini/").unwrap_or(model)
    }

    /// Convert ChatMessage list to Gemini format.
    /// Gemini uses `role: "user"/"model"`, with system instruction as a
    /// separate field, and function responses as user-role parts.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_text: Option<String> = None;
        let mut gemini_contents: Vec<Value> = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => {
                    system_text = Some(match system_text {
                        Some(existing) => format!("{}\n\n{}", existing, msg.content),
                        None => msg.content.clone(),
                    });
                }
                "assistant" => {
                    let mut parts: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(serde_json::json!({"text": msg.content}));
                    }
                    if let Some(tool_calls) = &msg.tool_calls {
                        for tc in tool_calls {
                            parts.push(serde_json::json!({
                                "functionCall": {
                                    "name": tc.name,
                                    "args": tc.arguments,
                                }
                            }));
                        }
                    }
                    if parts.is_empty() {
                        parts.push(serde_json::json!({"text": ""}));
                    }
                    gemini_contents.push(serde_json::json!({
                        "role": "model",
                        "parts": parts,
                    }));
                }
                "tool" => {
                    // Function responses travel as user messages. The
                    // function name lives in msg.name (falling back to the
                    // call id for older transcripts).
                    let func_name = msg
                        .name
                        .as_deref()
                        .or(msg.tool_call_id.as_deref())
                        .unwrap_or("");
                    let response_value = serde_json::from_str::<Value>(&msg.content)
                        .unwrap_or_else(|_| serde_json::json!({"result": msg.content}));

                    let func_response = serde_json::json!({
                        "functionResponse": {
                            "name": func_name,
                            "response": response_value,
                        }
                    });

                    // Merge consecutive function responses into one user turn.
                    if let Some(last) = gemini_contents.last_mut() {
                        if last.get("role").and_then(|v| v.as_str()) == Some("user") {
                            if let Some(arr) = last.get_mut("parts").and_then(|p| p.as_array_mut()) {
                                if arr.first().and_then(|v| v.get("functionResponse")).is_some() {
                                    arr.push(func_response);
                                    continue;
                                }
                            }
                        }
                    }

                    gemini_contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [func_response],
                    }));
                }
                _ => {
                    gemini_contents.push(serde_json::json!({
                        "role": "user",
                        "parts": [{"text": msg.content}],
                    }));
                }
            }
        }

        (system_text, gemini_contents)
    }

    /// Convert OpenAI-style tool schemas to Gemini function declarations.
    fn convert_tools(tools: &[Value]) -> Vec<Value> {
        let declarations: Vec<Value> = tools
            .iter()
            .filter_map(|tool| {
                let func = tool.get("function")?;
                let name = func.get("name")?.as_str()?;
                let description = func
                    .get("description")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let parameters = func.get("parameters").cloned().unwrap_or(serde_json::json!({
                    "type": "object",
                    "properties": {}
                }));

                Some(serde_json::json!({
                    "name": name,
                    "description": description,
                    "parameters": parameters,
                }))
            })
            .collect();

        if declarations.is_empty() {
            vec![]
        } else {
            vec![serde_json::json!({
                "functionDeclarations": declarations,
            })]
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn chat(&self, messages: &[ChatMessage], tools: &[Value]) -> Result<LLMResponse> {
        let model = Self::normalize_model(&self.model);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, model, self.api_key
        );

        let (system_instruction, contents) = Self::convert_messages(messages);
        let gemini_tools = Self::convert_tools(tools);

        let mut request = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });

        if let Some(sys) = &system_instruction {
            request["systemInstruction"] = serde_json::json!({
                "parts": [{"text": sys}]
            });
        }

        if !gemini_tools.is_empty() {
            request["tools"] = Value::Array(gemini_tools);
        }

        info!(
            model = %model,
            tools_count = tools.len(),
            messages_count = messages.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "Gemini API error");
            return Err(Error::Provider(format!(
                "Gemini API error {}: {}",
                status, raw_body
            )));
        }

        debug!(body_len = raw_body.len(), "Gemini raw response");

        let resp: GeminiResponse = serde_json::from_str(&raw_body).map_err(|e| {
            Error::Provider(format!(
                "Failed to parse Gemini response: {}. Body: {}",
                e,
                &raw_body[..raw_body.len().min(500)]
            ))
        })?;

        let candidate = resp
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| Error::Provider("No candidates in Gemini response".to_string()))?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallRequest> = Vec::new();

        if let Some(content) = candidate.content {
            for (i, part) in content.parts.iter().enumerate() {
                if let Some(text) = &part.text {
                    if !text.is_empty() {
                        text_parts.push(text.clone());
                    }
                }
                if let Some(fc) = &part.function_call {
                    tool_calls.push(ToolCallRequest {
                        id: format!("gemini_call_{}", i),
                        name: fc.name.clone(),
                        arguments: fc.args.clone().unwrap_or(Value::Object(serde_json::Map::new())),
                    });
                }
            }
        }

        let content_text = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };

        let finish_reason = match candidate.finish_reason.as_deref() {
            Some("STOP") => "stop".to_string(),
            Some("MAX_TOKENS") => "length".to_string(),
            Some("SAFETY") => "content_filter".to_string(),
            Some(other) => other.to_lowercase(),
            None => {
                if !tool_calls.is_empty() {
                    "tool_calls".to_string()
                } else {
                    "stop".to_string()
                }
            }
        };

        let usage = if let Some(meta) = &resp.usage_metadata {
            serde_json::json!({
                "prompt_tokens": meta.prompt_token_count,
                "completion_tokens": meta.candidates_token_count,
            })
        } else {
            Value::Null
        };

        info!(
            content_len = content_text.as_ref().map(|c| c.len()).unwrap_or(0),
            tool_calls_count = tool_calls.len(),
            finish_reason = %finish_reason,
            "Gemini response parsed"
        );

        Ok(LLMResponse {
            content: content_text,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_model() {
        assert_eq!(
            GeminiProvider::normalize_model("gemini/gemini-flash-latest"),
            "gemini-flash-latest"
        );
        assert_eq!(
            GeminiProvider::normalize_model("gemini-1.5-pro"),
            "gemini-1.5-pro"
        );
    }

    #[test]
    fn test_convert_messages() {
        let messages = vec![
            ChatMessage::system("You are an application assistant"),
            ChatMessage::user("Apply to this job"),
            ChatMessage::assistant("Starting"),
        ];

        let (system, contents) = GeminiProvider::convert_messages(&messages);
        assert_eq!(system, Some("You are an application assistant".to_string()));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![serde_json::json!({
            "type": "function",
            "function": {
                "name": "click",
                "description": "Click an element",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "ref": {"type": "string"}
                    }
                }
            }
        })];

        let converted = GeminiProvider::convert_tools(&tools);
        assert_eq!(converted.len(), 1);
        let declarations = converted[0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0]["name"], "click");
    }

    #[test]
    fn test_parse_response_with_function_call() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"functionCall": {"name": "fill", "args": {"ref": "e2", "text": "Jane"}}}
                    ],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        }"#;

        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let candidates = resp.candidates.unwrap();
        let parts = &candidates[0].content.as_ref().unwrap().parts;
        assert!(parts[0].function_call.is_some());
        assert_eq!(parts[0].function_call.as_ref().unwrap().name, "fill");
    }

    #[test]
    fn test_tool_results_merge_into_one_user_turn() {
        let mut assistant = ChatMessage::assistant("");
        assistant.tool_calls = Some(vec![
            ToolCallRequest {
                id: "gemini_call_0".to_string(),
                name: "click".to_string(),
                arguments: serde_json::json!({"ref": "e1"}),
            },
            ToolCallRequest {
                id: "gemini_call_1".to_string(),
                name: "fill".to_string(),
                arguments: serde_json::json!({"ref": "e2", "text": "Jane"}),
            },
        ]);

        let mut r1 = ChatMessage::tool_result("gemini_call_0", r#"{"status": "clicked"}"#);
        r1.name = Some("click".to_string());
        let mut r2 = ChatMessage::tool_result("gemini_call_1", r#"{"status": "filled"}"#);
        r2.name = Some("fill".to_string());

        let messages = vec![ChatMessage::user("go"), assistant, r1, r2];
        let (_system, contents) = GeminiProvider::convert_messages(&messages);

        // user, model, merged function responses
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2]["role"], "user");
        let parts = contents[2]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["functionResponse"]["name"], "click");
        assert_eq!(parts[1]["functionResponse"]["name"], "fill");
    }
}
