use serde::{Deserialize, Serialize};
use tracing::warn;

/// A tool call request that serializes to the OpenAI-compatible format:
/// `{id, type: "function", function: {name, arguments}}`
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl Serialize for ToolCallRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &serde_json::json!({
            "name": self.name,
            "arguments": self.arguments.to_string()
        }))?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ToolCallRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| serde::de::Error::custom("expected object"))?;

        let id = obj
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if let Some(func) = obj.get("function").and_then(|v| v.as_object()) {
            let name = func
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let arguments = match func.get("arguments") {
                Some(serde_json::Value::String(s)) => serde_json::from_str(s).unwrap_or_else(|e| {
                    warn!(error = %e, raw = %s, "Failed to parse tool call arguments as JSON, using empty object");
                    serde_json::Value::Object(serde_json::Map::new())
                }),
                Some(v) => v.clone(),
                None => serde_json::Value::Object(serde_json::Map::new()),
            };
            return Ok(ToolCallRequest { id, name, arguments });
        }

        // Flat format: {id, name, arguments}
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let arguments = obj
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        Ok(ToolCallRequest { id, name, arguments })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub finish_reason: String,
    pub usage: serde_json::Value,
}

impl Default for LLMResponse {
    fn default() -> Self {
        Self {
            content: None,
            tool_calls: Vec::new(),
            finish_reason: String::new(),
            usage: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
            name: None,
        }
    }
}

/// One job-application request. Transient: one per HTTP call or CLI run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskRequest {
    /// Job posting URL, jobs search URL, or a free-text search query.
    pub url: String,
    #[serde(default)]
    pub resume_text: String,
    /// Absolute path to a resume PDF. When readable, its extracted text
    /// supersedes `resume_text`.
    #[serde(default)]
    pub resume_path: Option<String>,
    #[serde(default = "default_platform", alias = "platform_name")]
    pub platform: String,
    /// Override for the platform's login page.
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Free-text behavioral rules appended to the task prompt.
    #[serde(default)]
    pub rules: String,
}

fn default_platform() -> String {
    "LinkedIn".to_string()
}

impl TaskRequest {
    pub fn validate(&self) -> crate::Result<()> {
        if self.url.trim().is_empty() {
            return Err(crate::Error::Validation("url is required".to_string()));
        }
        if self.resume_text.trim().is_empty() && self.resume_path.is_none() {
            return Err(crate::Error::Validation(
                "either resume_text or resume_path is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_round_trip() {
        let call = ToolCallRequest {
            id: "call_1".to_string(),
            name: "click".to_string(),
            arguments: serde_json::json!({"ref": "e3"}),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "click");

        let back: ToolCallRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.name, "click");
        assert_eq!(back.arguments["ref"], "e3");
    }

    #[test]
    fn test_task_request_defaults() {
        let json = r#"{"url": "https://www.linkedin.com/jobs/view/123", "resume_text": "x"}"#;
        let req: TaskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.platform, "LinkedIn");
        assert!(req.login_url.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_task_request_requires_resume() {
        let json = r#"{"url": "https://example.com/jobs"}"#;
        let req: TaskRequest = serde_json::from_str(json).unwrap();
        assert!(req.validate().is_err());
    }
}
