//! Action tool schemas exposed to the LLM.

use serde_json::{json, Value};

/// OpenAI-style function schemas for the browser actions the agent may take.
pub fn action_tools() -> Vec<Value> {
    vec![
        tool(
            "navigate",
            "Open a URL in the browser.",
            json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute URL to open"}
                },
                "required": ["url"]
            }),
        ),
        tool(
            "click",
            "Click an element. Works on buttons, links, and on radio/checkbox inputs even when they are rendered as custom controls.",
            json!({
                "type": "object",
                "properties": {
                    "ref": {"type": "string", "description": "Element ref from the page outline, e.g. 'e12'"},
                    "selector": {"type": "string", "description": "CSS selector fallback when no ref is listed"}
                }
            }),
        ),
        tool(
            "fill",
            "Replace the content of an input or textarea with the given text.",
            json!({
                "type": "object",
                "properties": {
                    "ref": {"type": "string", "description": "Element ref from the page outline"},
                    "selector": {"type": "string", "description": "CSS selector fallback"},
                    "text": {"type": "string", "description": "Text to enter"}
                },
                "required": ["text"]
            }),
        ),
        tool(
            "press_key",
            "Press a keyboard key, e.g. 'Enter', 'Tab', 'Escape', 'ArrowDown'.",
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"}
                },
                "required": ["key"]
            }),
        ),
        tool(
            "scroll",
            "Scroll the page.",
            json!({
                "type": "object",
                "properties": {
                    "direction": {"type": "string", "enum": ["up", "down"], "description": "Default: down"},
                    "amount": {"type": "integer", "description": "Pixels, default 600"}
                }
            }),
        ),
        tool(
            "upload_resume",
            "Attach the candidate's resume file to a file input. Use this on file inputs instead of click.",
            json!({
                "type": "object",
                "properties": {
                    "ref": {"type": "string", "description": "File input ref from the page outline"},
                    "selector": {"type": "string", "description": "CSS selector fallback"}
                }
            }),
        ),
        tool(
            "read_page",
            "Read the visible text of the current page (for job descriptions or confirmation messages).",
            json!({
                "type": "object",
                "properties": {}
            }),
        ),
        tool(
            "wait",
            "Wait for a CSS selector to appear, or for a fixed time.",
            json!({
                "type": "object",
                "properties": {
                    "selector": {"type": "string", "description": "Selector to wait for"},
                    "seconds": {"type": "integer", "description": "Seconds to wait when no selector is given (max 10)"}
                }
            }),
        ),
        tool(
            "done",
            "Finish the run. Call as soon as the application is submitted, or when it cannot proceed.",
            json!({
                "type": "object",
                "properties": {
                    "result": {"type": "string", "description": "What happened, in one or two sentences"},
                    "success": {"type": "boolean", "description": "Whether the application was submitted"}
                },
                "required": ["result", "success"]
            }),
        ),
    ]
}

fn tool(name: &str, description: &str, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tools_shape() {
        let tools = action_tools();
        let names: Vec<&str> = tools
            .iter()
            .map(|t| t["function"]["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"navigate"));
        assert!(names.contains(&"click"));
        assert!(names.contains(&"upload_resume"));
        assert!(names.contains(&"done"));
        // Every schema is a function with an object parameter block.
        for t in &tools {
            assert_eq!(t["type"], "function");
            assert_eq!(t["function"]["parameters"]["type"], "object");
        }
    }
}
