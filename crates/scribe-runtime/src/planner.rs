//! Fallback parsing of tool calls written into plain reply text.
//!
//! Some OpenAI-compatible endpoints ignore native tool calling and answer
//! with a JSON document instead:
//!
//! ```json
//! {"tool_calls": [{"name": "read_file", "args": {"path": "ch1.md"}}], "response": "Reading"}
//! ```
//!
//! optionally wrapped in a code fence. Anything else is treated as prose.

use scribe_core::messaging::{Message, ToolCall};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct PlannedCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default, alias = "arguments")]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct PlannerOutput {
    #[serde(default)]
    tool_calls: Vec<PlannedCall>,
    #[serde(default)]
    response: Option<String>,
}

/// Builds an agent message from reply text, lifting any embedded tool calls.
pub fn agent_message_from_text(text: &str) -> Message {
    let Some(parsed) = parse_from_text(text) else {
        return Message::agent(text);
    };
    if parsed.tool_calls.is_empty() && parsed.response.is_none() {
        return Message::agent(text);
    }

    let calls = parsed
        .tool_calls
        .into_iter()
        .map(|call| {
            let args = match call.args {
                // Some endpoints double-encode arguments.
                Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                other => other,
            };
            let tool_call = ToolCall::new(call.name, args);
            match call.id {
                Some(id) if !id.trim().is_empty() => tool_call.with_id(id),
                _ => tool_call,
            }
        })
        .collect();

    Message::agent(parsed.response.unwrap_or_default()).with_tool_calls(calls)
}

fn parse_from_text(text: &str) -> Option<PlannerOutput> {
    // 1) Raw JSON
    if let Some(parsed) = decode_output_from_str(text) {
        return Some(parsed);
    }
    // 2) Remove common code fences ```json ... ``` or ``` ... ```
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let without_ticks = trimmed.trim_start_matches("```");
        let without_lang = without_ticks
            .trim_start_matches(|c: char| c.is_alphabetic())
            .trim_start();
        let inner = match without_lang.rfind("```") {
            Some(end) => &without_lang[..end],
            None => without_lang,
        };
        return decode_output_from_str(inner);
    }
    None
}

/// Only JSON objects count; a bare string or number is prose.
fn decode_output_from_str(s: &str) -> Option<PlannerOutput> {
    match serde_json::from_str::<Value>(s.trim()).ok()? {
        value @ Value::Object(_) => serde_json::from_value::<PlannerOutput>(value).ok(),
        _ => None,
    }
}
