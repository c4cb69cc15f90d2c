use serde::{Deserialize, Serialize};

/// Core message structure exchanged between the engine, the model, and tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: MessageContent,
    /// Tool calls requested by the model. Only populated on agent messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    Human,
    Agent,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum MessageContent {
    Text(String),
    Json(serde_json::Value),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            MessageContent::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the content as plain text, encoding JSON payloads compactly.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Json(value) => value.to_string(),
        }
    }
}

/// A tool invocation requested by the model inside an agent message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    /// Call id this tool-result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolStatus>,
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Message {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            id: new_message_id(),
            role,
            content,
            tool_calls: Vec::new(),
            metadata: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(text.into()))
    }

    pub fn human(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, MessageContent::Text(text.into()))
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Agent, MessageContent::Text(text.into()))
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Builds a tool-result message answering `call`.
    pub fn tool_result(call: &ToolCall, content: MessageContent, status: ToolStatus) -> Self {
        Self {
            id: new_message_id(),
            role: MessageRole::Tool,
            content,
            tool_calls: Vec::new(),
            metadata: Some(MessageMetadata {
                tool_call_id: Some(call.id.clone()),
                tool_name: Some(call.name.clone()),
                status: Some(status),
            }),
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.tool_call_id.as_deref())
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.tool_name.as_deref())
    }

    pub fn tool_status(&self) -> Option<ToolStatus> {
        self.metadata.as_ref().and_then(|meta| meta.status)
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }
}
