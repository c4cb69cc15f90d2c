//! Tool system shared by the engine and the built-in toolkit.
//!
//! Tools are schema-driven: each one describes its parameters with a
//! JSON-schema-like [`ToolParameterSchema`], declares whether it must pause for
//! a human decision, and executes asynchronously against a [`ToolContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::events::NoticeHub;
use crate::hitl::Decision;
use crate::messaging::MessageContent;
use crate::mode::Mode;

/// JSON Schema definition for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ToolParameterSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameterSchema>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameterSchema {
    fn typed(schema_type: &str, description: Option<String>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description,
            properties: None,
            required: None,
            items: None,
            enum_values: None,
            default: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", Some(description.into()))
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::typed("integer", Some(description.into()))
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::typed("boolean", Some(description.into()))
    }

    pub fn object(
        description: impl Into<String>,
        properties: HashMap<String, ToolParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        let mut schema = Self::typed("object", Some(description.into()));
        schema.properties = Some(properties);
        schema.required = Some(required);
        schema
    }

    pub fn array(description: impl Into<String>, items: ToolParameterSchema) -> Self {
        let mut schema = Self::typed("array", Some(description.into()));
        schema.items = Some(Box::new(items));
        schema
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Complete schema definition for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique, stable name the model uses to invoke the tool.
    pub name: String,
    pub description: String,
    pub parameters: ToolParameterSchema,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    pub fn no_params(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut parameters = ToolParameterSchema::typed("object", None);
        parameters.properties = Some(HashMap::new());
        parameters.required = Some(Vec::new());
        Self::new(name, description, parameters)
    }
}

/// Everything a tool may touch while it runs.
#[derive(Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub mode: Mode,
    pub tool_call_id: Option<String>,
    /// Present only when a gated call resumes after human approval.
    pub decision: Option<Decision>,
    pub notices: NoticeHub,
}

impl ToolContext {
    pub fn new(thread_id: impl Into<String>, mode: Mode, notices: NoticeHub) -> Self {
        Self {
            thread_id: thread_id.into(),
            mode,
            tool_call_id: None,
            decision: None,
            notices,
        }
    }

    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(call_id.into());
        self
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// The reviewer's free-form note, empty when no decision was supplied.
    pub fn user_note(&self) -> &str {
        self.decision
            .as_ref()
            .map(|decision| decision.choice_data.as_str())
            .unwrap_or("")
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: MessageContent,
}

impl ToolResult {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn json(content: Value) -> Self {
        Self {
            content: MessageContent::Json(content),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Gated tools suspend the run until a human approves or rejects the call.
    fn requires_gate(&self) -> bool {
        false
    }

    /// Prompt shown to the reviewer when this call is suspended.
    fn gate_prompt(&self, args: &Value) -> String {
        format!(
            "Approve call to `{}` with arguments {}?",
            self.schema().name,
            args
        )
    }

    /// Runs when a gated call is suspended, before any decision exists.
    /// Used to push previews of the pending effect to live clients.
    async fn preview(&self, _args: &Value, _ctx: &ToolContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn execute(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult>;
}

pub type ToolBox = Arc<dyn Tool>;

/// The tool set for one run. Ordered by name so schemas reach the model
/// in a stable order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolBox>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: ToolBox) -> &mut Self {
        let name = tool.schema().name;
        self.tools.insert(name, tool);
        self
    }

    pub fn register_all<I>(&mut self, tools: I) -> &mut Self
    where
        I: IntoIterator<Item = ToolBox>,
    {
        for tool in tools {
            self.register(tool);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&ToolBox> {
        self.tools.get(name)
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
