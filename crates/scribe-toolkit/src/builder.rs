//! Closure-backed tools.
//!
//! `ask_user` and tools registered by embedders are built here instead of
//! carrying a struct and a trait impl each.

use async_trait::async_trait;
use scribe_core::tools::{Tool, ToolBox, ToolContext, ToolParameterSchema, ToolResult, ToolSchema};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type AsyncToolFn =
    Arc<dyn Fn(Value, ToolContext) -> BoxFuture<'static, anyhow::Result<ToolResult>> + Send + Sync>;

/// Renders the approval question shown while a gated call waits.
pub type GatePromptFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

pub struct FunctionTool {
    schema: ToolSchema,
    gated: bool,
    gate_prompt: Option<GatePromptFn>,
    handler: AsyncToolFn,
}

#[async_trait]
impl Tool for FunctionTool {
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    fn requires_gate(&self) -> bool {
        self.gated
    }

    fn gate_prompt(&self, args: &Value) -> String {
        match &self.gate_prompt {
            Some(render) => render(args),
            None => format!("Approve call to `{}` with arguments {}?", self.schema.name, args),
        }
    }

    async fn execute(&self, args: Value, ctx: ToolContext) -> anyhow::Result<ToolResult> {
        (self.handler)(args, ctx).await
    }
}

pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: Option<ToolParameterSchema>,
    gated: bool,
    gate_prompt: Option<GatePromptFn>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
            gated: false,
            gate_prompt: None,
        }
    }

    pub fn with_parameters(mut self, parameters: ToolParameterSchema) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Require the author's approval before the handler runs.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Gate the tool with a custom approval question.
    pub fn gated_with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.gated = true;
        self.gate_prompt = Some(Arc::new(prompt));
        self
    }

    pub fn build_async<F, Fut>(self, handler: F) -> ToolBox
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
    {
        let schema = match self.parameters {
            Some(parameters) => ToolSchema::new(self.name, self.description, parameters),
            None => ToolSchema::no_params(self.name, self.description),
        };

        let handler: AsyncToolFn = Arc::new(move |args, ctx| Box::pin(handler(args, ctx)));

        Arc::new(FunctionTool {
            schema,
            gated: self.gated,
            gate_prompt: self.gate_prompt,
            handler,
        })
    }

    pub fn build_sync<F>(self, handler: F) -> ToolBox
    where
        F: Fn(Value, ToolContext) -> anyhow::Result<ToolResult> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.build_async(move |args, ctx| {
            let handler = handler.clone();
            async move { handler(args, ctx) }
        })
    }
}

/// Ungated async tool in one call.
pub fn tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: ToolParameterSchema,
    handler: F,
) -> ToolBox
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ToolResult>> + Send + 'static,
{
    ToolBuilder::new(name, description)
        .with_parameters(parameters)
        .build_async(handler)
}
