//! OpenAI-compatible chat completions with native tool calling.
//!
//! Works against any endpoint speaking the `/v1/chat/completions` dialect
//! (OpenAI, DeepSeek, local gateways). When an endpoint answers with tool
//! calls written into the text instead, [`crate::planner`] recovers them.

use async_trait::async_trait;
use reqwest::Client;
use scribe_core::llm::{LanguageModel, LlmRequest, LlmResponse};
use scribe_core::messaging::{Message, MessageContent, MessageRole, ToolCall};
use scribe_core::tools::ToolSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::planner::agent_message_from_text;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: Option<String>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_url: None,
        }
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        self.api_url = api_url;
        self
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

pub struct OpenAiChatModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .user_agent(concat!("scribe/", env!("CARGO_PKG_VERSION")))
                .build()?,
            config,
        })
    }

    fn url(&self) -> &str {
        self.config.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [OpenAiMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a scribe_core::tools::ToolParameterSchema,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OpenAiFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API transmits them.
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

fn to_openai_messages(request: &LlmRequest) -> Vec<OpenAiMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(OpenAiMessage {
        role: "system",
        content: request.system_prompt.clone(),
        tool_calls: Vec::new(),
        tool_call_id: None,
    });

    for msg in &request.messages {
        let content = match &msg.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Json(value) => value.to_string(),
        };
        let (role, tool_calls, tool_call_id) = match msg.role {
            MessageRole::System => ("system", Vec::new(), None),
            MessageRole::Human => ("user", Vec::new(), None),
            MessageRole::Agent => (
                "assistant",
                msg.tool_calls.iter().map(to_openai_tool_call).collect(),
                None,
            ),
            MessageRole::Tool => match msg.tool_call_id() {
                Some(id) => ("tool", Vec::new(), Some(id.to_string())),
                None => {
                    tracing::warn!("Skipping tool message without a tool_call_id");
                    continue;
                }
            },
        };
        messages.push(OpenAiMessage {
            role,
            content,
            tool_calls,
            tool_call_id,
        });
    }
    messages
}

fn to_openai_tool_call(call: &ToolCall) -> OpenAiToolCall {
    OpenAiToolCall {
        id: call.id.clone(),
        kind: function_kind(),
        function: OpenAiFunctionCall {
            name: call.name.clone(),
            arguments: call.args.to_string(),
        },
    }
}

fn to_openai_tools(schemas: &[ToolSchema]) -> Vec<OpenAiTool<'_>> {
    schemas
        .iter()
        .map(|schema| OpenAiTool {
            kind: "function",
            function: OpenAiFunction {
                name: &schema.name,
                description: &schema.description,
                parameters: &schema.parameters,
            },
        })
        .collect()
}

fn from_choice(choice: ChoiceMessage) -> Message {
    let content = choice.content.unwrap_or_default();
    if choice.tool_calls.is_empty() {
        return agent_message_from_text(&content);
    }

    let calls = choice
        .tool_calls
        .into_iter()
        .map(|call| {
            let args = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|err| {
                    tracing::warn!(tool = %call.function.name, error = %err, "Tool arguments are not valid JSON");
                    Value::String(call.function.arguments.clone())
                })
            };
            ToolCall::new(call.function.name, args).with_id(call.id)
        })
        .collect();
    Message::agent(content).with_tool_calls(calls)
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn generate(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        let messages = to_openai_messages(&request);
        let body = ChatRequest {
            model: &self.config.model,
            messages: &messages,
            tools: to_openai_tools(&request.tools),
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = request.tools.len(),
            "OpenAI request"
        );

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %error_text, "OpenAI API error");
            return Err(anyhow::anyhow!("OpenAI API error: {} - {}", status, error_text));
        }

        let data: ChatResponse = response.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("OpenAI response missing choices"))?;

        Ok(LlmResponse {
            message: from_choice(choice.message),
        })
    }
}
