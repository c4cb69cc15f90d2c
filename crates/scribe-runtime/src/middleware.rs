use std::sync::Arc;

use async_trait::async_trait;
use scribe_core::llm::LlmRequest;
use scribe_core::messaging::Message;
use scribe_core::mode::Mode;
use scribe_core::state::ConversationState;
use scribe_core::tools::ToolRegistry;

use crate::config::Settings;

/// Request sent to the underlying language model. Middlewares can augment
/// the system prompt or mutate the pending message list before the model call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            max_tokens: None,
        }
    }

    pub fn append_prompt(&mut self, fragment: &str) {
        if !fragment.is_empty() {
            self.system_prompt.push_str("\n\n");
            self.system_prompt.push_str(fragment);
        }
    }

    pub fn into_llm_request(self, registry: &ToolRegistry) -> LlmRequest {
        LlmRequest::new(self.system_prompt, self.messages)
            .with_tools(registry.schemas())
            .with_max_tokens(self.max_tokens)
    }
}

/// Read-only view of the run a middleware is shaping a request for.
pub struct MiddlewareContext<'a> {
    pub request: &'a mut ModelRequest,
    pub state: &'a ConversationState,
    pub registry: &'a ToolRegistry,
    pub mode: Mode,
}

#[async_trait]
pub trait RequestMiddleware: Send + Sync {
    /// Unique identifier for logging and diagnostics.
    fn id(&self) -> &'static str;

    async fn modify_model_request(&self, ctx: &mut MiddlewareContext<'_>) -> anyhow::Result<()>;
}

/// Token budget for the mode.
pub struct TokenLimitMiddleware {
    max_tokens: u32,
}

impl TokenLimitMiddleware {
    pub fn new(max_tokens: u32) -> Self {
        Self { max_tokens }
    }
}

#[async_trait]
impl RequestMiddleware for TokenLimitMiddleware {
    fn id(&self) -> &'static str {
        "token-limit"
    }

    async fn modify_model_request(&self, ctx: &mut MiddlewareContext<'_>) -> anyhow::Result<()> {
        ctx.request.max_tokens = Some(self.max_tokens);
        Ok(())
    }
}

/// Places the folded-history summary in front of the live messages.
pub struct SummaryNoteMiddleware;

#[async_trait]
impl RequestMiddleware for SummaryNoteMiddleware {
    fn id(&self) -> &'static str {
        "summary-note"
    }

    async fn modify_model_request(&self, ctx: &mut MiddlewareContext<'_>) -> anyhow::Result<()> {
        let summary = ctx.state.summary.trim();
        if !summary.is_empty() {
            ctx.request.messages.insert(
                0,
                Message::system(format!("Summary of the earlier conversation:\n{summary}")),
            );
        }
        Ok(())
    }
}

/// Tells the model which of its tools pause for the author.
pub struct ApprovalNoticeMiddleware;

impl ApprovalNoticeMiddleware {
    fn prompt_fragment(registry: &ToolRegistry) -> Option<String> {
        let gated: Vec<String> = registry
            .names()
            .into_iter()
            .filter(|name| registry.get(name).is_some_and(|tool| tool.requires_gate()))
            .map(|name| format!("- {name}"))
            .collect();
        if gated.is_empty() {
            None
        } else {
            Some(format!(
                "The following tools wait for the author's approval before they run. \
                 The author may reject them or attach a note to the result:\n{}",
                gated.join("\n")
            ))
        }
    }
}

#[async_trait]
impl RequestMiddleware for ApprovalNoticeMiddleware {
    fn id(&self) -> &'static str {
        "approval-notice"
    }

    async fn modify_model_request(&self, ctx: &mut MiddlewareContext<'_>) -> anyhow::Result<()> {
        if let Some(fragment) = Self::prompt_fragment(ctx.registry) {
            ctx.request.append_prompt(&fragment);
        }
        Ok(())
    }
}

/// Middleware stack used for every model call of a run in `mode`.
pub fn default_stack(mode: Mode, settings: &Settings) -> Vec<Arc<dyn RequestMiddleware>> {
    vec![
        Arc::new(SummaryNoteMiddleware),
        Arc::new(ApprovalNoticeMiddleware),
        Arc::new(TokenLimitMiddleware::new(settings.max_tokens(mode))),
    ]
}

/// Mode instructions plus every middleware applied in order.
pub async fn build_request(
    mode: Mode,
    settings: &Settings,
    state: &ConversationState,
    registry: &ToolRegistry,
    middlewares: &[Arc<dyn RequestMiddleware>],
) -> anyhow::Result<LlmRequest> {
    let mut request = ModelRequest::new(settings.system_prompt(mode), state.messages.clone());
    for middleware in middlewares {
        let mut ctx = MiddlewareContext {
            request: &mut request,
            state,
            registry,
            mode,
        };
        middleware.modify_model_request(&mut ctx).await.map_err(|err| {
            anyhow::anyhow!("middleware '{}' failed: {err:#}", middleware.id())
        })?;
    }
    Ok(request.into_llm_request(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeSettings;
    use crate::registry::ToolCatalog;
    use scribe_core::messaging::MessageRole;
    use scribe_toolkit::Workspace;

    fn registry() -> ToolRegistry {
        ToolCatalog::builtin(Workspace::new("/tmp/novel")).load(Mode::Writing, &Settings::default())
    }

    #[tokio::test]
    async fn request_carries_mode_prompt_summary_and_tools() {
        let settings = Settings::default().with_mode(
            Mode::Writing,
            ModeSettings {
                prompt: Some("Write tersely.".into()),
                max_tokens: Some(1024),
                ..ModeSettings::default()
            },
        );
        let mut state = ConversationState::default();
        state.summary = "Chapter one is drafted.".into();
        state.push(Message::human("Continue")).unwrap();
        let registry = registry();

        let request = build_request(
            Mode::Writing,
            &settings,
            &state,
            &registry,
            &default_stack(Mode::Writing, &settings),
        )
        .await
        .unwrap();

        assert!(request.system_prompt.starts_with("Write tersely."));
        assert!(request.system_prompt.contains("- write_file"));
        assert!(!request.system_prompt.contains("- read_file"));
        assert_eq!(request.max_tokens, Some(1024));
        assert_eq!(request.tools.len(), registry.len());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, MessageRole::System);
        assert!(request.messages[0].text().contains("Chapter one"));
    }

    #[tokio::test]
    async fn empty_summary_adds_no_note() {
        let mut state = ConversationState::default();
        state.push(Message::human("Hi")).unwrap();
        let settings = Settings::default();

        let request = build_request(
            Mode::Outline,
            &settings,
            &state,
            &ToolRegistry::new(),
            &default_stack(Mode::Outline, &settings),
        )
        .await
        .unwrap();

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, Some(4096));
        assert!(request.tools.is_empty());
    }
}
