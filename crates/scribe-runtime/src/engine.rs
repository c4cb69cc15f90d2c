//! The interruptible orchestration engine.
//!
//! A run advances one thread through model turns and tool calls as an
//! explicit state machine ([`RunState`]). Gated tool calls end the run with a
//! persisted [`Interrupt`]; a later resume loads that continuation from the
//! [`SessionStore`] and picks up exactly where the run stopped, even in a
//! different process.
//!
//! Validation, protocol checks and the per-thread guard all happen before the
//! event stream is handed out, so callers can reject a bad request without
//! ever opening a stream.
//!
//! Each run is driven by its own task. The returned stream only observes it:
//! a client that goes away does not stop a model call or tool call halfway,
//! and the thread stays locked until the run has finished.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use scribe_core::error::ScribeError;
use scribe_core::events::{ExecutionEvent, Notice, NoticeHub, ToolLifecycle, ToolLifecycleKind};
use scribe_core::hitl::{Decision, Interrupt};
use scribe_core::llm::{LanguageModel, LlmRequest};
use scribe_core::messaging::{Message, MessageContent, MessageRole, ToolCall, ToolStatus};
use scribe_core::mode::Mode;
use scribe_core::persistence::{SessionStore, ThreadId};
use scribe_core::prompts::SUMMARY_PROMPT;
use scribe_core::state::{ConversationState, StateSnapshot};
use scribe_core::tools::{ToolBox, ToolContext, ToolRegistry};

use crate::config::{Settings, SettingsSource};
use crate::locks::{ThreadGuard, ThreadLocks};
use crate::middleware::{build_request, default_stack, RequestMiddleware};
use crate::registry::ToolCatalog;

pub type EventStream = Pin<Box<dyn Stream<Item = ExecutionEvent> + Send>>;

/// Node name for updates produced by a model turn.
pub const MODEL_NODE: &str = "call_llm";
/// Node name for updates produced by tool execution.
pub const TOOLS_NODE: &str = "tools";
pub const DEFAULT_THREAD_ID: &str = "default";

const REJECTED_TEXT: &str = "User rejected the tool call.";
const ABANDONED_TEXT: &str =
    "This tool call did not finish before the run stopped and was not retried.";
const EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Ready,
    ModelCall,
    AutoToolExec,
    GatedToolWait,
    Done,
    Error,
}

/// Result of folding older history into the thread summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    /// Messages removed from the history.
    pub folded: usize,
    pub summary: String,
}

struct EngineInner {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn SessionStore>,
    catalog: ToolCatalog,
    settings: SettingsSource,
    notices: NoticeHub,
    locks: ThreadLocks,
}

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

pub struct EngineBuilder {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn SessionStore>,
    catalog: ToolCatalog,
    settings: SettingsSource,
    notices: Option<NoticeHub>,
}

impl EngineBuilder {
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_settings(mut self, settings: SettingsSource) -> Self {
        self.settings = settings;
        self
    }

    /// Share a notice hub with other components (e.g. the WebSocket route).
    pub fn with_notices(mut self, notices: NoticeHub) -> Self {
        self.notices = Some(notices);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                model: self.model,
                store: self.store,
                catalog: self.catalog,
                settings: self.settings,
                notices: self.notices.unwrap_or_default(),
                locks: ThreadLocks::new(),
            }),
        }
    }
}

impl Engine {
    pub fn builder(model: Arc<dyn LanguageModel>, store: Arc<dyn SessionStore>) -> EngineBuilder {
        EngineBuilder {
            model,
            store,
            catalog: ToolCatalog::new(),
            settings: SettingsSource::default(),
            notices: None,
        }
    }

    pub fn notices(&self) -> &NoticeHub {
        &self.inner.notices
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.inner.catalog
    }

    pub async fn settings(&self) -> Settings {
        self.inner.settings.load().await
    }

    /// Starts a run for a new human message.
    pub async fn start_message(
        &self,
        thread_id: &str,
        message: &str,
        mode: Mode,
    ) -> Result<EventStream, ScribeError> {
        let thread_id = checked_thread_id(thread_id)?;
        let text = message.trim();
        if text.is_empty() {
            return Err(ScribeError::validation("message must not be empty"));
        }

        let guard = self.inner.locks.acquire(&thread_id)?;
        let mut state = self.load_state(&thread_id).await?.unwrap_or_default();
        if let Some(pending) = &state.pending {
            return Err(ScribeError::protocol(format!(
                "thread '{thread_id}' is waiting on interrupt '{}'; answer it before sending new messages",
                pending.id
            )));
        }

        state.mode = Some(mode);
        let human = Message::human(text);
        let run = if state.unanswered_calls().is_empty() {
            state.push(human)?;
            self.save_state(&thread_id, &state).await?;
            self.prepare_run(thread_id, mode, state, None, guard).await
        } else {
            // A previous run stopped between a model reply and its tool
            // results. Those calls are answered before the message goes in.
            tracing::warn!(thread_id = %thread_id, "Thread has unanswered tool calls from an earlier run");
            let mut run = self.prepare_run(thread_id, mode, state, None, guard).await;
            run.queued = Some(human);
            run
        };

        tracing::info!(thread_id = %run.thread_id, mode = %mode, "Starting run for new message");
        Ok(run.spawn())
    }

    /// Resumes a run suspended on `interrupt_id` with the author's decision.
    /// Without an explicit mode the thread's last mode is used.
    pub async fn start_resume(
        &self,
        thread_id: &str,
        interrupt_id: &str,
        decision: Decision,
        mode: Option<Mode>,
    ) -> Result<EventStream, ScribeError> {
        let thread_id = checked_thread_id(thread_id)?;
        let interrupt_id = interrupt_id.trim();
        if interrupt_id.is_empty() {
            return Err(ScribeError::validation("interrupt_id must not be empty"));
        }

        let guard = self.inner.locks.acquire(&thread_id)?;
        let mut state = self.load_state(&thread_id).await?.unwrap_or_default();
        let interrupt = state.pending_for(interrupt_id)?.clone();

        let mode = mode.or(state.mode).unwrap_or_default();
        state.mode = Some(mode);

        tracing::info!(
            thread_id = %thread_id,
            interrupt_id = %interrupt.id,
            tool = %interrupt.tool_call.name,
            choice = decision.choice_action.as_wire(),
            "Resuming suspended run"
        );
        let run = self
            .prepare_run(thread_id, mode, state, Some((interrupt, decision)), guard)
            .await;
        Ok(run.spawn())
    }

    /// Folds older history into the thread summary through the model,
    /// keeping the configured number of trailing messages.
    pub async fn summarize(&self, thread_id: &str) -> Result<SummaryOutcome, ScribeError> {
        let thread_id = checked_thread_id(thread_id)?;
        let _guard = self.inner.locks.acquire(&thread_id)?;
        let Some(mut state) = self.load_state(&thread_id).await? else {
            return Ok(SummaryOutcome {
                folded: 0,
                summary: String::new(),
            });
        };
        if state.pending.is_some() {
            return Err(ScribeError::protocol(format!(
                "thread '{thread_id}' has a pending interrupt; resolve it before summarizing"
            )));
        }

        let settings = self.inner.settings.load().await;
        let cut = state.summary_cut(settings.summary.keep_messages);
        if cut == 0 {
            return Ok(SummaryOutcome {
                folded: 0,
                summary: state.summary,
            });
        }

        let transcript = render_transcript(&state.summary, &state.messages[..cut]);
        let request = LlmRequest::new(SUMMARY_PROMPT, vec![Message::human(transcript)]);
        let response = self
            .inner
            .model
            .generate(request)
            .await
            .map_err(ScribeError::model)?;

        let summary = response.message.text().trim().to_string();
        if summary.is_empty() {
            return Err(ScribeError::Model("summary response was empty".into()));
        }

        state.summary = summary.clone();
        state.messages.drain(..cut);
        self.save_state(&thread_id, &state).await?;

        tracing::info!(thread_id = %thread_id, folded = cut, kept = state.messages.len(), "Summarized thread history");
        Ok(SummaryOutcome {
            folded: cut,
            summary,
        })
    }

    pub async fn snapshot(&self, thread_id: &str) -> Result<Option<StateSnapshot>, ScribeError> {
        let thread_id = checked_thread_id(thread_id)?;
        Ok(self
            .load_state(&thread_id)
            .await?
            .map(|state| StateSnapshot::capture(&thread_id, &state)))
    }

    /// Removes a thread. Refused while a run holds it.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), ScribeError> {
        let thread_id = checked_thread_id(thread_id)?;
        let _guard = self.inner.locks.acquire(&thread_id)?;
        self.inner
            .store
            .delete_thread(&thread_id)
            .await
            .map_err(ScribeError::storage)?;
        tracing::info!(thread_id = %thread_id, "Deleted thread");
        Ok(())
    }

    pub async fn list_threads(&self) -> Result<Vec<ThreadId>, ScribeError> {
        self.inner
            .store
            .list_threads()
            .await
            .map_err(ScribeError::storage)
    }

    async fn load_state(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, ScribeError> {
        let state = self
            .inner
            .store
            .load(thread_id)
            .await
            .map_err(ScribeError::storage)?;
        match &state {
            Some(state) => tracing::debug!(
                thread_id = %thread_id,
                messages = state.messages.len(),
                pending = state.pending.is_some(),
                "Loaded conversation state"
            ),
            None => tracing::debug!(thread_id = %thread_id, "No saved state found for thread"),
        }
        Ok(state)
    }

    async fn save_state(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), ScribeError> {
        self.inner
            .store
            .save(thread_id, state)
            .await
            .map_err(ScribeError::storage)
    }

    async fn prepare_run(
        &self,
        thread_id: ThreadId,
        mode: Mode,
        state: ConversationState,
        resume: Option<(Interrupt, Decision)>,
        guard: ThreadGuard,
    ) -> Run {
        let settings = self.inner.settings.load().await;
        let registry = self.inner.catalog.load(mode, &settings);
        let middlewares = default_stack(mode, &settings);
        Run {
            engine: self.clone(),
            thread_id,
            mode,
            state,
            settings,
            registry,
            middlewares,
            resume,
            queued: None,
            iterations: 0,
            guard,
        }
    }
}

fn checked_thread_id(thread_id: &str) -> Result<ThreadId, ScribeError> {
    let thread_id = thread_id.trim();
    if thread_id.is_empty() {
        return Err(ScribeError::validation("thread_id must not be empty"));
    }
    Ok(thread_id.to_string())
}

type Step = (RunState, Vec<ExecutionEvent>);

/// One in-flight run. Owns the thread guard, so the thread is released
/// only once the run reaches a terminal state.
struct Run {
    engine: Engine,
    thread_id: ThreadId,
    mode: Mode,
    state: ConversationState,
    settings: Settings,
    registry: ToolRegistry,
    middlewares: Vec<Arc<dyn RequestMiddleware>>,
    resume: Option<(Interrupt, Decision)>,
    /// Human message held back until leftover tool calls are answered.
    queued: Option<Message>,
    iterations: usize,
    guard: ThreadGuard,
}

impl Run {
    /// Drives the run on its own task and streams its events.
    fn spawn(self) -> EventStream {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            let mut run = self;
            let mut phase = RunState::Ready;
            let mut listening = true;
            let last = 'run: loop {
                let (next, events) = run.advance(phase).await;
                for event in events {
                    if event.is_terminal() {
                        break 'run event;
                    }
                    if listening && tx.send(event).await.is_err() {
                        listening = false;
                        tracing::info!(thread_id = %run.thread_id, "Client went away; run continues");
                    }
                }
                phase = next;
            };
            tracing::debug!(thread_id = %run.guard.thread_id(), iterations = run.iterations, "Run finished");

            // Unlock the thread before the caller sees the end of the stream.
            drop(run);
            let _ = tx.send(last).await;
        });

        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        })
    }

    async fn advance(&mut self, phase: RunState) -> Step {
        match phase {
            RunState::Ready => self.ready().await,
            RunState::ModelCall => self.call_model().await,
            RunState::AutoToolExec => self.run_next_tool().await,
            RunState::GatedToolWait => self.suspend().await,
            RunState::Done => match self.persist().await {
                Ok(()) => (RunState::Done, vec![ExecutionEvent::Done]),
                Err(err) => self.fail(err),
            },
            RunState::Error => self.fail(ScribeError::Protocol("run already failed".into())),
        }
    }

    async fn ready(&mut self) -> Step {
        if let Some(human) = self.queued.take() {
            return match self.answer_leftover_calls(human).await {
                Ok(events) => (RunState::ModelCall, events),
                Err(err) => self.fail(err),
            };
        }
        let Some((interrupt, decision)) = self.resume.take() else {
            return (RunState::ModelCall, Vec::new());
        };
        match self.apply_decision(interrupt, decision).await {
            Ok(message) => (
                RunState::AutoToolExec,
                vec![ExecutionEvent::update(TOOLS_NODE, vec![message])],
            ),
            Err(err) => self.fail(err),
        }
    }

    /// Gives every unanswered call of the latest agent message a result,
    /// then appends `human`. Auto tools run now. Gated calls are closed with
    /// an error result, since they may already have run once.
    async fn answer_leftover_calls(
        &mut self,
        human: Message,
    ) -> Result<Vec<ExecutionEvent>, ScribeError> {
        let mut events = Vec::new();
        for call in self.state.unanswered_calls() {
            let message = match self.registry.get(&call.name).cloned() {
                Some(tool) if !tool.requires_gate() => self.invoke(&tool, &call, None).await,
                Some(_) => Message::tool_result(
                    &call,
                    MessageContent::Text(ABANDONED_TEXT.to_string()),
                    ToolStatus::Error,
                ),
                None => self.unavailable(&call),
            };
            self.state.push(message.clone())?;
            self.persist().await?;
            events.push(ExecutionEvent::update(TOOLS_NODE, vec![message]));
        }

        self.state.push(human)?;
        self.persist().await?;
        Ok(events)
    }

    /// Splices the author's decision into the suspended call. Rejections
    /// never reach the tool.
    ///
    /// The interrupt is marked resolved and saved before the tool runs, so
    /// a replay after a later failure is refused rather than running the
    /// tool a second time.
    async fn apply_decision(
        &mut self,
        interrupt: Interrupt,
        decision: Decision,
    ) -> Result<Message, ScribeError> {
        self.state.resolve_pending();
        self.persist().await?;

        let call = interrupt.tool_call;
        let message = if decision.is_approved() {
            match self.registry.get(&call.name).cloned() {
                Some(tool) => self.invoke(&tool, &call, Some(decision)).await,
                None => self.unavailable(&call),
            }
        } else {
            tracing::info!(thread_id = %self.thread_id, tool = %call.name, "Tool call rejected by author");
            Message::tool_result(
                &call,
                MessageContent::Text(append_note(REJECTED_TEXT, &decision.choice_data)),
                ToolStatus::Cancelled,
            )
        };

        self.state.push(message.clone())?;
        self.persist().await?;
        Ok(message)
    }

    async fn call_model(&mut self) -> Step {
        self.iterations += 1;
        if self.iterations > self.settings.max_iterations {
            return self.fail(ScribeError::Model(format!(
                "run exceeded {} model calls without finishing",
                self.settings.max_iterations
            )));
        }

        let request = match build_request(
            self.mode,
            &self.settings,
            &self.state,
            &self.registry,
            &self.middlewares,
        )
        .await
        {
            Ok(request) => request,
            Err(err) => return self.fail(ScribeError::model(err)),
        };

        tracing::debug!(
            thread_id = %self.thread_id,
            iteration = self.iterations,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling model"
        );

        let response = match self.engine.inner.model.generate(request).await {
            Ok(response) => response,
            Err(err) => return self.fail(ScribeError::model(err)),
        };

        let reply = normalize_reply(response.message, &self.state);
        if let Err(err) = self.state.push(reply.clone()) {
            return self.fail(err);
        }
        if let Err(err) = self.persist().await {
            return self.fail(err);
        }
        self.notify_reply(&reply);

        let next = if reply.tool_calls.is_empty() {
            RunState::Done
        } else {
            RunState::AutoToolExec
        };
        (next, vec![ExecutionEvent::update(MODEL_NODE, vec![reply])])
    }

    /// Handles the next unanswered call of the latest agent message, or
    /// hands back to the model once every call has a result.
    async fn run_next_tool(&mut self) -> Step {
        let Some(call) = self.state.unanswered_calls().into_iter().next() else {
            return (RunState::ModelCall, Vec::new());
        };
        let Some(tool) = self.registry.get(&call.name).cloned() else {
            let message = self.unavailable(&call);
            return self.record_tool_result(message).await;
        };
        if tool.requires_gate() {
            return (RunState::GatedToolWait, Vec::new());
        }
        let message = self.invoke(&tool, &call, None).await;
        self.record_tool_result(message).await
    }

    async fn record_tool_result(&mut self, message: Message) -> Step {
        if let Err(err) = self.state.push(message.clone()) {
            return self.fail(err);
        }
        if let Err(err) = self.persist().await {
            return self.fail(err);
        }
        (
            RunState::AutoToolExec,
            vec![ExecutionEvent::update(TOOLS_NODE, vec![message])],
        )
    }

    /// Persists an interrupt for the first unanswered (gated) call and ends
    /// the run. Later calls of the same turn wait for the resume.
    async fn suspend(&mut self) -> Step {
        let Some(call) = self.state.unanswered_calls().into_iter().next() else {
            return (RunState::ModelCall, Vec::new());
        };
        let Some(tool) = self.registry.get(&call.name).cloned() else {
            return (RunState::AutoToolExec, Vec::new());
        };

        if let Err(err) = tool.preview(&call.args, &self.tool_context(&call)).await {
            tracing::warn!(thread_id = %self.thread_id, tool = %call.name, error = %err, "Tool preview failed");
        }

        let interrupt = Interrupt::for_call(call.clone(), tool.gate_prompt(&call.args));
        self.state.pending = Some(interrupt.clone());
        if let Err(err) = self.persist().await {
            return self.fail(err);
        }

        tracing::info!(
            thread_id = %self.thread_id,
            interrupt_id = %interrupt.id,
            tool = %call.name,
            "Suspended run for author approval"
        );
        self.notify_tool(
            ToolLifecycleKind::ToolInterrupted,
            &call,
            json!({"interrupt_id": interrupt.id, "prompt": interrupt.prompt}),
        );

        let snapshot = StateSnapshot::capture(&self.thread_id, &self.state);
        (
            RunState::GatedToolWait,
            vec![
                ExecutionEvent::Interrupt {
                    interrupts: vec![interrupt],
                    state: snapshot,
                },
                ExecutionEvent::Done,
            ],
        )
    }

    async fn invoke(&self, tool: &ToolBox, call: &ToolCall, decision: Option<Decision>) -> Message {
        self.notify_tool(ToolLifecycleKind::ToolStarted, call, json!({"args": call.args}));

        let note = decision
            .as_ref()
            .map(|decision| decision.choice_data.clone())
            .unwrap_or_default();
        let mut ctx = self.tool_context(call);
        if let Some(decision) = decision {
            ctx = ctx.with_decision(decision);
        }

        match tool.execute(call.args.clone(), ctx).await {
            Ok(result) => {
                self.notify_tool(ToolLifecycleKind::ToolCompleted, call, json!({}));
                let content = if note.trim().is_empty() {
                    result.content
                } else {
                    MessageContent::Text(append_note(&result.content.to_text(), &note))
                };
                Message::tool_result(call, content, ToolStatus::Success)
            }
            Err(err) => {
                let error = ScribeError::Tool {
                    tool: call.name.clone(),
                    message: format!("{err:#}"),
                };
                tracing::warn!(thread_id = %self.thread_id, tool = %call.name, error = %error, "Tool execution failed");
                self.notify_tool(
                    ToolLifecycleKind::ToolFailed,
                    call,
                    json!({"error": error.to_string()}),
                );
                Message::tool_result(
                    call,
                    MessageContent::Text(error.to_string()),
                    ToolStatus::Error,
                )
            }
        }
    }

    fn unavailable(&self, call: &ToolCall) -> Message {
        tracing::warn!(thread_id = %self.thread_id, tool = %call.name, mode = %self.mode, "Model called a tool that is not enabled");
        Message::tool_result(
            call,
            MessageContent::Text(format!(
                "Tool '{}' is not available in {} mode.",
                call.name, self.mode
            )),
            ToolStatus::Error,
        )
    }

    fn tool_context(&self, call: &ToolCall) -> ToolContext {
        ToolContext::new(&self.thread_id, self.mode, self.engine.inner.notices.clone())
            .with_call_id(&call.id)
    }

    async fn persist(&self) -> Result<(), ScribeError> {
        self.engine.save_state(&self.thread_id, &self.state).await
    }

    fn fail(&self, err: ScribeError) -> Step {
        tracing::error!(thread_id = %self.thread_id, error = %err, "Run failed; keeping last persisted state");
        (RunState::Error, vec![ExecutionEvent::error(err.to_string())])
    }

    fn notify_tool(&self, kind: ToolLifecycleKind, call: &ToolCall, detail: Value) {
        let mut payload = json!({
            "thread_id": self.thread_id,
            "tool_call_id": call.id,
            "tool_name": call.name,
        });
        if let (Value::Object(map), Value::Object(extra)) = (&mut payload, detail) {
            map.extend(extra);
        }
        self.engine
            .inner
            .notices
            .publish(Notice::ToolCall(ToolLifecycle::new(kind, payload)));
    }

    fn notify_reply(&self, reply: &Message) {
        let tool_calls: Vec<&str> = reply.tool_calls.iter().map(|call| call.name.as_str()).collect();
        self.engine.inner.notices.publish(Notice::AiResponse(ToolLifecycle::named(
            "ai_message",
            json!({
                "thread_id": self.thread_id,
                "message_id": reply.id,
                "content": reply.text(),
                "tool_calls": tool_calls,
            }),
        )));
    }
}

/// Forces the model reply into a well-formed agent message: unique,
/// non-empty tool-call ids and object arguments.
fn normalize_reply(mut reply: Message, state: &ConversationState) -> Message {
    reply.role = MessageRole::Agent;
    reply.metadata = None;
    if reply.id.trim().is_empty() {
        reply.id = uuid::Uuid::new_v4().to_string();
    }

    let mut seen: HashSet<String> = state
        .messages
        .iter()
        .flat_map(|message| message.tool_calls.iter().map(|call| call.id.clone()))
        .collect();
    for call in &mut reply.tool_calls {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            call.id = ToolCall::new(call.name.clone(), Value::Null).id;
            seen.insert(call.id.clone());
        }
        if call.args.is_null() {
            call.args = json!({});
        }
    }
    reply
}

fn append_note(text: &str, note: &str) -> String {
    let note = note.trim();
    if note.is_empty() {
        text.to_string()
    } else {
        format!("{text}\nUser note: {note}")
    }
}

fn render_transcript(previous_summary: &str, messages: &[Message]) -> String {
    let mut out = String::new();
    if !previous_summary.trim().is_empty() {
        out.push_str("Earlier summary:\n");
        out.push_str(previous_summary.trim());
        out.push_str("\n\n");
    }
    out.push_str("Conversation:\n");
    for message in messages {
        let speaker = match message.role {
            MessageRole::System => "System".to_string(),
            MessageRole::Human => "Author".to_string(),
            MessageRole::Agent => "Assistant".to_string(),
            MessageRole::Tool => format!("Tool {}", message.tool_name().unwrap_or("result")),
        };
        out.push_str(&format!("{speaker}: {}\n", message.text()));
        for call in &message.tool_calls {
            out.push_str(&format!("  -> {}({})\n", call.name, call.args));
        }
    }
    out
}
