//! Wire framing for run output.
//!
//! Each [`ExecutionEvent`] becomes one JSON frame. Frames travel as standard
//! base64 of the JSON text on an SSE `data:` line. Every frame stream ends
//! with exactly one terminal frame, `{"type": "done"}` or `{"error": ...}`.

use std::pin::Pin;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};

use scribe_core::error::ScribeError;
use scribe_core::events::ExecutionEvent;
use scribe_core::hitl::{ChoiceAction, Decision};
use scribe_core::mode::Mode;
use scribe_core::serializer::{serialize, ExecObject};

use crate::engine::{Engine, EventStream, DEFAULT_THREAD_ID};

fn default_thread_id() -> String {
    DEFAULT_THREAD_ID.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResumeRequest {
    pub interrupt_id: String,
    #[serde(alias = "choice")]
    pub choice_action: ChoiceAction,
    #[serde(default, alias = "choice_data")]
    pub additional_data: String,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl ResumeRequest {
    pub fn decision(&self) -> Decision {
        Decision {
            choice_action: self.choice_action,
            choice_data: self.additional_data.clone(),
        }
    }
}

/// One outbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame(Value);

impl Frame {
    pub fn from_event(event: &ExecutionEvent) -> Self {
        let value = match event {
            ExecutionEvent::Update { node, messages } => serialize(&ExecObject::Map(vec![(
                node.clone(),
                ExecObject::Map(vec![("messages".to_string(), ExecObject::messages(messages))]),
            )])),
            ExecutionEvent::Interrupt { interrupts, state } => json!({
                "type": "interrupt",
                "interrupts": serialize(&ExecObject::interrupts(interrupts)),
                "state": serialize(&ExecObject::Snapshot(state)),
            }),
            ExecutionEvent::Done => json!({"type": "done"}),
            ExecutionEvent::Error { message } => json!({"error": message}),
        };
        Frame(value)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Frame(json!({"error": message.into()}))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn is_terminal(&self) -> bool {
        self.0.get("error").is_some() || self.0.get("type").and_then(Value::as_str) == Some("done")
    }

    /// Base64 of the JSON text.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.0.to_string())
    }

    /// Full SSE record, including the blank-line terminator.
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.encode())
    }

    pub fn decode(encoded: &str) -> anyhow::Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(Frame(serde_json::from_slice(&bytes)?))
    }
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

/// Maps an event stream to frames, stopping after the first terminal frame
/// and supplying one if the run ended without it.
pub fn frames(events: EventStream) -> FrameStream {
    let mut events = events;
    Box::pin(async_stream::stream! {
        let mut terminated = false;
        while let Some(event) = events.next().await {
            let frame = Frame::from_event(&event);
            let terminal = frame.is_terminal();
            yield frame;
            if terminal {
                terminated = true;
                break;
            }
        }
        if !terminated {
            tracing::warn!("Run stream closed without a terminal event");
            yield Frame::error("run ended unexpectedly");
        }
    })
}

/// Request-level entry points used by the HTTP surface.
#[derive(Clone)]
pub struct Gateway {
    engine: Engine,
}

impl Gateway {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn stream_message(&self, request: MessageRequest) -> Result<FrameStream, ScribeError> {
        let events = self
            .engine
            .start_message(&request.thread_id, &request.message, request.mode)
            .await?;
        Ok(frames(events))
    }

    pub async fn stream_resume(&self, request: ResumeRequest) -> Result<FrameStream, ScribeError> {
        let events = self
            .engine
            .start_resume(
                &request.thread_id,
                &request.interrupt_id,
                request.decision(),
                request.mode,
            )
            .await?;
        Ok(frames(events))
    }
}
