//! Execution events produced by a run, and the out-of-band notice channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::hitl::Interrupt;
use crate::messaging::Message;
use crate::state::StateSnapshot;

/// One unit of a run's output stream. Lives only as long as the response.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    /// Messages appended by a graph node (`call_llm` or `tools`).
    Update { node: String, messages: Vec<Message> },
    Interrupt {
        interrupts: Vec<Interrupt>,
        state: StateSnapshot,
    },
    Done,
    Error { message: String },
}

impl ExecutionEvent {
    pub fn update(node: impl Into<String>, messages: Vec<Message>) -> Self {
        Self::Update {
            node: node.into(),
            messages,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Done and Error close the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionEvent::Done | ExecutionEvent::Error { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiffPreview {
    pub file_path: String,
    pub suggested_content: String,
    pub original_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolLifecycleKind {
    ToolStarted,
    ToolCompleted,
    ToolFailed,
    ToolInterrupted,
}

/// Inner envelope shared by the `tool-call-events` and `ai-response` channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolLifecycle {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub send_timestamp: i64,
}

impl ToolLifecycle {
    pub fn new(kind: ToolLifecycleKind, payload: serde_json::Value) -> Self {
        let kind = match kind {
            ToolLifecycleKind::ToolStarted => "tool_started",
            ToolLifecycleKind::ToolCompleted => "tool_completed",
            ToolLifecycleKind::ToolFailed => "tool_failed",
            ToolLifecycleKind::ToolInterrupted => "tool_interrupted",
        };
        Self::named(kind, payload)
    }

    pub fn named(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            send_timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Out-of-band notice pushed to every live subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum Notice {
    #[serde(rename = "show-diff-preview")]
    DiffPreview(DiffPreview),
    #[serde(rename = "tool-call-events")]
    ToolCall(ToolLifecycle),
    #[serde(rename = "ai-response")]
    AiResponse(ToolLifecycle),
}

impl Notice {
    /// Every channel a subscriber can filter on.
    pub const CHANNELS: [&'static str; 3] =
        ["show-diff-preview", "tool-call-events", "ai-response"];

    /// Channel name used for subscription filtering.
    pub fn channel(&self) -> &'static str {
        match self {
            Notice::DiffPreview(_) => "show-diff-preview",
            Notice::ToolCall(_) => "tool-call-events",
            Notice::AiResponse(_) => "ai-response",
        }
    }
}

const DEFAULT_CAPACITY: usize = 256;

/// Many-writer/many-reader broadcast for notices. Publishing never blocks;
/// receivers that fall behind observe `Lagged` and skip ahead.
#[derive(Debug, Clone)]
pub struct NoticeHub {
    sender: broadcast::Sender<Notice>,
}

impl NoticeHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the notice.
    pub fn publish(&self, notice: Notice) -> usize {
        let channel = notice.channel();
        match self.sender.send(notice) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!(channel, "No notice subscribers connected");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NoticeHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_preview_uses_channel_envelope() {
        let notice = Notice::DiffPreview(DiffPreview {
            file_path: "ch1.md".into(),
            suggested_content: "new".into(),
            original_content: None,
        });
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["type"], "show-diff-preview");
        assert_eq!(value["payload"]["filePath"], "ch1.md");
        assert_eq!(value["payload"]["suggestedContent"], "new");
    }

    #[test]
    fn lifecycle_notice_carries_timestamp() {
        let notice = Notice::ToolCall(ToolLifecycle::new(
            ToolLifecycleKind::ToolStarted,
            json!({"tool": "search_file"}),
        ));
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["type"], "tool-call-events");
        assert_eq!(value["payload"]["type"], "tool_started");
        assert!(value["payload"]["sendTimestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = NoticeHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let delivered = hub.publish(Notice::AiResponse(ToolLifecycle::named(
            "chunk",
            json!({"text": "hi"}),
        )));

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap().channel(), "ai-response");
        assert_eq!(second.recv().await.unwrap().channel(), "ai-response");
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let hub = NoticeHub::default();
        let delivered = hub.publish(Notice::ToolCall(ToolLifecycle::named("ping", json!({}))));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_without_blocking_publisher() {
        let hub = NoticeHub::new(2);
        let mut slow = hub.subscribe();
        for i in 0..5 {
            hub.publish(Notice::ToolCall(ToolLifecycle::named("ping", json!({"i": i}))));
        }
        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
