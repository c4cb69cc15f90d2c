use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ScribeError;
use crate::hitl::Interrupt;
use crate::messaging::{Message, MessageRole, ToolCall};
use crate::mode::Mode;

/// Durable per-thread payload. Together with `pending` this is the whole
/// continuation needed to resume a suspended run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub pending: Option<Interrupt>,
    /// Interrupt ids already consumed by a resume.
    #[serde(default)]
    pub resolved: Vec<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl ConversationState {
    /// Appends a message, refusing tool results that answer no known call.
    pub fn push(&mut self, message: Message) -> Result<(), ScribeError> {
        if message.role == MessageRole::Tool {
            let call_id = message.tool_call_id().ok_or_else(|| {
                ScribeError::protocol("tool result without an originating call id")
            })?;
            if self.find_call(call_id).is_none() {
                return Err(ScribeError::protocol(format!(
                    "tool result '{call_id}' does not match any prior tool call"
                )));
            }
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn find_call(&self, call_id: &str) -> Option<&ToolCall> {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::Agent)
            .flat_map(|m| m.tool_calls.iter())
            .find(|call| call.id == call_id)
    }

    /// Tool calls of the latest agent message that have no result yet, in
    /// the order the model emitted them.
    pub fn unanswered_calls(&self) -> Vec<ToolCall> {
        let Some(agent_idx) = self
            .messages
            .iter()
            .rposition(|m| m.role == MessageRole::Agent)
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[agent_idx + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id())
            .collect();

        self.messages[agent_idx]
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .cloned()
            .collect()
    }

    /// Checks that `interrupt_id` names the pending interrupt and hands it back.
    pub fn pending_for(&self, interrupt_id: &str) -> Result<&Interrupt, ScribeError> {
        match &self.pending {
            Some(pending) if pending.id == interrupt_id => Ok(pending),
            _ if self.resolved.iter().any(|id| id == interrupt_id) => Err(ScribeError::protocol(
                format!("interrupt '{interrupt_id}' was already resolved"),
            )),
            Some(pending) => Err(ScribeError::protocol(format!(
                "interrupt '{interrupt_id}' does not match pending interrupt '{}'",
                pending.id
            ))),
            None => Err(ScribeError::protocol(format!(
                "no pending interrupt for id '{interrupt_id}'"
            ))),
        }
    }

    /// Marks the pending interrupt consumed.
    pub fn resolve_pending(&mut self) -> Option<Interrupt> {
        let pending = self.pending.take()?;
        self.resolved.push(pending.id.clone());
        Some(pending)
    }

    /// Index at which older history can be folded into the summary while
    /// keeping at least `keep` trailing messages. The cut is moved back so
    /// an agent message is never separated from its tool results.
    pub fn summary_cut(&self, keep: usize) -> usize {
        if self.messages.len() <= keep {
            return 0;
        }
        let mut cut = self.messages.len() - keep;
        while cut > 0 && self.messages[cut].role == MessageRole::Tool {
            cut -= 1;
        }
        cut
    }
}

/// Descriptor of a unit of work the engine will run next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskDescriptor {
    pub id: String,
    pub name: String,
    pub path: Vec<String>,
    pub error: Option<String>,
    pub interrupts: Vec<Interrupt>,
    pub state: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
}

/// Point-in-time view of a thread, shipped with interrupt frames and the
/// thread inspection route.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub summary: String,
    pub next: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub tasks: Vec<TaskDescriptor>,
    pub interrupts: Vec<Interrupt>,
}

impl StateSnapshot {
    pub fn capture(thread_id: &str, state: &ConversationState) -> Self {
        let interrupts: Vec<Interrupt> = state.pending.iter().cloned().collect();
        let tasks = state
            .pending
            .iter()
            .map(|pending| TaskDescriptor {
                id: pending.id.clone(),
                name: "tools".to_string(),
                path: vec!["tools".to_string(), pending.tool_call.name.clone()],
                error: None,
                interrupts: vec![pending.clone()],
                state: None,
                result: None,
            })
            .collect();
        let next = if state.pending.is_some() {
            vec!["tools".to_string()]
        } else {
            Vec::new()
        };

        Self {
            thread_id: thread_id.to_string(),
            messages: state.messages.clone(),
            summary: state.summary.clone(),
            next,
            metadata: serde_json::json!({
                "mode": state.mode.map(|m| m.as_str()),
                "message_count": state.messages.len(),
                "resolved_interrupts": state.resolved.len(),
            }),
            created_at: chrono::Utc::now().to_rfc3339(),
            tasks,
            interrupts,
        }
    }
}
