use serde::{Deserialize, Serialize};

use crate::messaging::ToolCall;

/// The human's verdict on a gated tool call. Encoded on the wire as `"1"` / `"2"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChoiceAction {
    #[serde(rename = "1")]
    Approve,
    #[serde(rename = "2")]
    Reject,
}

impl ChoiceAction {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ChoiceAction::Approve => "1",
            ChoiceAction::Reject => "2",
        }
    }
}

/// Payload fed back into a suspended tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    pub choice_action: ChoiceAction,
    #[serde(default)]
    pub choice_data: String,
}

impl Decision {
    pub fn approve(choice_data: impl Into<String>) -> Self {
        Self {
            choice_action: ChoiceAction::Approve,
            choice_data: choice_data.into(),
        }
    }

    pub fn reject(choice_data: impl Into<String>) -> Self {
        Self {
            choice_action: ChoiceAction::Reject,
            choice_data: choice_data.into(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.choice_action == ChoiceAction::Approve
    }
}

/// Durable record of a gated tool call waiting on a human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interrupt {
    pub id: String,
    pub tool_call: ToolCall,
    /// Human-readable prompt shown to the reviewer.
    pub prompt: String,
    pub created_at: String,
}

impl Interrupt {
    pub fn for_call(tool_call: ToolCall, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool_call,
            prompt: prompt.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
