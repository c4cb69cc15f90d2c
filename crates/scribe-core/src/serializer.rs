//! Conversion of execution objects into a stable, JSON-safe tree.
//!
//! [`serialize`] is total: every known shape maps to an object tagged with a
//! `type` discriminator, and anything else goes through the [`Inspect`]
//! fallback chain. A failure anywhere in that chain degrades to
//! `{"type": "serialization_error", "error": ...}` instead of propagating.

use serde_json::{json, Map, Value};

use crate::hitl::Interrupt;
use crate::messaging::{Message, MessageContent, MessageRole, ToolCall, ToolStatus};
use crate::state::{StateSnapshot, TaskDescriptor};

/// Introspection hooks for runtime objects without a dedicated arm.
///
/// The serializer tries [`dump`](Inspect::dump) first, then
/// [`attributes`](Inspect::attributes), then [`describe`](Inspect::describe).
pub trait Inspect {
    fn type_name(&self) -> &str;

    /// Structured dump, if the object has one.
    fn dump(&self) -> Option<anyhow::Result<Value>> {
        None
    }

    /// Field map, serialized recursively.
    fn attributes(&self) -> Option<anyhow::Result<Vec<(String, Value)>>> {
        None
    }

    fn describe(&self) -> anyhow::Result<String> {
        Ok(format!("<{}>", self.type_name()))
    }
}

/// Closed set of shapes the engine emits, plus an escape hatch.
pub enum ExecObject<'a> {
    Message(&'a Message),
    ToolCall(&'a ToolCall),
    Interrupt(&'a Interrupt),
    Task(&'a TaskDescriptor),
    Snapshot(&'a StateSnapshot),
    Map(Vec<(String, ExecObject<'a>)>),
    Seq(Vec<ExecObject<'a>>),
    Value(Value),
    Opaque(&'a dyn Inspect),
}

impl<'a> ExecObject<'a> {
    pub fn messages(messages: &'a [Message]) -> Self {
        ExecObject::Seq(messages.iter().map(ExecObject::Message).collect())
    }

    pub fn interrupts(interrupts: &'a [Interrupt]) -> Self {
        ExecObject::Seq(interrupts.iter().map(ExecObject::Interrupt).collect())
    }
}

pub fn serialize(object: &ExecObject<'_>) -> Value {
    match object {
        ExecObject::Message(message) => serialize_message(message),
        ExecObject::ToolCall(call) => serialize_tool_call(call),
        ExecObject::Interrupt(interrupt) => serialize_interrupt(interrupt),
        ExecObject::Task(task) => serialize_task(task),
        ExecObject::Snapshot(snapshot) => serialize_snapshot(snapshot),
        ExecObject::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), serialize(value)))
                .collect(),
        ),
        ExecObject::Seq(items) => Value::Array(items.iter().map(serialize).collect()),
        ExecObject::Value(value) => value.clone(),
        ExecObject::Opaque(inner) => serialize_opaque(*inner),
    }
}

fn message_type(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "systemmessage",
        MessageRole::Human => "humanmessage",
        MessageRole::Agent => "aimessage",
        MessageRole::Tool => "toolmessage",
    }
}

fn serialize_message(message: &Message) -> Value {
    let content = match &message.content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Json(value) => value.clone(),
    };

    let mut out = Map::new();
    out.insert("type".into(), json!(message_type(message.role)));
    out.insert("id".into(), json!(message.id));
    out.insert("content".into(), content);
    out.insert("additional_kwargs".into(), json!({}));
    out.insert("response_metadata".into(), json!({}));

    match message.role {
        MessageRole::Agent => {
            out.insert(
                "tool_calls".into(),
                Value::Array(message.tool_calls.iter().map(serialize_tool_call).collect()),
            );
            out.insert("usage_metadata".into(), Value::Null);
            out.insert("refusal".into(), Value::Null);
        }
        MessageRole::Tool => {
            let status = match message.tool_status().unwrap_or(ToolStatus::Success) {
                ToolStatus::Success => "success",
                ToolStatus::Error => "error",
                ToolStatus::Cancelled => "cancelled",
            };
            out.insert("tool_call_id".into(), json!(message.tool_call_id().unwrap_or("")));
            out.insert("name".into(), json!(message.tool_name().unwrap_or("")));
            out.insert("status".into(), json!(status));
        }
        MessageRole::System | MessageRole::Human => {}
    }

    Value::Object(out)
}

fn serialize_tool_call(call: &ToolCall) -> Value {
    json!({
        "type": "tool_call",
        "id": call.id,
        "name": call.name,
        "args": call.args,
    })
}

fn serialize_interrupt(interrupt: &Interrupt) -> Value {
    json!({
        "type": "interrupt",
        "id": interrupt.id,
        "value": interrupt.prompt,
        "tool_call": serialize_tool_call(&interrupt.tool_call),
        "created_at": interrupt.created_at,
    })
}

fn serialize_task(task: &TaskDescriptor) -> Value {
    json!({
        "type": "task",
        "id": task.id,
        "name": task.name,
        "path": task.path,
        "error": task.error,
        "interrupts": task.interrupts.iter().map(serialize_interrupt).collect::<Vec<_>>(),
        "state": task.state,
        "result": task.result,
    })
}

fn serialize_snapshot(snapshot: &StateSnapshot) -> Value {
    json!({
        "type": "state_snapshot",
        "values": {
            "messages": serialize(&ExecObject::messages(&snapshot.messages)),
            "summary": snapshot.summary,
        },
        "next": snapshot.next,
        "config": { "configurable": { "thread_id": snapshot.thread_id }, "thread_id": snapshot.thread_id },
        "metadata": snapshot.metadata,
        "created_at": snapshot.created_at,
        "parent_config": Value::Null,
        "tasks": snapshot.tasks.iter().map(serialize_task).collect::<Vec<_>>(),
        "interrupts": serialize(&ExecObject::interrupts(&snapshot.interrupts)),
    })
}

fn serialize_opaque(inner: &dyn Inspect) -> Value {
    if let Some(dumped) = inner.dump() {
        match dumped {
            Ok(value) => return value,
            Err(err) => tracing::warn!(
                object = inner.type_name(),
                error = %err,
                "Structured dump failed, trying attributes"
            ),
        }
    }

    if let Some(attributes) = inner.attributes() {
        match attributes {
            Ok(fields) => return Value::Object(fields.into_iter().collect()),
            Err(err) => tracing::warn!(
                object = inner.type_name(),
                error = %err,
                "Attribute serialization failed, falling back to string form"
            ),
        }
    }

    match inner.describe() {
        Ok(text) => Value::String(text),
        Err(err) => {
            tracing::error!(object = inner.type_name(), error = %err, "Serialization failed");
            json!({ "type": "serialization_error", "error": err.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConversationState;

    fn gated_state() -> (ConversationState, ToolCall) {
        let call = ToolCall::new("write_file", json!({"path": "a.md"})).with_id("call-1");
        let mut state = ConversationState::default();
        state.push(Message::human("write it")).unwrap();
        state
            .push(Message::agent("on it").with_tool_calls(vec![call.clone()]))
            .unwrap();
        state.pending = Some(Interrupt::for_call(call.clone(), "Write a.md?"));
        (state, call)
    }

    #[test]
    fn messages_carry_type_tags_and_fields() {
        let (state, call) = gated_state();
        let human = serialize(&ExecObject::Message(&state.messages[0]));
        assert_eq!(human["type"], "humanmessage");
        assert_eq!(human["content"], "write it");
        assert_eq!(human["additional_kwargs"], json!({}));

        let agent = serialize(&ExecObject::Message(&state.messages[1]));
        assert_eq!(agent["type"], "aimessage");
        assert_eq!(agent["tool_calls"][0]["type"], "tool_call");
        assert_eq!(agent["tool_calls"][0]["name"], "write_file");
        assert!(agent.get("usage_metadata").is_some());

        let result = Message::tool_result(
            &call,
            MessageContent::Text("cancelled".into()),
            ToolStatus::Cancelled,
        );
        let tool = serialize(&ExecObject::Message(&result));
        assert_eq!(tool["type"], "toolmessage");
        assert_eq!(tool["tool_call_id"], "call-1");
        assert_eq!(tool["status"], "cancelled");
    }

    #[test]
    fn snapshot_has_values_tasks_and_interrupts() {
        let (state, _) = gated_state();
        let snapshot = StateSnapshot::capture("t1", &state);
        let value = serialize(&ExecObject::Snapshot(&snapshot));

        assert_eq!(value["type"], "state_snapshot");
        assert_eq!(value["values"]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value["config"]["thread_id"], "t1");
        assert_eq!(value["tasks"][0]["type"], "task");
        assert_eq!(value["interrupts"][0]["type"], "interrupt");
        assert_eq!(value["interrupts"][0]["value"], "Write a.md?");
    }

    #[test]
    fn nested_maps_and_sequences_recurse() {
        let (state, _) = gated_state();
        let value = serialize(&ExecObject::Map(vec![(
            "call_llm".into(),
            ExecObject::Map(vec![(
                "messages".into(),
                ExecObject::messages(&state.messages[1..]),
            )]),
        )]));
        assert_eq!(value["call_llm"]["messages"][0]["type"], "aimessage");
    }

    struct Dumpable;
    impl Inspect for Dumpable {
        fn type_name(&self) -> &str {
            "Dumpable"
        }
        fn dump(&self) -> Option<anyhow::Result<Value>> {
            Some(Ok(json!({"dumped": true})))
        }
    }

    struct BrokenDump;
    impl Inspect for BrokenDump {
        fn type_name(&self) -> &str {
            "BrokenDump"
        }
        fn dump(&self) -> Option<anyhow::Result<Value>> {
            Some(Err(anyhow::anyhow!("boom")))
        }
        fn attributes(&self) -> Option<anyhow::Result<Vec<(String, Value)>>> {
            Some(Ok(vec![("field".into(), json!(7))]))
        }
    }

    struct Plain;
    impl Inspect for Plain {
        fn type_name(&self) -> &str {
            "Plain"
        }
    }

    struct Hopeless;
    impl Inspect for Hopeless {
        fn type_name(&self) -> &str {
            "Hopeless"
        }
        fn describe(&self) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("cannot render"))
        }
    }

    #[test]
    fn opaque_objects_walk_the_fallback_chain() {
        assert_eq!(
            serialize(&ExecObject::Opaque(&Dumpable)),
            json!({"dumped": true})
        );
        assert_eq!(
            serialize(&ExecObject::Opaque(&BrokenDump)),
            json!({"field": 7})
        );
        assert_eq!(serialize(&ExecObject::Opaque(&Plain)), json!("<Plain>"));

        let failed = serialize(&ExecObject::Opaque(&Hopeless));
        assert_eq!(failed["type"], "serialization_error");
        assert_eq!(failed["error"], "cannot render");
    }
}
