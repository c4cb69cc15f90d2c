//! End-to-end runs through the gateway with the built-in workspace tools.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use scribe_core::events::Notice;
use scribe_core::llm::{LanguageModel, LlmRequest, LlmResponse};
use scribe_core::messaging::{Message, MessageRole, ToolCall, ToolStatus};
use scribe_core::persistence::{InMemorySessionStore, SessionStore};
use scribe_core::{ChoiceAction, ScribeError};
use scribe_runtime::{
    Engine, Frame, Gateway, MessageRequest, ResumeRequest, SettingsSource, ToolCatalog,
};
use scribe_toolkit::Workspace;

struct ScriptedModel {
    replies: Mutex<Vec<Message>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
        })
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
        let message = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))?;
        Ok(LlmResponse { message })
    }
}

fn gateway(
    model: Arc<ScriptedModel>,
    store: Arc<dyn SessionStore>,
    workspace: &tempfile::TempDir,
) -> Gateway {
    let engine = Engine::builder(model, store)
        .with_catalog(ToolCatalog::builtin(Workspace::new(workspace.path())))
        .with_settings(SettingsSource::File(workspace.path().join("settings.json")))
        .build();
    Gateway::new(engine)
}

fn message(text: &str, thread_id: &str) -> MessageRequest {
    serde_json::from_value(json!({"message": text, "thread_id": thread_id, "mode": "writing"}))
        .unwrap()
}

fn resume(interrupt_id: &str, choice: &str, note: &str, thread_id: &str) -> ResumeRequest {
    serde_json::from_value(json!({
        "interrupt_id": interrupt_id,
        "choice_action": choice,
        "additional_data": note,
        "thread_id": thread_id,
    }))
    .unwrap()
}

/// Decodes the SSE records the way a browser client would.
async fn run(stream: scribe_runtime::FrameStream) -> Vec<Value> {
    let records: Vec<String> = stream.map(|frame| frame.to_sse()).collect().await;
    records
        .iter()
        .map(|record| {
            let payload = record.strip_prefix("data: ").unwrap().trim_end();
            Frame::decode(payload).unwrap().value().clone()
        })
        .collect()
}

fn write_call(path: &str, content: &str) -> ToolCall {
    ToolCall::new("write_file", json!({"path": path, "content": content})).with_id("call-write")
}

fn interrupt_id(frames: &[Value]) -> String {
    let frame = frames
        .iter()
        .find(|frame| frame["type"] == "interrupt")
        .expect("interrupt frame");
    frame["interrupts"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn hello_produces_reply_and_done() {
    let workspace = tempfile::tempdir().unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![Message::agent("Hi! What are we writing today?")]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );

    let frames = run(gateway.stream_message(message("Hello", "t1")).await.unwrap()).await;

    assert_eq!(frames.len(), 2);
    let reply = &frames[0]["call_llm"]["messages"][0];
    assert_eq!(reply["type"], "aimessage");
    assert_eq!(reply["content"], "Hi! What are we writing today?");
    assert_eq!(frames[1], json!({"type": "done"}));

    let snapshot = gateway.engine().snapshot("t1").await.unwrap().unwrap();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].role, MessageRole::Human);
    assert_eq!(snapshot.messages[1].role, MessageRole::Agent);
}

#[tokio::test]
async fn gated_write_suspends_then_approval_runs_it_once() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(workspace.path().join("ch1.md"), "old text").unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![
            Message::agent("Saving the draft.").with_tool_calls(vec![write_call("ch1.md", "new text")]),
            Message::agent("Saved."),
        ]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );
    let mut notices = gateway.engine().notices().subscribe();

    let frames = run(gateway.stream_message(message("Save chapter one", "t2")).await.unwrap()).await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["call_llm"]["messages"][0]["tool_calls"][0]["name"], "write_file");
    let interrupt = &frames[1];
    assert_eq!(interrupt["type"], "interrupt");
    assert_eq!(interrupt["interrupts"][0]["type"], "interrupt");
    assert!(interrupt["interrupts"][0]["value"]
        .as_str()
        .unwrap()
        .contains("ch1.md"));
    assert_eq!(interrupt["state"]["type"], "state_snapshot");
    assert_eq!(interrupt["state"]["next"], json!(["tools"]));
    assert_eq!(frames[2], json!({"type": "done"}));

    // Nothing is written before approval, but the preview went out.
    assert_eq!(std::fs::read_to_string(workspace.path().join("ch1.md")).unwrap(), "old text");
    let mut saw_preview = false;
    while let Ok(notice) = notices.try_recv() {
        if let Notice::DiffPreview(preview) = notice {
            assert_eq!(preview.file_path, "ch1.md");
            assert_eq!(preview.suggested_content, "new text");
            assert_eq!(preview.original_content.as_deref(), Some("old text"));
            saw_preview = true;
        }
    }
    assert!(saw_preview);

    let id = interrupt_id(&frames);
    let frames = run(gateway.stream_resume(resume(&id, "1", "ok", "t2")).await.unwrap()).await;

    let tool_message = &frames[0]["tools"]["messages"][0];
    assert_eq!(tool_message["type"], "toolmessage");
    assert_eq!(tool_message["tool_call_id"], "call-write");
    assert_eq!(tool_message["status"], "success");
    assert_eq!(frames[1]["call_llm"]["messages"][0]["content"], "Saved.");
    assert_eq!(frames.last().unwrap(), &json!({"type": "done"}));
    assert_eq!(std::fs::read_to_string(workspace.path().join("ch1.md")).unwrap(), "new text");

    let snapshot = gateway.engine().snapshot("t2").await.unwrap().unwrap();
    assert_eq!(snapshot.messages.len(), 4);
    assert!(snapshot.messages[2].text().contains("ok"));
    assert!(snapshot.interrupts.is_empty());

    // A replayed decision is refused before any stream opens.
    let replay = gateway.stream_resume(resume(&id, "1", "ok", "t2")).await.err().unwrap();
    assert!(matches!(replay, ScribeError::Protocol(_)));
}

#[tokio::test]
async fn rejected_write_never_touches_the_file() {
    let workspace = tempfile::tempdir().unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![
            Message::agent("").with_tool_calls(vec![write_call("ch2.md", "draft")]),
            Message::agent("Okay, I won't save it."),
        ]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );

    let frames = run(gateway.stream_message(message("Draft chapter two", "t3")).await.unwrap()).await;
    let id = interrupt_id(&frames);

    let request: ResumeRequest = serde_json::from_value(json!({
        "interrupt_id": id,
        "choice": "2",
        "choice_data": "wrong tone",
        "thread_id": "t3",
    }))
    .unwrap();
    assert_eq!(request.choice_action, ChoiceAction::Reject);
    let frames = run(gateway.stream_resume(request).await.unwrap()).await;

    assert_eq!(frames[0]["tools"]["messages"][0]["status"], "cancelled");
    assert_eq!(frames.last().unwrap(), &json!({"type": "done"}));
    assert!(!workspace.path().join("ch2.md").exists());

    let messages = gateway.engine().snapshot("t3").await.unwrap().unwrap().messages;
    assert_eq!(messages[2].tool_status(), Some(ToolStatus::Cancelled));
    assert!(messages[2].text().contains("wrong tone"));
}

#[tokio::test]
async fn unknown_interrupt_and_empty_message_are_rejected_up_front() {
    let workspace = tempfile::tempdir().unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );

    let err = gateway.stream_message(message("  ", "t4")).await.err().unwrap();
    assert!(matches!(err, ScribeError::Validation(_)));

    let err = gateway
        .stream_resume(resume("missing", "1", "", "t4"))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ScribeError::Protocol(_)));
    assert!(gateway.engine().list_threads().await.unwrap().is_empty());
}

#[tokio::test]
async fn model_failure_ends_with_single_error_frame() {
    let workspace = tempfile::tempdir().unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );

    let frames = run(gateway.stream_message(message("Hello", "t5")).await.unwrap()).await;
    assert_eq!(frames.len(), 1);
    assert!(frames[0]["error"]
        .as_str()
        .unwrap()
        .contains("no scripted reply left"));
}

#[tokio::test]
async fn suspended_run_survives_a_restart() {
    let workspace = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", workspace.path().join("scribe.db").display());

    let id = {
        let store = scribe_persistence::connect(&url).await.unwrap();
        let gateway = gateway(
            ScriptedModel::new(vec![
                Message::agent("").with_tool_calls(vec![write_call("ch3.md", "after restart")]),
            ]),
            store,
            &workspace,
        );
        let frames = run(gateway.stream_message(message("Write chapter three", "t6")).await.unwrap()).await;
        interrupt_id(&frames)
    };

    // Fresh process: new store handle, new engine, only the database persists.
    let store = scribe_persistence::connect(&url).await.unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![Message::agent("Written.")]),
        store,
        &workspace,
    );
    let frames = run(gateway.stream_resume(resume(&id, "1", "", "t6")).await.unwrap()).await;

    assert_eq!(frames.last().unwrap(), &json!({"type": "done"}));
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("ch3.md")).unwrap(),
        "after restart"
    );
    let snapshot = gateway.engine().snapshot("t6").await.unwrap().unwrap();
    assert_eq!(snapshot.messages.len(), 4);
}

#[tokio::test]
async fn disabled_tools_are_not_offered_and_calls_to_them_fail_softly() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::write(
        workspace.path().join("settings.json"),
        r#"{"modes": {"writing": {"enabled_tools": ["read_file"]}}}"#,
    )
    .unwrap();
    let gateway = gateway(
        ScriptedModel::new(vec![
            Message::agent("").with_tool_calls(vec![write_call("ch4.md", "x")]),
            Message::agent("I can't write in this mode."),
        ]),
        Arc::new(InMemorySessionStore::new()),
        &workspace,
    );

    let frames = run(gateway.stream_message(message("Write", "t7")).await.unwrap()).await;

    assert!(frames.iter().all(|frame| frame["type"] != "interrupt"));
    assert_eq!(frames[1]["tools"]["messages"][0]["status"], "error");
    assert_eq!(frames.last().unwrap(), &json!({"type": "done"}));
    assert!(!workspace.path().join("ch4.md").exists());
}
