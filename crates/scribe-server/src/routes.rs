use std::convert::Infallible;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use scribe_core::serializer::{serialize, ExecObject};
use scribe_runtime::{FrameStream, Gateway, MessageRequest, ResumeRequest};

use crate::error::ApiError;
use crate::notices;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct AppState {
    gateway: Gateway,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: i64,
    notice_subscribers: usize,
    tools: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ThreadList {
    threads: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    thread_id: String,
    folded: usize,
    summary: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat/message", post(post_message))
        .route("/api/chat/interrupt-response", post(post_interrupt_response))
        .route("/api/chat/ws", get(notice_socket))
        .route("/api/chat/threads", get(list_threads))
        .route(
            "/api/chat/threads/:thread_id",
            get(get_thread).delete(delete_thread),
        )
        .route("/api/chat/threads/:thread_id/summarize", post(summarize_thread))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// One SSE `data:` line per frame, base64 of the frame JSON.
fn event_stream(frames: FrameStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = frames.map(|frame| Ok::<_, Infallible>(Event::default().data(frame.encode())));
    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

async fn post_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(thread_id = %request.thread_id, mode = %request.mode, "Chat message received");
    let frames = state.gateway.stream_message(request).await?;
    Ok(event_stream(frames))
}

async fn post_interrupt_response(
    State(state): State<AppState>,
    payload: Result<Json<ResumeRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;
    tracing::info!(
        thread_id = %request.thread_id,
        interrupt_id = %request.interrupt_id,
        choice = request.choice_action.as_wire(),
        "Interrupt response received"
    );
    let frames = state.gateway.stream_resume(request).await?;
    Ok(event_stream(frames))
}

async fn notice_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.gateway.engine().notices().clone();
    ws.on_upgrade(move |socket| notices::serve_socket(socket, hub))
}

async fn list_threads(State(state): State<AppState>) -> Result<Json<ThreadList>, ApiError> {
    let threads = state.gateway.engine().list_threads().await?;
    Ok(Json(ThreadList { threads }))
}

async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state
        .gateway
        .engine()
        .snapshot(&thread_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("thread '{thread_id}' not found")))?;
    Ok(Json(serialize(&ExecObject::Snapshot(&snapshot))))
}

async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.gateway.engine().delete_thread(&thread_id).await?;
    tracing::info!(%thread_id, "Thread deleted");
    Ok(Json(serde_json::json!({ "deleted": thread_id })))
}

async fn summarize_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let outcome = state.gateway.engine().summarize(&thread_id).await?;
    Ok(Json(SummaryResponse {
        thread_id,
        folded: outcome.folded,
        summary: outcome.summary,
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = state.gateway.engine();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        notice_subscribers: engine.notices().subscriber_count(),
        tools: engine.catalog().names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;
    use tower::ServiceExt;

    use scribe_core::llm::{LanguageModel, LlmRequest, LlmResponse};
    use scribe_core::messaging::{Message, ToolCall};
    use scribe_core::persistence::InMemorySessionStore;
    use scribe_runtime::{Engine, SettingsSource, ToolCatalog};
    use scribe_toolkit::Workspace;

    struct ScriptedModel {
        replies: Mutex<Vec<Message>>,
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

    fn app(replies: Vec<Message>, workspace: &tempfile::TempDir) -> Router {
        let model = Arc::new(ScriptedModel {
            replies: Mutex::new(replies.into_iter().rev().collect()),
        });
        let engine = Engine::builder(model, Arc::new(InMemorySessionStore::new()))
            .with_catalog(ToolCatalog::builtin(Workspace::new(workspace.path())))
            .with_settings(SettingsSource::File(workspace.path().join("settings.json")))
            .build();
        router(AppState::new(Gateway::new(engine)))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Decodes every `data:` record of an SSE body.
    async fn sse_frames(response: Response) -> Vec<Value> {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            .map(|data| serde_json::from_slice(&STANDARD.decode(data.trim()).unwrap()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_reports_tools() {
        let workspace = tempfile::tempdir().unwrap();
        let response = app(vec![], &workspace).oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["tools"]
            .as_array()
            .unwrap()
            .contains(&json!("write_file")));
    }

    #[tokio::test]
    async fn hello_streams_reply_then_done() {
        let workspace = tempfile::tempdir().unwrap();
        let app = app(vec![Message::agent("Hi there")], &workspace);

        let response = app
            .clone()
            .oneshot(post_json("/api/chat/message", json!({"message": "Hello", "thread_id": "t1"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let frames = sse_frames(response).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["call_llm"]["messages"][0]["content"], "Hi there");
        assert_eq!(frames[1], json!({"type": "done"}));

        let response = app.oneshot(get("/api/chat/threads/t1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        assert_eq!(snapshot["type"], "state_snapshot");
        assert_eq!(snapshot["values"]["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_and_malformed_messages_are_unprocessable() {
        let workspace = tempfile::tempdir().unwrap();
        let app = app(vec![], &workspace);

        let response = app
            .clone()
            .oneshot(post_json("/api/chat/message", json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_json(response).await["detail"].is_string());

        let response = app
            .clone()
            .oneshot(post_json("/api/chat/message", json!({"message": "hi", "mode": "poetry"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app.oneshot(get("/api/chat/threads")).await.unwrap();
        assert_eq!(body_json(response).await, json!({"threads": []}));
    }

    #[tokio::test]
    async fn unknown_interrupt_is_a_conflict() {
        let workspace = tempfile::tempdir().unwrap();
        let response = app(vec![], &workspace)
            .oneshot(post_json(
                "/api/chat/interrupt-response",
                json!({"interrupt_id": "nope", "choice_action": "1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(body_json(response).await["detail"]
            .as_str()
            .unwrap()
            .contains("protocol"));
    }

    #[tokio::test]
    async fn gated_call_round_trip_over_http() {
        let workspace = tempfile::tempdir().unwrap();
        let call = ToolCall::new("write_file", json!({"path": "ch1.md", "content": "draft"}))
            .with_id("call-1");
        let app = app(
            vec![
                Message::agent("").with_tool_calls(vec![call]),
                Message::agent("Saved."),
            ],
            &workspace,
        );

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat/message",
                json!({"message": "Save it", "thread_id": "t2", "mode": "writing"}),
            ))
            .await
            .unwrap();
        let frames = sse_frames(response).await;
        let interrupt = frames
            .iter()
            .find(|frame| frame["type"] == "interrupt")
            .unwrap();
        let interrupt_id = interrupt["interrupts"][0]["id"].as_str().unwrap().to_string();

        // A new message cannot jump ahead of the pending decision.
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat/message",
                json!({"message": "never mind", "thread_id": "t2"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat/interrupt-response",
                json!({
                    "interrupt_id": interrupt_id,
                    "choice_action": "1",
                    "additional_data": "ok",
                    "thread_id": "t2"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let frames = sse_frames(response).await;
        assert_eq!(frames[0]["tools"]["messages"][0]["status"], "success");
        assert_eq!(frames.last().unwrap(), &json!({"type": "done"}));
        assert_eq!(
            std::fs::read_to_string(workspace.path().join("ch1.md")).unwrap(),
            "draft"
        );
    }

    #[tokio::test]
    async fn threads_can_be_listed_and_deleted() {
        let workspace = tempfile::tempdir().unwrap();
        let app = app(vec![Message::agent("Hi")], &workspace);

        let response = app
            .clone()
            .oneshot(post_json("/api/chat/message", json!({"message": "Hello", "thread_id": "keep"})))
            .await
            .unwrap();
        sse_frames(response).await;

        let response = app.clone().oneshot(get("/api/chat/threads")).await.unwrap();
        assert_eq!(body_json(response).await, json!({"threads": ["keep"]}));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/chat/threads/keep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/api/chat/threads/keep")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summarizing_an_unknown_thread_folds_nothing() {
        let workspace = tempfile::tempdir().unwrap();
        let response = app(vec![], &workspace)
            .oneshot(post_json("/api/chat/threads/ghost/summarize", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["folded"], 0);
        assert_eq!(body["thread_id"], "ghost");
    }
}
