//! HTTP/SSE bridge for an external assistant runtime.
//!
//! The runtime lists actions, invokes them by name with JSON arguments, and
//! reads the projected context before each turn. Action results are always
//! text with status 200; only unknown actions and malformed bodies are errors.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_stream::stream;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::actions::{ActionDescriptor, ActionError};
use crate::context::{self, ReadableSlice};
use crate::error_taxonomy::{ErrorCategory, ErrorEnvelope, ErrorSeverity};
use crate::logging;
use crate::session::Session;
use crate::state::{EditorialSnapshot, Writer};

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    backend: String,
}

#[derive(Debug, Serialize)]
struct ActionsResponse {
    actions: Vec<ActionDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InvokeResponse {
    action: String,
    result: String,
}

#[derive(Debug, Serialize)]
struct ContextResponse {
    slices: Vec<ReadableSlice>,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionsRequest {
    suggestions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
    revision: u64,
}

/// Start the bridge and serve until the listener fails.
pub async fn serve(session: Session, options: BridgeOptions) -> Result<()> {
    if options.port == 0 {
        bail!("Port must be > 0");
    }
    let addr: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .with_context(|| format!("Invalid bind address '{}:{}'", options.host, options.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    session.initialize().await;
    let app = build_router(session);

    println!("Assistant bridge listening on http://{addr}");
    println!("Security: this server is local-first. Do not expose it to untrusted networks.");
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Assistant bridge server error: {e}"))
}

pub fn build_router(session: Session) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/actions", get(list_actions))
        .route("/v1/actions/{name}", post(invoke_action))
        .route("/v1/context", get(get_context))
        .route("/v1/state", get(get_state))
        .route("/v1/suggestions", put(put_suggestions))
        .route("/v1/console/stream", get(stream_console))
        .layer(cors)
        .with_state(session)
}

async fn health(State(session): State<Session>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "vector-wave-console",
        version: env!("CARGO_PKG_VERSION"),
        backend: session.backend_url().to_string(),
    })
}

async fn list_actions(State(session): State<Session>) -> Json<ActionsResponse> {
    Json(ActionsResponse {
        actions: session.registry().descriptors(),
    })
}

async fn invoke_action(
    State(session): State<Session>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<InvokeResponse>, ApiError> {
    if !session.registry().contains(&name) {
        return Err(ApiError::from(ActionError::not_available(format!(
            "unknown action '{name}'"
        ))));
    }
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON arguments: {e}")))?
    };
    // A dropped request must not cancel the action: a pipeline job runs to
    // completion once started.
    let task = {
        let session = session.clone();
        let name = name.clone();
        tokio::spawn(async move { session.invoke(Writer::Assistant, &name, input).await })
    };
    let result = task
        .await
        .map_err(|e| ApiError::internal(format!("Action '{name}' task failed: {e}")))?;
    Ok(Json(InvokeResponse {
        action: name,
        result,
    }))
}

async fn get_context(State(session): State<Session>) -> Json<ContextResponse> {
    let slices = session.readable_context();
    let prompt = context::render_for_prompt(&slices);
    Json(ContextResponse { slices, prompt })
}

async fn get_state(State(session): State<Session>) -> Json<EditorialSnapshot> {
    Json(session.state().snapshot())
}

async fn put_suggestions(
    State(session): State<Session>,
    Json(req): Json<SuggestionsRequest>,
) -> Json<SuggestionsResponse> {
    session
        .state()
        .set_suggestions(Writer::User, req.suggestions);
    let snapshot = session.state().snapshot();
    Json(SuggestionsResponse {
        suggestions: snapshot.suggestions,
        revision: snapshot.revision,
    })
}

/// Console lines appended after the client connects, plus phase changes.
async fn stream_console(
    State(session): State<Session>,
) -> Sse<impl futures_util::Stream<Item = Result<SseEvent, Infallible>>> {
    let state = session.state().clone();
    let mut changes = state.subscribe();
    let mut cursor = state.console_cursor();
    let mut phase = state.pipeline_status().phase;

    let stream = stream! {
        loop {
            if changes.changed().await.is_err() {
                break;
            }
            for line in state.read_console(&mut cursor) {
                yield Ok(sse_json("line", json!({ "text": line })));
            }
            let current = state.pipeline_status();
            if current.phase != phase {
                phase = current.phase;
                yield Ok(sse_json("status", json!(current)));
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

fn sse_json(event: &str, payload: Value) -> SseEvent {
    let data = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(event).data(data)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            envelope: ErrorEnvelope::new(
                ErrorCategory::InvalidInput,
                ErrorSeverity::Error,
                false,
                "bad_request",
                message,
            ),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope::new(
                ErrorCategory::Internal,
                ErrorSeverity::Error,
                false,
                "internal_error",
                message,
            ),
        }
    }
}

impl From<ActionError> for ApiError {
    fn from(value: ActionError) -> Self {
        let envelope = ErrorEnvelope::from(value);
        let status = StatusCode::from_u16(envelope.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self { status, envelope }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        logging::warn(format!(
            "Bridge request failed ({}): {}",
            self.envelope.code, self.envelope.message
        ));
        (self.status, Json(json!({ "error": self.envelope }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;

    use async_trait::async_trait;

    use crate::client::{BackendClient, BackendError, EditorialBackend, PipelineByteStream};
    use crate::config::{Endpoints, RetryPolicy};
    use crate::models::{AnalysisResult, FolderListing, MetadataReceipt, StyleGuides};
    use crate::state::PipelinePhase;

    const SLOW_EVENTS: usize = 10;

    /// Backend whose pipeline emits one log event every 100 ms.
    struct SlowPipelineBackend;

    #[async_trait]
    impl EditorialBackend for SlowPipelineBackend {
        fn base_url(&self) -> &str {
            "http://slow"
        }

        async fn list_style_guides(&self) -> Result<StyleGuides, BackendError> {
            Ok(StyleGuides::default())
        }

        async fn list_content_folders(&self) -> Result<FolderListing, BackendError> {
            Ok(FolderListing::default())
        }

        async fn analyze_folder(&self, _folder_path: &str) -> Result<AnalysisResult, BackendError> {
            Err(BackendError::Rejected {
                endpoint: "/api/analyze-folder".into(),
                message: "unused".into(),
            })
        }

        async fn save_metadata(
            &self,
            _folder_path: &str,
            _content: &str,
        ) -> Result<MetadataReceipt, BackendError> {
            Ok(MetadataReceipt::default())
        }

        async fn start_pipeline(
            &self,
            _content_path: &str,
        ) -> Result<PipelineByteStream, BackendError> {
            let stream = stream! {
                for step in 0..SLOW_EVENTS {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    let line = format!("data: {{\"type\":\"log\",\"message\":\"Step {step}\"}}\n\n");
                    yield Ok::<Bytes, BackendError>(Bytes::from(line));
                }
            };
            Ok(Box::pin(stream))
        }
    }

    async fn spawn_test_server() -> Result<Option<(SocketAddr, Session)>> {
        let client = BackendClient::with_parts(
            "http://127.0.0.1:9",
            Endpoints::default(),
            RetryPolicy::disabled(),
        )?;
        spawn_server(Session::new(Arc::new(client), "content/raw")).await
    }

    async fn spawn_server(session: Session) -> Result<Option<(SocketAddr, Session)>> {
        let app = build_router(session.clone());
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Some((addr, session)))
    }

    async fn read_first_sse_frame(resp: reqwest::Response) -> Result<String> {
        let mut stream = resp.bytes_stream();
        let mut buf = Vec::new();
        loop {
            let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
                .await
                .context("timed out waiting for SSE frame")?
                .context("SSE stream ended unexpectedly")??;
            buf.extend_from_slice(&next);

            let text = String::from_utf8_lossy(&buf);
            if let Some(idx) = text.find("\n\n") {
                return Ok(text[..idx].to_string());
            }
        }
    }

    #[tokio::test]
    async fn health_and_action_listing() -> Result<()> {
        let Some((addr, _session)) = spawn_test_server().await? else {
            return Ok(());
        };
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("http://{addr}/health"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["backend"], "http://127.0.0.1:9");

        let actions: Value = client
            .get(format!("http://{addr}/v1/actions"))
            .send()
            .await?
            .json()
            .await?;
        let names: Vec<&str> = actions["actions"]
            .as_array()
            .context("actions array")?
            .iter()
            .filter_map(|action| action["name"].as_str())
            .collect();
        assert_eq!(names.len(), 5);
        assert!(names.contains(&"runEditorialPipeline"));
        Ok(())
    }

    #[tokio::test]
    async fn invoke_returns_text_and_updates_state() -> Result<()> {
        let Some((addr, session)) = spawn_test_server().await? else {
            return Ok(());
        };
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{addr}/v1/actions/setSuggestedActions"))
            .json(&json!({"actions": {"suggestions": ["one", "two"]}}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: InvokeResponse = response.json().await?;
        assert_eq!(body.result, "✅ Set 2 suggested actions.");
        assert_eq!(
            session.state().suggestions(),
            vec!["one".to_string(), "two".to_string()]
        );

        // A failing action is still a 200 with prose.
        let response = client
            .post(format!("http://{addr}/v1/actions/analyzeFolder"))
            .json(&json!({}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body: InvokeResponse = response.json().await?;
        assert!(body.result.contains("missing required parameter 'folderPath'"));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_action_and_bad_json_are_errors() -> Result<()> {
        let Some((addr, _session)) = spawn_test_server().await? else {
            return Ok(());
        };
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{addr}/v1/actions/nope"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().await?;
        assert_eq!(body["error"]["code"], "action_not_available");

        let response = client
            .post(format!("http://{addr}/v1/actions/analyzeFolder"))
            .body("{not json")
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn user_suggestions_and_context() -> Result<()> {
        let Some((addr, session)) = spawn_test_server().await? else {
            return Ok(());
        };
        let client = reqwest::Client::new();

        let body: Value = client
            .put(format!("http://{addr}/v1/suggestions"))
            .json(&json!({"suggestions": ["mine"]}))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(body["suggestions"], json!(["mine"]));
        assert_eq!(session.state().snapshot().suggestions_writer, Writer::User);

        let context: Value = client
            .get(format!("http://{addr}/v1/context"))
            .send()
            .await?
            .json()
            .await?;
        let slices = context["slices"].as_array().context("slices")?;
        assert_eq!(slices.len(), 7);
        assert!(
            slices
                .iter()
                .any(|slice| slice["name"] == "suggested_actions" && slice["value"] == "mine")
        );

        let state: Value = client
            .get(format!("http://{addr}/v1/state"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(state["suggestions_writer"], "user");
        Ok(())
    }

    #[tokio::test]
    async fn console_stream_forwards_new_lines() -> Result<()> {
        let Some((addr, session)) = spawn_test_server().await? else {
            return Ok(());
        };
        session.state().append_console(vec!["before connect".into()]);
        let response = reqwest::Client::new()
            .get(format!("http://{addr}/v1/console/stream"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        session.state().append_console(vec!["[10:00:00] Start".into()]);
        let frame = read_first_sse_frame(response).await?;

        assert!(frame.contains("event: line"), "{frame}");
        assert!(frame.contains("[10:00:00] Start"), "{frame}");
        assert!(!frame.contains("before connect"));
        Ok(())
    }

    #[tokio::test]
    async fn pipeline_outlives_a_disconnected_caller() -> Result<()> {
        let session = Session::new(Arc::new(SlowPipelineBackend), "content/raw");
        let Some((addr, session)) = spawn_server(session).await? else {
            return Ok(());
        };
        let impatient = reqwest::Client::builder()
            .timeout(Duration::from_millis(250))
            .build()?;

        let first = impatient
            .post(format!("http://{addr}/v1/actions/runEditorialPipeline"))
            .json(&json!({"contentPath": "content/raw/a"}))
            .send()
            .await;
        assert!(first.is_err(), "caller should time out before the job ends");

        // The job is still active, so a second start is refused.
        let second: InvokeResponse = reqwest::Client::new()
            .post(format!("http://{addr}/v1/actions/runEditorialPipeline"))
            .json(&json!({"contentPath": "content/raw/b"}))
            .send()
            .await?
            .json()
            .await?;
        assert!(second.result.contains("already running for content/raw/a"), "{}", second.result);

        let state = session.state().clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            while state.pipeline_status().phase != PipelinePhase::Idle {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .context("pipeline did not finish")?;

        assert_eq!(state.console_len(), SLOW_EVENTS);
        assert_eq!(
            state.pipeline_status().content_path.as_deref(),
            Some("content/raw/a")
        );
        Ok(())
    }
}
