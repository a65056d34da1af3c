use crate::config::BridgeConfig;
use crate::error::ProxyError;
use crate::proxy::{truncate, CompletionStream, ForwardingClient};
use crate::translate::ollama_types::{GenerateChunk, GenerateError, GenerateRequest};
use crate::translate::openai_types::{
    ChatCompletionRequest, ChatErrorDetail, ChatErrorResponse, CompletionRequest,
};
use crate::translate::request::{chat_to_completion, generate_to_completion};
use crate::translate::response::{completion_to_chat, completion_to_generate};
use crate::translate::streaming::{relay_generate, ChatStreamTranslator};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Upper bound on a buffered request body.
const MAX_REQUEST_BODY: usize = 16 * 1024 * 1024;
const LOGGED_PAYLOAD_CHARS: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub config: BridgeConfig,
    pub client: ForwardingClient,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> crate::Result<Self> {
        let client = ForwardingClient::new(config.target.clone())?;
        Ok(Self { config, client })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        tracing::info_span!(
            "request",
            id = %uuid::Uuid::new_v4(),
            method = %req.method(),
            uri = %req.uri(),
        )
    });

    Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/health", get(handle_health))
        .route("/", get(handle_root))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .layer(trace)
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let (parts, body) = req.into_parts();
    let payload = match axum::body::to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(b) => b,
        Err(e) => {
            warn!(%method, %uri, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    info!(%method, %uri, payload_len = payload.len(), "Incoming request");
    if !payload.is_empty() {
        let text = String::from_utf8_lossy(&payload);
        debug!(payload = %truncate(&text, LOGGED_PAYLOAD_CHARS), "Request payload");
    }

    let response = next.run(Request::from_parts(parts, Body::from(payload))).await;
    info!(%method, %uri, status = response.status().as_u16(), "Response");

    response
}

// ---------------------------------------------------------------------------
// POST /api/generate
// ---------------------------------------------------------------------------

async fn handle_generate(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return generate_error(&ProxyError::validation(format!("malformed body: {e}")));
        }
    };

    let completion_req = match generate_to_completion(&req, &state.config.defaults) {
        Ok(r) => r,
        Err(e) => return generate_error(&e),
    };

    info!(
        model = %completion_req.model,
        stream = completion_req.stream,
        prompt_len = completion_req.prompt.len(),
        "Generate request"
    );

    if completion_req.stream {
        generate_streaming(&state, &completion_req).await
    } else {
        generate_buffered(&state, &completion_req).await
    }
}

async fn generate_buffered(state: &AppState, req: &CompletionRequest) -> Response {
    let result = state
        .client
        .complete(req)
        .await
        .and_then(|resp| completion_to_generate(&resp, &req.model));

    match result {
        Ok(chunk) => {
            info!(response_len = chunk.response.len(), "Generate completed");
            Json(chunk).into_response()
        }
        Err(e) => generate_error(&e),
    }
}

async fn generate_streaming(state: &AppState, req: &CompletionRequest) -> Response {
    let upstream = match state.client.stream(req).await {
        Ok(s) => s,
        Err(e) => return generate_error(&e),
    };

    let guard = upstream.cancellation_token().drop_guard();
    let mut lines = Box::pin(relay_generate(upstream));

    // Nothing is committed until the first line exists, so an early target
    // failure still gets a proper status code.
    let first = match lines.next().await {
        Some(Ok(line)) => line,
        Some(Err(e)) => return generate_error(&e),
        None => GenerateChunk::delta("", true),
    };

    let body = async_stream::stream! {
        // Dropped with the body when the caller goes away.
        let _guard = guard;

        yield Ok::<_, Infallible>(ndjson_line(&first));

        while let Some(item) = lines.next().await {
            match item {
                Ok(line) => yield Ok(ndjson_line(&line)),
                Err(e) => {
                    warn!(error = %e, reason = e.reason(), "Generate stream failed after commit");
                    yield Ok(ndjson_line(&GenerateChunk::failed(e.to_string())));
                    break;
                }
            }
        }
        debug!("Generate response body finished");
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn ndjson_line(chunk: &GenerateChunk) -> Bytes {
    match chunk.to_ndjson() {
        Ok(line) => Bytes::from(line),
        Err(e) => {
            warn!(error = %e, "Failed to encode generate chunk");
            Bytes::from_static(b"{\"response\":\"\",\"done\":true}\n")
        }
    }
}

fn generate_error(err: &ProxyError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        warn!(reason = err.reason(), status = status.as_u16(), error = %err, "Generate failed");
    } else {
        info!(reason = err.reason(), status = status.as_u16(), error = %err, "Generate rejected");
    }
    let body = GenerateError {
        error: err.to_string(),
        reason: err.reason().to_string(),
    };
    (status, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/chat/completions
// ---------------------------------------------------------------------------

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return chat_error(&ProxyError::validation(format!("malformed body: {e}"))),
    };

    let completion_req =
        match chat_to_completion(&req, &state.config.models, &state.config.defaults) {
            Ok(r) => r,
            Err(e) => return chat_error(&e),
        };

    info!(
        model = %completion_req.model,
        stream = completion_req.stream,
        messages = req.messages.len(),
        "Chat request"
    );

    if completion_req.stream {
        match state.client.stream(&completion_req).await {
            Ok(upstream) => chat_sse(upstream, &completion_req.model).await,
            Err(e) => chat_error(&e),
        }
    } else {
        match state.client.complete(&completion_req).await {
            Ok(resp) => Json(completion_to_chat(&resp, &completion_req.model)).into_response(),
            Err(e) => chat_error(&e),
        }
    }
}

async fn chat_sse(mut upstream: CompletionStream, model: &str) -> Response {
    let guard = upstream.cancellation_token().drop_guard();
    let mut translator = ChatStreamTranslator::new(model);

    // Same commit rule as /api/generate: a bad first frame is still a status.
    let first = match upstream.next().await {
        Some(Ok(chunk)) => Some(chunk),
        Some(Err(e)) => return chat_error(&e),
        None => None,
    };

    let events = async_stream::stream! {
        let _guard = guard;

        if let Some(chunk) = first {
            for c in translator.process_chunk(&chunk) {
                yield Ok::<_, Infallible>(json_event(&c));
            }
        }

        while !translator.is_finished() {
            match upstream.next().await {
                Some(Ok(chunk)) => {
                    for c in translator.process_chunk(&chunk) {
                        yield Ok(json_event(&c));
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, reason = e.reason(), "Chat stream failed after commit");
                    yield Ok(json_event(&chat_error_body(&e)));
                    return;
                }
                None => break,
            }
        }
        // Upstream is not read past the finish reason.
        drop(upstream);

        for c in translator.finish() {
            yield Ok(json_event(&c));
        }
        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn json_event<T: serde::Serialize>(value: &T) -> Event {
    Event::default().data(serde_json::to_string(value).unwrap_or_default())
}

fn chat_error_body(err: &ProxyError) -> ChatErrorResponse {
    ChatErrorResponse {
        error: ChatErrorDetail {
            message: err.to_string(),
            error_type: err.reason().to_string(),
        },
    }
}

fn chat_error(err: &ProxyError) -> Response {
    let status = err.status_code();
    warn!(reason = err.reason(), status = status.as_u16(), error = %err, "Chat request failed");
    (status, Json(chat_error_body(err))).into_response()
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

async fn handle_root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let target = &state.client.target().url;
    Json(serde_json::json!({
        "message": format!("Ollama proxy to {target} is running"),
        "target": target,
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "target": state.client.target().url,
    }))
}
