use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use ollama_bridge::config::{BridgeConfig, TargetConfig};
use ollama_bridge::{build_router, AppState};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

// ────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────

fn config_for(url: &str, timeout_secs: u64) -> BridgeConfig {
    let mut config = BridgeConfig {
        target: TargetConfig {
            url: url.to_string(),
            timeout_secs,
        },
        ..BridgeConfig::default()
    };
    config.models.insert(
        "qwen2.5".to_string(),
        "qwen2.5-coder-32b-instruct-mlx".to_string(),
    );
    config
}

fn router_for(url: &str, timeout_secs: u64) -> Router {
    let state = Arc::new(AppState::new(config_for(url, timeout_secs)).unwrap());
    build_router(state)
}

fn completions_url(server: &MockServer) -> String {
    format!("{}/v1/completions", server.uri())
}

fn completion_chunk(text: &str, finish: Option<&str>) -> String {
    serde_json::json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "created": 1_700_000_000,
        "model": "mistral",
        "choices": [{"index": 0, "text": text, "logprobs": null, "finish_reason": finish}]
    })
    .to_string()
}

fn sse_body(frames: &[String]) -> String {
    frames.iter().map(|f| format!("data: {f}\n\n")).collect()
}

fn completion_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "cmpl-test",
        "object": "text_completion",
        "created": 1_700_000_000,
        "model": "mistral",
        "choices": [{"index": 0, "text": text, "logprobs": null, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 4, "completion_tokens": 5, "total_tokens": 9}
    })
}

async fn mount_sse(server: &MockServer, body: String) {
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn ndjson_lines(bytes: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// A URL nobody is listening on.
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1/completions")
}

// ────────────────────────────────────────────────────────────────
// /api/generate, buffered
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_generate_buffered_returns_full_text() {
    let server = MockServer::start().await;
    let text = "  Once upon a time.\nThe end.  ";
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/completions"))
        .and(matchers::body_partial_json(serde_json::json!({
            "model": "mistral",
            "prompt": "Tell me a story.",
            "stream": false,
            "temperature": 0.7,
            "max_tokens": 512
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(text)))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "mistral", "prompt": "Tell me a story."}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["response"], text);
    assert_eq!(json["done"], true);
    assert_eq!(json["model"], "mistral");
    assert_eq!(json["created_at"], "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn test_generate_caller_sampling_values_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(serde_json::json!({
            "temperature": 0.1,
            "max_tokens": 33
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "temperature": 0.1, "max_tokens": 33}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// ────────────────────────────────────────────────────────────────
// Validation never reaches the target
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_requests_never_contact_target() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("x")))
        .expect(0)
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let bodies = [
        serde_json::json!({"prompt": "no model"}),
        serde_json::json!({"model": "no prompt", "stream": true}),
        serde_json::json!({"model": 7, "prompt": "numeric model"}),
    ];

    for body in &bodies {
        let response = router
            .clone()
            .oneshot(post_json("/api/generate", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = body_json(response).await;
        assert_eq!(json["reason"], "validation_error");
        assert!(json["error"].is_string());
    }

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ────────────────────────────────────────────────────────────────
// /api/generate, streaming
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_generate_streaming_story_example() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        sse_body(&[
            completion_chunk("Once ", None),
            completion_chunk("upon ", None),
            completion_chunk("a time.", None),
            "[DONE]".to_string(),
        ]),
    )
    .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "mistral", "prompt": "Tell me a story.", "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/x-ndjson"
    );

    let body = body_bytes(response).await;
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "{\"response\":\"Once \",\"done\":false}\n\
         {\"response\":\"upon \",\"done\":false}\n\
         {\"response\":\"a time.\",\"done\":true}\n"
    );
}

#[tokio::test]
async fn test_generate_streaming_n_chunks_in_order() {
    let server = MockServer::start().await;
    let mut frames: Vec<String> = (0..7).map(|i| completion_chunk(&format!("t{i} "), None)).collect();
    // LM Studio closes with an empty frame carrying only the finish reason
    frames.push(completion_chunk("", Some("stop")));
    frames.push("[DONE]".to_string());
    mount_sse(&server, sse_body(&frames)).await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "stream": true}),
        ))
        .await
        .unwrap();

    let lines = ndjson_lines(&body_bytes(response).await);
    assert_eq!(lines.len(), 7);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["response"], format!("t{i} "));
        assert_eq!(line["done"], i == 6);
    }
}

#[tokio::test]
async fn test_generate_streaming_without_done_marker_still_finishes() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        sse_body(&[completion_chunk("only", None)]),
    )
    .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "stream": true}),
        ))
        .await
        .unwrap();

    let lines = ndjson_lines(&body_bytes(response).await);
    assert_eq!(lines, vec![serde_json::json!({"response": "only", "done": true})]);
}

#[tokio::test]
async fn test_generate_streaming_bad_first_frame_is_502() {
    let server = MockServer::start().await;
    mount_sse(&server, "data: {\"unexpected\": true}\n\n".to_string()).await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["reason"], "upstream_protocol_error");
}

#[tokio::test]
async fn test_generate_streaming_failure_after_commit_ends_with_done() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        sse_body(&[
            completion_chunk("a", None),
            completion_chunk("b", None),
            r#"{"error":{"message":"model unloaded"}}"#.to_string(),
        ]),
    )
    .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "stream": true}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let lines = ndjson_lines(&body_bytes(response).await);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], serde_json::json!({"response": "a", "done": false}));
    assert_eq!(lines[1], serde_json::json!({"response": "b", "done": false}));
    assert_eq!(lines[2]["done"], true);
    assert!(lines[2]["error"]
        .as_str()
        .unwrap()
        .contains("model unloaded"));
}

#[tokio::test]
async fn test_chunked_request_body_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(serde_json::json!({"prompt": "chunked"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    // No Content-Length: the logging middleware buffers and re-attaches the body.
    let parts: Vec<Result<Bytes, Infallible>> = vec![
        Ok(Bytes::from_static(b"{\"model\": \"m\", ")),
        Ok(Bytes::from_static(b"\"prompt\": \"chunked\"}")),
    ];
    let request = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("Content-Type", "application/json")
        .body(Body::from_stream(futures::stream::iter(parts)))
        .unwrap();

    let response = router_for(&completions_url(&server), 10)
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], "ok");
}

// ────────────────────────────────────────────────────────────────
// Target failures
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_target_is_502_within_timeout() {
    let router = router_for(&dead_url().await, 5);

    for stream in [false, true] {
        let response = tokio::time::timeout(
            Duration::from_secs(10),
            router.clone().oneshot(post_json(
                "/api/generate",
                &serde_json::json!({"model": "m", "prompt": "p", "stream": stream}),
            )),
        )
        .await
        .expect("unreachable target must not hang")
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["reason"], "upstream_unreachable");
    }
}

#[tokio::test]
async fn test_slow_target_is_504() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 1);

    for stream in [false, true] {
        let response = router
            .clone()
            .oneshot(post_json(
                "/api/generate",
                &serde_json::json!({"model": "m", "prompt": "p", "stream": stream}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["reason"], "upstream_timeout");
    }
}

#[tokio::test]
async fn test_malformed_target_body_is_502() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["reason"], "upstream_protocol_error");
}

#[tokio::test]
async fn test_target_error_status_is_relayed() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"message": "Model 'ghost' not found", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "ghost", "prompt": "p"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["reason"], "upstream_status");
    assert!(json["error"].as_str().unwrap().contains("Model 'ghost' not found"));
}

// ────────────────────────────────────────────────────────────────
// Client disconnect cancels the target read
// ────────────────────────────────────────────────────────────────

/// A target that emits one chunk every 50ms and counts what it produced.
async fn spawn_counting_target(produced: Arc<AtomicUsize>, total: usize) -> String {
    let app = Router::new().route(
        "/v1/completions",
        axum::routing::post(move || {
            let produced = produced.clone();
            async move {
                let body = async_stream::stream! {
                    for i in 0..total {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        produced.fetch_add(1, Ordering::SeqCst);
                        let frame = format!("data: {}\n\n", completion_chunk(&format!("c{i} "), None));
                        yield Ok::<_, Infallible>(Bytes::from(frame));
                    }
                    yield Ok(Bytes::from_static(b"data: [DONE]\n\n"));
                };
                axum::response::Response::builder()
                    .header("content-type", "text/event-stream")
                    .body(Body::from_stream(body))
                    .unwrap()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/v1/completions")
}

/// A target that sends one finished chunk, then neither closes nor sends [DONE].
async fn spawn_stalling_target() -> String {
    let app = Router::new().route(
        "/v1/completions",
        axum::routing::post(|| async {
            let body = async_stream::stream! {
                let frame = format!("data: {}\n\n", completion_chunk("all", Some("stop")));
                yield Ok::<_, Infallible>(Bytes::from(frame));
                futures::future::pending::<()>().await;
            };
            axum::response::Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(body))
                .unwrap()
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/v1/completions")
}

#[tokio::test]
async fn test_generate_body_ends_after_final_line_on_silent_target() {
    let router = router_for(&spawn_stalling_target().await, 30);
    let response = router
        .oneshot(post_json(
            "/api/generate",
            &serde_json::json!({"model": "m", "prompt": "p", "stream": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tokio::time::timeout(Duration::from_secs(3), body_bytes(response))
        .await
        .expect("body must end once the final line is written");
    assert_eq!(
        ndjson_lines(&body),
        vec![serde_json::json!({"response": "all", "done": true})]
    );
}

#[tokio::test]
async fn test_chat_stream_ends_after_finish_reason_on_silent_target() {
    let router = router_for(&spawn_stalling_target().await, 30);
    let response = router
        .oneshot(post_json(
            "/v1/chat/completions",
            &serde_json::json!({
                "model": "m",
                "stream": true,
                "messages": [{"role": "user", "content": "Hi"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tokio::time::timeout(Duration::from_secs(3), body_bytes(response))
        .await
        .expect("chat stream must end once the finish reason is sent");
    let text = std::str::from_utf8(&body).unwrap();
    let data: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1], "[DONE]");
}

#[tokio::test]
async fn test_client_disconnect_stops_target_fetch() {
    let total = 200;
    let produced = Arc::new(AtomicUsize::new(0));
    let target = spawn_counting_target(produced.clone(), total).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let app = router_for(&target, 10);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let response = reqwest::Client::new()
        .post(format!("http://{proxy_addr}/api/generate"))
        .json(&serde_json::json!({"model": "m", "prompt": "p", "stream": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Read two lines, then hang up.
    let mut body = response.bytes_stream();
    let mut received = Vec::new();
    while received.iter().filter(|b| **b == b'\n').count() < 2 {
        received.extend_from_slice(&body.next().await.unwrap().unwrap());
    }
    drop(body);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let after_disconnect = produced.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let later = produced.load(Ordering::SeqCst);

    assert_eq!(after_disconnect, later, "target kept producing after disconnect");
    assert!(later < total, "target ran to completion ({later} chunks)");
}

// ────────────────────────────────────────────────────────────────
// /v1/chat/completions
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_completion_buffered() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(serde_json::json!({
            "model": "qwen2.5-coder-32b-instruct-mlx",
            "prompt": "SYSTEM: Be brief.\nUSER: Hi",
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("<|im_start|>Assistant### Hello!")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/v1/chat/completions",
            &serde_json::json!({
                "model": "qwen2.5",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"}
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["object"], "chat.completion");
    assert_eq!(json["model"], "qwen2.5-coder-32b-instruct-mlx");
    assert_eq!(json["choices"][0]["message"]["role"], "assistant");
    assert_eq!(json["choices"][0]["message"]["content"], "Hello!");
    assert_eq!(json["usage"]["total_tokens"], 9);
}

#[tokio::test]
async fn test_chat_completion_streaming() {
    let server = MockServer::start().await;
    mount_sse(
        &server,
        sse_body(&[
            completion_chunk("Hel", None),
            completion_chunk("lo", Some("stop")),
            "[DONE]".to_string(),
        ]),
    )
    .await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/v1/chat/completions",
            &serde_json::json!({
                "model": "llama3",
                "stream": true,
                "messages": [{"role": "user", "content": "Hi"}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    let text = std::str::from_utf8(&body).unwrap();
    let data: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data: "))
        .collect();

    assert_eq!(data.len(), 3);
    let first: serde_json::Value = serde_json::from_str(data[0]).unwrap();
    assert_eq!(first["object"], "chat.completion.chunk");
    assert_eq!(first["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(first["choices"][0]["delta"]["content"], "Hel");
    let second: serde_json::Value = serde_json::from_str(data[1]).unwrap();
    assert_eq!(second["choices"][0]["finish_reason"], "stop");
    assert_eq!(data[2], "[DONE]");
}

#[tokio::test]
async fn test_chat_streaming_bad_first_frame_is_502() {
    let server = MockServer::start().await;
    mount_sse(&server, "data: {\"unexpected\": true}\n\n".to_string()).await;

    let router = router_for(&completions_url(&server), 10);
    let response = router
        .oneshot(post_json(
            "/v1/chat/completions",
            &serde_json::json!({
                "model": "m",
                "stream": true,
                "messages": [{"role": "user", "content": "Hi"}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "upstream_protocol_error");
}

#[tokio::test]
async fn test_chat_without_messages_is_400() {
    let router = router_for(&dead_url().await, 10);
    let response = router
        .oneshot(post_json(
            "/v1/chat/completions",
            &serde_json::json!({"model": "m", "messages": []}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "validation_error");
}

// ────────────────────────────────────────────────────────────────
// Misc routes
// ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_and_health() {
    let router = router_for("http://localhost:1234/v1/completions", 10);

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Ollama proxy to http://localhost:1234/v1/completions is running"
    );

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["target"], "http://localhost:1234/v1/completions");
}
