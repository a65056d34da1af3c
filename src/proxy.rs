//! The outbound side: one HTTP call to the target completions endpoint per
//! inbound request.

use crate::config::TargetConfig;
use crate::error::{ProxyError, Result};
use crate::translate::openai_types::{CompletionChunk, CompletionRequest, CompletionResponse, TargetErrorResponse};
use crate::translate::TargetChunk;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the pooled connection to the target and the timeout applied to it.
#[derive(Debug, Clone)]
pub struct ForwardingClient {
    http: reqwest::Client,
    target: TargetConfig,
}

impl ForwardingClient {
    pub fn new(target: TargetConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(target.timeout())
            .build()
            .map_err(|e| ProxyError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, target })
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    /// Buffered call. The timeout covers the whole exchange, body included.
    pub async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        info!(url = %self.target.url, model = %req.model, "Forwarding completion");

        let response = self
            .http
            .post(&self.target.url)
            .timeout(self.target.timeout())
            .json(req)
            .send()
            .await
            .map_err(|e| ProxyError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::from_transport(&e))?;

        debug!(status = status.as_u16(), body_len = body.len(), "Target responded");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, body = %truncate(&body, 300), "Unparseable completion response");
            ProxyError::protocol(format!(
                "Failed to parse completion response: {}. Body: {}",
                e,
                truncate(&body, 300)
            ))
        })
    }

    /// Streaming call. Returns once the target has sent its response headers,
    /// which must happen within the timeout; every later frame gets the same
    /// allowance.
    pub async fn stream(&self, req: &CompletionRequest) -> Result<CompletionStream> {
        let idle = self.target.timeout();
        info!(url = %self.target.url, model = %req.model, "Forwarding completion (streaming)");

        let send = self
            .http
            .post(&self.target.url)
            .header(ACCEPT, "text/event-stream")
            .json(req)
            .send();

        let response = tokio::time::timeout(idle, send)
            .await
            .map_err(|_| {
                ProxyError::timeout(format!(
                    "no response headers within {}s",
                    idle.as_secs()
                ))
            })?
            .map_err(|e| ProxyError::from_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = tokio::time::timeout(idle, response.text())
                .await
                .ok()
                .and_then(std::result::Result::ok)
                .unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.contains("text/event-stream"));

        if is_sse {
            Ok(CompletionStream::from_sse(response.bytes_stream(), idle))
        } else {
            // Some servers ignore `stream: true` and answer with one JSON object.
            debug!("Target answered a streaming request without SSE");
            let body = tokio::time::timeout(idle, response.text())
                .await
                .map_err(|_| ProxyError::timeout("target body did not arrive in time"))?
                .map_err(|e| ProxyError::from_transport(&e))?;
            let completion: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
                ProxyError::protocol(format!(
                    "Failed to parse completion response: {}. Body: {}",
                    e,
                    truncate(&body, 300)
                ))
            })?;
            Ok(CompletionStream::from_completion(&completion))
        }
    }
}

/// Lazy, finite, non-restartable sequence of target chunks.
///
/// Holds the target connection. Cancelling (explicitly, through a cloned
/// token, or by dropping) stops reading and releases the connection, even
/// while a read is pending.
pub struct CompletionStream {
    inner: Pin<Box<dyn Stream<Item = Result<TargetChunk>> + Send>>,
    cancel: CancellationToken,
}

impl CompletionStream {
    /// Parse an SSE byte stream. Each wait for the next frame is bounded by `idle`.
    pub fn from_sse<S>(bytes: S, idle: Duration) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let inner = sse_chunks(bytes, idle, cancel.clone());
        Self {
            inner: Box::pin(inner),
            cancel,
        }
    }

    /// A one-chunk stream holding a whole buffered completion.
    pub fn from_completion(completion: &CompletionResponse) -> Self {
        let chunks: Vec<Result<TargetChunk>> = match completion.choices.first() {
            Some(choice) => vec![Ok(TargetChunk::finished(
                choice.text.clone(),
                choice.finish_reason.clone().unwrap_or_else(|| "stop".to_string()),
            ))],
            None => vec![Err(ProxyError::protocol("completion response has no choices"))],
        };
        Self {
            inner: Box::pin(stream::iter(chunks)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop reading and release the connection now.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.inner = Box::pin(stream::empty());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for CompletionStream {
    type Item = Result<TargetChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            this.inner = Box::pin(stream::empty());
            return Poll::Ready(None);
        }
        this.inner.as_mut().poll_next(cx)
    }
}

impl Drop for CompletionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Frame {
    Chunk(TargetChunk),
    Done,
    Skip,
}

fn sse_chunks<S>(
    bytes: S,
    idle: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<TargetChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    async_stream::stream! {
        let events = bytes.eventsource();
        futures::pin_mut!(events);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Target stream cancelled");
                    break;
                }
                next = tokio::time::timeout(idle, events.next()) => next,
            };

            let event = match next {
                Err(_) => {
                    warn!(idle_secs = idle.as_secs(), "Target stream went idle");
                    yield Err(ProxyError::timeout(format!(
                        "no data from target for {}s",
                        idle.as_secs()
                    )));
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(EventStreamError::Transport(e)))) => {
                    warn!(error = %e, "Target stream transport error");
                    yield Err(ProxyError::from_transport(&e));
                    break;
                }
                Ok(Some(Err(e))) => {
                    yield Err(ProxyError::protocol(format!("Malformed event stream: {e}")));
                    break;
                }
                Ok(Some(Ok(event))) => event,
            };

            match parse_frame(&event.event, &event.data) {
                Ok(Frame::Chunk(chunk)) => yield Ok(chunk),
                Ok(Frame::Skip) => {}
                Ok(Frame::Done) => break,
                Err(e) => {
                    warn!(error = %e, frame = %truncate(&event.data, 300), "Bad frame from target");
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

fn parse_frame(event: &str, data: &str) -> Result<Frame> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Frame::Done);
    }
    if data.is_empty() {
        return Ok(Frame::Skip);
    }
    if event == "error" {
        return Err(ProxyError::protocol(format!("Target reported error: {data}")));
    }
    if let Ok(err) = serde_json::from_str::<TargetErrorResponse>(data) {
        return Err(ProxyError::protocol(format!(
            "Target reported error: {}",
            err.error.message()
        )));
    }

    let chunk: CompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProxyError::protocol(format!("Failed to parse completion chunk: {e}")))?;

    Ok(match chunk.choices.into_iter().next() {
        Some(choice) => Frame::Chunk(TargetChunk {
            text: choice.text,
            finish_reason: choice.finish_reason,
        }),
        None => Frame::Skip,
    })
}

fn status_error(status: reqwest::StatusCode, body: &str) -> ProxyError {
    let message = serde_json::from_str::<TargetErrorResponse>(body)
        .map(|e| e.error.message().to_string())
        .unwrap_or_else(|_| truncate(body, 500).to_string());
    warn!(status = status.as_u16(), %message, "Target returned error status");
    ProxyError::UpstreamStatus {
        status: status.as_u16(),
        message,
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
