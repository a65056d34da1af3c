//! Streaming translation of target completion chunks.
//!
//! [`GenerateRelay`] is the state machine behind `/api/generate` streaming: a
//! 1:1, order-preserving transducer from [`TargetChunk`]s to NDJSON
//! [`GenerateChunk`]s that holds exactly one chunk back so the last line it
//! writes is the only one carrying `done: true`. [`relay_generate`] drives it
//! over a live stream. [`ChatStreamTranslator`] does the same job for the
//! OpenAI chat endpoint.

use futures::{Stream, StreamExt};

use crate::error::Result;

use super::ollama_types::GenerateChunk;
use super::openai_types::{ChatChunkChoice, ChatCompletionChunk, ChatDelta};
use super::TargetChunk;

/// Order-preserving relay from target chunks to generate chunks.
///
/// Usage:
///   let mut relay = GenerateRelay::new();
///   for chunk in target_chunks {
///       for line in relay.push(&chunk) { /* write line */ }
///   }
///   for line in relay.finish() { /* write final line */ }
///
/// A pushed chunk is only released once the next one arrives (as
/// `done: false`) or the input ends (as `done: true`). Marker-only frames
/// (empty text plus a finish reason) release the held chunk as final instead
/// of producing a line of their own.
#[derive(Debug, Default)]
pub struct GenerateRelay {
    held: Option<String>,
    finished: bool,
    emitted: usize,
}

impl GenerateRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of lines released so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Feed one target chunk, returning the lines that are now ready.
    pub fn push(&mut self, chunk: &TargetChunk) -> Vec<GenerateChunk> {
        if self.finished {
            return Vec::new();
        }

        if chunk.is_marker_only() {
            return self.finish();
        }

        let mut out = Vec::new();
        if let Some(prev) = self.held.take() {
            out.push(self.release(prev, false));
        }

        if chunk.finish_reason.is_some() {
            self.finished = true;
            out.push(self.release(chunk.text.clone(), true));
        } else {
            self.held = Some(chunk.text.clone());
        }

        out
    }

    /// Input ended cleanly. Always yields exactly one `done: true` line unless
    /// one was already emitted.
    pub fn finish(&mut self) -> Vec<GenerateChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let text = self.held.take().unwrap_or_default();
        vec![self.release(text, true)]
    }

    /// Input failed. Flushes the held chunk as non-final; the caller follows
    /// it with a terminal error line.
    pub fn fail(&mut self) -> Vec<GenerateChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        match self.held.take() {
            Some(text) => vec![self.release(text, false)],
            None => Vec::new(),
        }
    }

    fn release(&mut self, text: String, done: bool) -> GenerateChunk {
        self.emitted += 1;
        GenerateChunk::delta(text, done)
    }
}

/// Drive a [`GenerateRelay`] over a live target stream.
///
/// Upstream is polled only when the returned stream is polled, so a slow
/// consumer slows the fetch. Once the final line has been yielded the stream
/// ends without polling `upstream` again. An upstream error before completion
/// yields the held chunk, then the error, then ends. Dropping the returned
/// stream drops `upstream`.
pub fn relay_generate<S>(upstream: S) -> impl Stream<Item = Result<GenerateChunk>> + Send + 'static
where
    S: Stream<Item = Result<TargetChunk>> + Send + 'static,
{
    async_stream::stream! {
        let mut relay = GenerateRelay::new();
        futures::pin_mut!(upstream);

        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    for line in relay.push(&chunk) {
                        yield Ok(line);
                    }
                    // Final line is out; stop reading so upstream is dropped
                    // even if the target never closes or sends [DONE].
                    if relay.is_finished() {
                        tracing::debug!(lines = relay.emitted(), "Generate stream completed");
                        return;
                    }
                }
                Err(e) => {
                    for line in relay.fail() {
                        yield Ok(line);
                    }
                    yield Err(e);
                    return;
                }
            }
        }

        for line in relay.finish() {
            yield Ok(line);
        }
        tracing::debug!(lines = relay.emitted(), "Generate stream completed");
    }
}

/// Translates target chunks into OpenAI `chat.completion.chunk` events.
#[derive(Debug)]
pub struct ChatStreamTranslator {
    id: String,
    model: String,
    created: i64,
    sent_role: bool,
    finished: bool,
}

impl ChatStreamTranslator {
    pub fn new(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.to_string(),
            created: chrono::Utc::now().timestamp(),
            sent_role: false,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn process_chunk(&mut self, chunk: &TargetChunk) -> Vec<ChatCompletionChunk> {
        if self.finished {
            return Vec::new();
        }
        if chunk.finish_reason.is_some() {
            self.finished = true;
        }

        let delta = ChatDelta {
            role: self.take_role(),
            content: (!chunk.text.is_empty()).then(|| chunk.text.clone()),
        };
        vec![self.make_chunk(delta, chunk.finish_reason.clone())]
    }

    /// Call when the target stream ends to close the message if the target
    /// never sent a finish reason.
    pub fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let delta = ChatDelta {
            role: self.take_role(),
            content: None,
        };
        vec![self.make_chunk(delta, Some("stop".to_string()))]
    }

    fn take_role(&mut self) -> Option<String> {
        if self.sent_role {
            None
        } else {
            self.sent_role = true;
            Some("assistant".to_string())
        }
    }

    fn make_chunk(&self, delta: ChatDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }
}
