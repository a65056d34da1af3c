//! API translation between the Ollama generate dialect and OpenAI-style completions.
//!
//! The core of the proxy: converts requests, responses, and streaming chunks
//! between the two formats. Everything here is pure (no I/O); the relay in
//! [`streaming`] only drives a stream it is handed.

pub mod ollama_types;
pub mod openai_types;
pub mod request;
pub mod response;
pub mod streaming;

/// One unit of the target's incremental output.
///
/// The end of the sequence is the completion marker; `finish_reason` is set
/// when the target reports why generation stopped on this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChunk {
    pub text: String,
    pub finish_reason: Option<String>,
}

impl TargetChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
        }
    }

    pub fn finished(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: Some(reason.into()),
        }
    }

    /// An empty frame that only says "stop".
    pub fn is_marker_only(&self) -> bool {
        self.text.is_empty() && self.finish_reason.is_some()
    }
}
