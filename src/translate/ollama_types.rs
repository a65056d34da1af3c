//! Type definitions for the [Ollama generate API](https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-completion),
//! the dialect this proxy exposes to its callers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request types (what callers send US)
// ---------------------------------------------------------------------------

/// Body of `POST /api/generate`.
///
/// `model` and `prompt` are optional here so that their absence is reported
/// as a validation error by the translator rather than a serde message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub options: Option<GenerateOptions>,
}

/// Ollama's nested sampling knobs. Only the two we can forward are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub num_predict: Option<u64>,
}

// ---------------------------------------------------------------------------
// Response types (what we send BACK)
// ---------------------------------------------------------------------------

/// One line of a generate response. A buffered reply is a single chunk with
/// `done = true`; a streamed reply is a sequence of them, one per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub response: String,
    pub done: bool,
    /// Set only on the terminal line of a stream that failed after commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerateChunk {
    pub fn delta(text: impl Into<String>, done: bool) -> Self {
        Self {
            model: None,
            created_at: None,
            response: text.into(),
            done,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::delta("", true)
        }
    }

    /// Serialize as a single NDJSON line, trailing newline included.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Error body in the shape Ollama clients expect: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateError {
    pub error: String,
    pub reason: String,
}
