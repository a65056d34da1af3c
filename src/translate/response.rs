//! Translate buffered target completions back into caller-facing responses.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::error::{ProxyError, Result};

use super::ollama_types::GenerateChunk;
use super::openai_types::{
    ChatChoice, ChatCompletionResponse, ChatResponseMessage, CompletionResponse,
};

static IM_START_ASSISTANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\|im_start\|>Assistant###\s*").expect("static regex")
});

static ASSISTANT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:ASSISTANT###|ASSISTANT:|<\|im_start\|>)+\s*").expect("static regex")
});

/// Translate a complete target response into one `done = true` generate chunk.
/// The completion text is relayed byte-for-byte.
pub fn completion_to_generate(resp: &CompletionResponse, model: &str) -> Result<GenerateChunk> {
    let choice = resp
        .choices
        .first()
        .ok_or_else(|| ProxyError::protocol("completion response has no choices"))?;

    Ok(GenerateChunk {
        model: Some(model.to_string()),
        created_at: Some(created_at(resp.created)),
        response: choice.text.clone(),
        done: true,
        error: None,
    })
}

/// Translate a complete target response into an OpenAI chat completion.
pub fn completion_to_chat(resp: &CompletionResponse, model: &str) -> ChatCompletionResponse {
    let choices = resp
        .choices
        .iter()
        .map(|choice| ChatChoice {
            index: choice.index,
            message: ChatResponseMessage {
                role: "assistant".to_string(),
                content: clean_completion_text(&choice.text),
            },
            finish_reason: choice.finish_reason.clone(),
        })
        .collect();

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: resp.created,
        model: model.to_string(),
        choices,
        usage: resp.usage.clone(),
    }
}

/// Strip chat-template markers that some local servers leak into completion
/// text when a chat prompt is sent to the raw completions endpoint.
pub fn clean_completion_text(text: &str) -> String {
    let text = text.trim();
    let text = IM_START_ASSISTANT.replace_all(text, "");
    ASSISTANT_PREFIX.replace(&text, "").into_owned()
}

/// RFC 3339 timestamp for a target `created` epoch; falls back to now when the
/// target left it out.
pub fn created_at(epoch_secs: i64) -> String {
    let ts = if epoch_secs > 0 {
        DateTime::<Utc>::from_timestamp(epoch_secs, 0).unwrap_or_else(Utc::now)
    } else {
        Utc::now()
    };
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
