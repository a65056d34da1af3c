//! Translate inbound requests into target completion requests.
//!
//! Both entry points are pure: they take the caller's request plus the
//! configured defaults and return the request to forward, or a validation
//! error before anything touches the network.

use std::collections::HashMap;
use std::hash::BuildHasher;

use crate::config::GenerationDefaults;
use crate::error::{ProxyError, Result};

use super::ollama_types::GenerateRequest;
use super::openai_types::{ChatCompletionRequest, ChatContent, ChatMessage, CompletionRequest};

/// Translate an Ollama generate request into a target completion request.
///
/// `model` and `prompt` pass through untouched. Sampling values the caller
/// supplied (top-level first, then `options`) are never replaced.
pub fn generate_to_completion(
    req: &GenerateRequest,
    defaults: &GenerationDefaults,
) -> Result<CompletionRequest> {
    let model = req
        .model
        .clone()
        .ok_or_else(|| ProxyError::validation("missing required field 'model'"))?;
    let prompt = req
        .prompt
        .clone()
        .ok_or_else(|| ProxyError::validation("missing required field 'prompt'"))?;

    let options = req.options.as_ref();

    let temperature = req
        .temperature
        .or_else(|| options.and_then(|o| o.temperature))
        .unwrap_or(defaults.temperature);
    let max_tokens = req
        .max_tokens
        .or_else(|| options.and_then(|o| o.num_predict))
        .unwrap_or(defaults.max_tokens);

    Ok(CompletionRequest {
        model,
        prompt,
        stream: req.stream.unwrap_or(false),
        temperature,
        max_tokens,
    })
}

/// Translate an OpenAI chat request into a completion request by flattening
/// the conversation into one prompt. The model name goes through `model_map`.
pub fn chat_to_completion<S: BuildHasher>(
    req: &ChatCompletionRequest,
    model_map: &HashMap<String, String, S>,
    defaults: &GenerationDefaults,
) -> Result<CompletionRequest> {
    if req.messages.is_empty() {
        return Err(ProxyError::validation("'messages' must not be empty"));
    }

    let model = model_map
        .get(&req.model)
        .cloned()
        .unwrap_or_else(|| req.model.clone());
    if model != req.model {
        tracing::info!(from = %req.model, to = %model, "Mapped chat model name");
    }

    Ok(CompletionRequest {
        model,
        prompt: messages_to_prompt(&req.messages),
        stream: req.stream,
        temperature: req.temperature.unwrap_or(defaults.temperature),
        max_tokens: req.max_tokens.unwrap_or(defaults.max_tokens),
    })
}

/// `ROLE: content` per message, one per line. Array content keeps its text parts.
pub fn messages_to_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for msg in messages {
        let role = msg.role.as_deref().unwrap_or("user").to_uppercase();
        let content = match &msg.content {
            Some(ChatContent::Text(text)) => text.clone(),
            Some(ChatContent::Parts(parts)) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(serde_json::Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        };
        prompt.push_str(&role);
        prompt.push_str(": ");
        prompt.push_str(&content);
        prompt.push('\n');
    }
    prompt.trim().to_string()
}
