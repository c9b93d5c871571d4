use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonelink_model::{Completion, Message, ModelRequest};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stop: Option<&'a [String]>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request<'a>(
    req: &'a ModelRequest,
    config: &'a OpenAIConfig,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: &config.model,
        messages: &req.messages,
        temperature: req.params.temperature,
        max_completion_tokens: req.params.max_tokens,
        top_p: req.params.top_p,
        stop: req.params.stop.as_deref(),
        stream: false,
    }
}

/// Converts a raw payload into a [`Completion`].
///
/// Only the first choice is considered. A payload without choices yields a
/// completion with no message, which callers treat as an empty reply.
pub fn parse_completion(raw: Value) -> Result<Completion, serde_json::Error> {
    let parsed = ChatCompletion::deserialize(&raw)?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(Message::assistant);
    Ok(Completion { message, raw })
}
