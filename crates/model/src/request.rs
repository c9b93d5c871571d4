use serde::{Deserialize, Serialize};

use crate::Message;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The full conversation so far, system message first.
    pub messages: Vec<Message>,
    /// Sampling parameters.
    #[serde(default)]
    pub params: GenerationParams,
}

impl ModelRequest {
    /// Creates a request with the default generation parameters.
    #[inline]
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            params: GenerationParams::default(),
        }
    }
}

/// Sampling parameters passed to the provider.
///
/// The defaults are the fixed values every relay request uses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound of generated tokens.
    pub max_tokens: u32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Stop sequences, `None` to disable.
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_tokens: 1024,
            top_p: 1.0,
            stop: None,
        }
    }
}
