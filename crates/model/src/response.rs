use serde_json::Value;

use crate::Message;

/// A completed response from the model provider.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    /// The generated message, if the provider produced one.
    pub message: Option<Message>,
    /// The raw payload as returned by the vendor.
    pub raw: Value,
}

impl Completion {
    /// Returns the generated text, treating whitespace-only text as absent.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(Message::content)
            .filter(|content| !content.trim().is_empty())
    }
}
