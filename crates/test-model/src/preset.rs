use serde::{Deserialize, Serialize};

/// How the fake provider answers one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetOutcome {
    /// A successful completion with the given text.
    #[serde(rename = "reply")]
    Reply(String),
    /// A successful completion without any generated text.
    #[serde(rename = "empty")]
    Empty,
    /// A failed request.
    #[serde(rename = "failure")]
    Failure,
    /// A request that never completes.
    #[serde(rename = "hang")]
    Hang,
}

impl PresetOutcome {
    /// Creates a `Reply` outcome.
    #[inline]
    pub fn reply<S: Into<String>>(text: S) -> Self {
        Self::Reply(text.into())
    }
}
