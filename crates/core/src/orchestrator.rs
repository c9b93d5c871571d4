use tonelink_model::Message;
use tracing::Instrument;

use crate::marker;
use crate::model_client::ModelClient;

/// The reply used when every provider failed.
pub const APOLOGY: &str = "Both AI engines failed. Wanna try again?";

/// How the reply will be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplyMode {
    /// Live voice relay, stored as generated.
    Voice,
    /// Degraded link mode, stored with the marker prefix.
    Link,
}

/// Which step of the fallback chain produced a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReplySource {
    /// The primary provider.
    Primary,
    /// The secondary provider.
    Secondary,
    /// Neither, the fixed apology was used.
    Apology,
}

/// The next assistant utterance, in both of its representations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    /// The message to append to the transcript.
    pub message: Message,
    /// The text for the output channel, never carrying the marker.
    pub text: String,
    /// Where the reply came from.
    pub source: ReplySource,
}

impl Reply {
    fn new(content: &str, mode: ReplyMode, source: ReplySource) -> Self {
        let stored = match mode {
            ReplyMode::Link => marker::tag(content).into_owned(),
            ReplyMode::Voice => content.to_owned(),
        };
        Self {
            message: Message::assistant(stored),
            text: marker::strip(content).into_owned(),
            source,
        }
    }
}

/// Obtains replies from a primary provider, falling back to a secondary
/// one, and finally to [`APOLOGY`].
///
/// Each provider is tried exactly once per call, there is no retry loop.
#[derive(Clone)]
pub struct Orchestrator {
    primary: ModelClient,
    secondary: ModelClient,
}

impl Orchestrator {
    /// Creates an orchestrator over two providers.
    #[inline]
    pub fn new(primary: ModelClient, secondary: ModelClient) -> Self {
        Self { primary, secondary }
    }

    /// Produces the next assistant reply for the conversation.
    ///
    /// Never fails: provider errors, timeouts and empty completions are
    /// absorbed, and the apology is returned when nothing else worked.
    /// The transcript is not modified, the caller appends
    /// [`Reply::message`] itself.
    pub async fn next_reply(
        &self,
        transcript: &[Message],
        mode: ReplyMode,
    ) -> Reply {
        let span = debug_span!("next reply", messages = transcript.len());
        async {
            let chain = [
                (ReplySource::Primary, &self.primary),
                (ReplySource::Secondary, &self.secondary),
            ];
            for (source, client) in chain {
                let result = client.complete(transcript).await;
                // A bare marker leaves nothing to say.
                let usable = result
                    .text()
                    .filter(|text| !marker::strip(text).trim().is_empty());
                if let Some(text) = usable {
                    debug!("reply from {}", client.name());
                    return Reply::new(text, mode, source);
                }
                warn!(
                    "{} gave no usable reply (error: {:?})",
                    client.name(),
                    result.error
                );
            }
            error!("all providers failed, falling back to the apology");
            Reply::new(APOLOGY, mode, ReplySource::Apology)
        }
        .instrument(span)
        .await
    }
}
