use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tonelink_core::SessionError;
use tonelink_core::session::{ToneChannel, ToneLink, ToneSink};

/// One utterance the bridge asked to play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Utterance {
    /// Marker-free text.
    pub text: String,
    /// The channel it would be encoded on.
    pub channel: ToneChannel,
}

/// A tone link carrying plain text instead of audio.
///
/// Stands in for the acoustic codec: inbound messages are injected with
/// [`TextToneLink::deliver`], outbound ones come out of the receiver
/// returned by [`TextToneLink::new`].
#[derive(Clone)]
pub struct TextToneLink {
    sink: Arc<Mutex<Option<ToneSink>>>,
    outbound_tx: mpsc::UnboundedSender<Utterance>,
}

impl TextToneLink {
    /// Creates a link and the receiving end of its output.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Utterance>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let link = Self {
            sink: Default::default(),
            outbound_tx,
        };
        (link, outbound_rx)
    }

    /// Hands a decoded message to the bridge.
    ///
    /// Returns `false` if the bridge is not listening.
    pub fn deliver(&self, text: &str) -> bool {
        match &*self.lock() {
            Some(sink) => {
                sink.received(text);
                true
            }
            None => false,
        }
    }

    /// Returns whether the bridge is listening.
    #[inline]
    pub fn is_listening(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ToneSink>> {
        self.sink.lock().unwrap_or_else(|err| err.into_inner())
    }
}

#[async_trait]
impl ToneLink for TextToneLink {
    async fn start_listening(&self, sink: ToneSink) -> Result<(), SessionError> {
        *self.lock() = Some(sink);
        Ok(())
    }

    async fn stop_listening(&self) {
        self.lock().take();
    }

    async fn send(
        &self,
        text: &str,
        channel: ToneChannel,
    ) -> Result<(), SessionError> {
        let utterance = Utterance {
            text: text.to_owned(),
            channel,
        };
        self.outbound_tx.send(utterance).map_err(|_| {
            SessionError::Network("tone output is closed".to_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tonelink_core::session::{BridgeBuilder, SessionMode};
    use tonelink_core::{ModelClient, Orchestrator};
    use tonelink_test_model::TestModelProvider;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_link_round_trip() {
        let primary = TestModelProvider::named("primary");
        primary.add_reply("[GL MODE]: Sure, for what time?");
        let orchestrator = Orchestrator::new(
            ModelClient::new(primary),
            ModelClient::new(TestModelProvider::named("secondary")),
        );
        let (link, mut outbound_rx) = TextToneLink::new();
        let bridge = BridgeBuilder::new(orchestrator, link.clone()).build();

        assert!(!link.deliver("too early"));
        bridge.handle().quick_start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(link.is_listening());
        assert_eq!(bridge.status().borrow().mode, SessionMode::DegradedLink);

        assert!(link.deliver("A table for two"));
        let utterance = outbound_rx.recv().await.unwrap();
        assert_eq!(
            utterance,
            Utterance {
                text: "Sure, for what time?".to_owned(),
                channel: ToneChannel::Inbound,
            }
        );

        bridge.handle().end().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!link.is_listening());
    }
}
