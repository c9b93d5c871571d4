//! Boundaries to the external collaborators of the session bridge.
//!
//! None of these are implemented here. The voice SDK, the signing
//! service, microphone access and the tone codec all live outside this
//! crate and are plugged in through [`crate::session::BridgeBuilder`].

use async_trait::async_trait;

use crate::persona::Persona;
use crate::session::BridgeHandle;
use crate::session::machine::{SessionEvent, VoiceGeneration};
use crate::SessionError;

/// Who produced a voice transcript line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// The remote voice agent.
    Agent,
    /// The person (or machine) talking to the agent.
    User,
}

/// The channel selector passed to the tone encoder.
///
/// Each persona encodes on its own channel so that both sides of a link
/// can run on the same machine without hearing themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToneChannel {
    /// Used by the inbound persona.
    Inbound,
    /// Used by the outbound persona.
    Outbound,
}

impl From<Persona> for ToneChannel {
    #[inline]
    fn from(persona: Persona) -> Self {
        match persona {
            Persona::Inbound => ToneChannel::Inbound,
            Persona::Outbound => ToneChannel::Outbound,
        }
    }
}

/// Grants access to an audio input device.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Asks for permission to record. Returns `false` when denied.
    async fn request_permission(&self) -> bool;
}

/// Issues short-lived URLs for opening a voice session.
#[async_trait]
pub trait SignedUrlSource: Send + Sync {
    /// Returns a signed URL for the given agent.
    async fn signed_url(&self, agent_id: &str) -> Result<String, SessionError>;
}

/// Opens sessions with the hosted voice agent.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// Connects to the agent behind `signed_url`.
    ///
    /// Callbacks from the SDK must be forwarded through `events`.
    async fn connect(
        &self,
        signed_url: &str,
        events: VoiceEvents,
    ) -> Result<Box<dyn VoiceSession>, SessionError>;
}

/// A live session with the hosted voice agent.
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Ends the session. The session is discarded afterwards regardless of
    /// the result.
    async fn end(&mut self) -> Result<(), SessionError>;

    /// Answers a client tool call.
    async fn send_tool_result(
        &mut self,
        call_id: &str,
        output: &str,
    ) -> Result<(), SessionError>;
}

/// Tone-encoded input and output.
#[async_trait]
pub trait ToneLink: Send + Sync {
    /// Starts decoding inbound messages into `sink`.
    async fn start_listening(&self, sink: ToneSink) -> Result<(), SessionError>;

    /// Stops decoding inbound messages.
    async fn stop_listening(&self);

    /// Encodes and plays `text` on `channel`.
    async fn send(
        &self,
        text: &str,
        channel: ToneChannel,
    ) -> Result<(), SessionError>;
}

/// Forwards voice SDK callbacks to the bridge.
///
/// Each connection gets its own `VoiceEvents`. Once the bridge has opened
/// a newer session, callbacks through an older one are ignored.
#[derive(Clone)]
pub struct VoiceEvents {
    handle: BridgeHandle,
    generation: VoiceGeneration,
}

impl VoiceEvents {
    pub(crate) fn new(handle: BridgeHandle, generation: VoiceGeneration) -> Self {
        Self { handle, generation }
    }

    /// The session went away.
    pub fn disconnected(&self) {
        self.forward(SessionEvent::VoiceDisconnected {
            generation: self.generation,
        });
    }

    /// A transcript line was produced.
    pub fn message<S: Into<String>>(&self, speaker: Speaker, text: S) {
        self.forward(SessionEvent::VoiceMessage {
            generation: self.generation,
            speaker,
            text: text.into(),
        });
    }

    /// The agent invoked a client tool.
    pub fn tool_call<S: Into<String>>(&self, call_id: S, name: S) {
        self.forward(SessionEvent::ToolCall {
            generation: self.generation,
            call_id: call_id.into(),
            name: name.into(),
        });
    }

    fn forward(&self, event: SessionEvent) {
        if self.handle.send(event).is_err() {
            debug!("bridge is gone, dropping voice event");
        }
    }
}

/// Receives decoded tone messages on behalf of the bridge.
#[derive(Clone)]
pub struct ToneSink(pub(crate) BridgeHandle);

impl ToneSink {
    /// Delivers one decoded message.
    pub fn received<S: Into<String>>(&self, text: S) {
        if self.0.send(SessionEvent::ToneReceived(text.into())).is_err() {
            debug!("bridge is gone, dropping tone message");
        }
    }
}
