use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tonelink_model::Message;
use tracing::Instrument;

use crate::orchestrator::{Orchestrator, ReplyMode};
use crate::persona::{AgentDirectory, Persona};
use crate::session::external::{
    Microphone, SignedUrlSource, ToneLink, ToneSink, VoiceConnector,
    VoiceEvents, VoiceSession,
};
use crate::session::machine::{
    Command, SessionEvent, SessionMachine, SessionMode, Ticket,
    VoiceGeneration,
};
use crate::SessionError;

type CaptionFn = Box<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(SessionError) + Send + Sync>;

/// Returned when sending to a bridge that has shut down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("the session bridge has shut down")]
pub struct BridgeClosed;

/// A cheap, cloneable sender of events to a running [`Bridge`].
#[derive(Clone, Debug)]
pub struct BridgeHandle {
    event_tx: mpsc::UnboundedSender<SessionEvent>,
}

impl BridgeHandle {
    /// Sends a raw event.
    #[inline]
    pub fn send(&self, event: SessionEvent) -> Result<(), BridgeClosed> {
        self.event_tx.send(event).map_err(|_| BridgeClosed)
    }

    /// Starts a live voice conversation.
    #[inline]
    pub fn start(&self) -> Result<(), BridgeClosed> {
        self.send(SessionEvent::StartRequested)
    }

    /// Enters link mode without a voice session.
    #[inline]
    pub fn quick_start(&self) -> Result<(), BridgeClosed> {
        self.send(SessionEvent::QuickStartRequested)
    }

    /// Ends the conversation.
    #[inline]
    pub fn end(&self) -> Result<(), BridgeClosed> {
        self.send(SessionEvent::EndRequested)
    }

    /// Switches persona, only honored while idle.
    #[inline]
    pub fn switch_persona(&self) -> Result<(), BridgeClosed> {
        self.send(SessionEvent::SwitchPersonaRequested)
    }
}

/// What the UI needs to know about the session after each event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    /// The active persona.
    pub persona: Persona,
    /// The active mode.
    pub mode: SessionMode,
    /// Whether a voice session is being opened.
    pub connecting: bool,
    /// Whether a reply is being generated.
    pub busy: bool,
    /// The conversation so far.
    pub transcript: Vec<Message>,
}

impl SessionStatus {
    fn of(machine: &SessionMachine) -> Self {
        Self {
            persona: machine.persona(),
            mode: machine.mode(),
            connecting: machine.is_connecting(),
            busy: machine.is_busy(),
            transcript: machine.transcript().snapshot(),
        }
    }
}

struct VoiceStack {
    microphone: Arc<dyn Microphone>,
    signer: Arc<dyn SignedUrlSource>,
    connector: Arc<dyn VoiceConnector>,
}

/// [`Bridge`] builder.
pub struct BridgeBuilder {
    orchestrator: Orchestrator,
    tone_link: Arc<dyn ToneLink>,
    persona: Persona,
    directory: AgentDirectory,
    voice: Option<VoiceStack>,
    on_caption: Option<CaptionFn>,
    on_error: Option<ErrorFn>,
}

impl BridgeBuilder {
    /// Creates a builder with the reply source and the tone link.
    #[inline]
    pub fn new(
        orchestrator: Orchestrator,
        tone_link: impl ToneLink + 'static,
    ) -> Self {
        Self {
            orchestrator,
            tone_link: Arc::new(tone_link),
            persona: Persona::default(),
            directory: AgentDirectory::default(),
            voice: None,
            on_caption: None,
            on_error: None,
        }
    }

    /// Sets the initial persona.
    #[inline]
    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    /// Sets the persona to agent id mapping.
    #[inline]
    pub fn with_agent_directory(mut self, directory: AgentDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Enables live voice sessions.
    ///
    /// Without this, starting a live session reports a configuration error
    /// and only the link mode is available.
    #[inline]
    pub fn with_voice(
        mut self,
        microphone: impl Microphone + 'static,
        signer: impl SignedUrlSource + 'static,
        connector: impl VoiceConnector + 'static,
    ) -> Self {
        self.voice = Some(VoiceStack {
            microphone: Arc::new(microphone),
            signer: Arc::new(signer),
            connector: Arc::new(connector),
        });
        self
    }

    /// Attaches a callback invoked with every utterance sent over the link.
    #[inline]
    pub fn on_caption(
        mut self,
        on_caption: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_caption = Some(Box::new(on_caption));
        self
    }

    /// Attaches a callback invoked with user-visible errors.
    #[inline]
    pub fn on_error(
        mut self,
        on_error: impl Fn(SessionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Spawns the bridge on the current tokio runtime.
    pub fn build(self) -> Bridge {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let machine = SessionMachine::new(self.persona);
        let (status_tx, status_rx) =
            watch::channel(SessionStatus::of(&machine));
        let handle = BridgeHandle { event_tx };

        let driver = Driver {
            machine,
            orchestrator: self.orchestrator,
            tone_link: self.tone_link,
            directory: self.directory,
            voice: self.voice,
            voice_session: None,
            listening: false,
            handle: handle.clone(),
            status_tx,
            on_caption: self.on_caption,
            on_error: self.on_error,
        };
        tokio::spawn(
            driver
                .run(event_rx, kill_rx)
                .instrument(trace_span!("bridge")),
        );

        Bridge {
            handle,
            status_rx,
            kill_tx,
        }
    }
}

/// The conversation session bridge.
///
/// Events are handled one at a time, in the order they were sent. Reply
/// generation runs in the background so that events keep flowing while a
/// provider is thinking; the state machine decides what to do with events
/// that arrive in the meantime.
///
/// Dropping the bridge shuts it down and ends any open voice session.
pub struct Bridge {
    handle: BridgeHandle,
    status_rx: watch::Receiver<SessionStatus>,
    kill_tx: watch::Sender<bool>,
}

impl Bridge {
    /// Returns a handle for sending events.
    #[inline]
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Returns a receiver observing the session status.
    #[inline]
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Stops handling events.
    #[inline]
    pub fn shutdown(&self) {
        self.kill_tx.send(true).ok();
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Driver {
    machine: SessionMachine,
    orchestrator: Orchestrator,
    tone_link: Arc<dyn ToneLink>,
    directory: AgentDirectory,
    voice: Option<VoiceStack>,
    voice_session: Option<Box<dyn VoiceSession>>,
    listening: bool,
    handle: BridgeHandle,
    status_tx: watch::Sender<SessionStatus>,
    on_caption: Option<CaptionFn>,
    on_error: Option<ErrorFn>,
}

impl Driver {
    async fn run(
        mut self,
        mut event_rx: mpsc::UnboundedReceiver<SessionEvent>,
        mut kill_rx: watch::Receiver<bool>,
    ) {
        debug!("started");
        loop {
            let event = select! {
                biased;

                _ = kill_rx.changed() => {
                    break;
                }
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    event
                }
            };
            trace!("received event: {event:?}");
            self.dispatch(event).await;
        }

        self.end_voice_session().await;
        if self.listening {
            self.tone_link.stop_listening().await;
        }
        debug!("will terminate");
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from(self.machine.handle(event));
        while let Some(command) = queue.pop_front() {
            trace!("running command: {command:?}");
            if let Some(follow_up) = self.execute(command).await {
                queue.extend(self.machine.handle(follow_up));
            }
        }
        self.status_tx.send_replace(SessionStatus::of(&self.machine));
    }

    async fn execute(&mut self, command: Command) -> Option<SessionEvent> {
        match command {
            Command::OpenVoiceSession {
                persona,
                generation,
            } => {
                self.end_voice_session().await;
                let event = match self
                    .open_voice_session(persona, generation)
                    .await
                {
                    Ok(session) => {
                        self.voice_session = Some(session);
                        SessionEvent::VoiceOpened
                    }
                    Err(err) => SessionEvent::VoiceFailed(err),
                };
                return Some(event);
            }
            Command::EndVoiceSession => self.end_voice_session().await,
            Command::RespondToTool { call_id, output } => {
                let Some(session) = &mut self.voice_session else {
                    debug!("no voice session to answer tool call {call_id}");
                    return None;
                };
                if let Err(err) =
                    session.send_tool_result(&call_id, &output).await
                {
                    warn!("failed to answer tool call {call_id}: {err}");
                }
            }
            Command::StartToneListener => {
                if self.listening {
                    return None;
                }
                let sink = ToneSink(self.handle.clone());
                match self.tone_link.start_listening(sink).await {
                    Ok(()) => self.listening = true,
                    Err(err) => self.report(err),
                }
            }
            Command::StopToneListener => {
                if self.listening {
                    self.tone_link.stop_listening().await;
                    self.listening = false;
                }
            }
            Command::RequestReply {
                ticket,
                transcript,
                mode,
            } => self.spawn_reply(ticket, transcript, mode),
            Command::EmitTone { text, channel } => {
                if let Err(err) = self.tone_link.send(&text, channel).await {
                    self.report(err);
                }
            }
            Command::ShowCaption(text) => {
                if let Some(on_caption) = &self.on_caption {
                    on_caption(&text);
                }
            }
            Command::ReportError(err) => self.report(err),
        }
        None
    }

    async fn open_voice_session(
        &self,
        persona: Persona,
        generation: VoiceGeneration,
    ) -> Result<Box<dyn VoiceSession>, SessionError> {
        let Some(voice) = &self.voice else {
            return Err(SessionError::ConfigurationMissing(
                "voice connector".to_owned(),
            ));
        };
        if !voice.microphone.request_permission().await {
            return Err(SessionError::PermissionDenied);
        }
        let agent_id = self.directory.agent_id(persona)?;
        let signed_url = voice.signer.signed_url(agent_id).await?;
        let events = VoiceEvents::new(self.handle.clone(), generation);
        voice.connector.connect(&signed_url, events).await
    }

    /// Ends and discards the voice session. Failures are only logged.
    async fn end_voice_session(&mut self) {
        let Some(mut session) = self.voice_session.take() else {
            return;
        };
        if let Err(err) = session.end().await {
            warn!("{err}");
        }
    }

    fn spawn_reply(
        &self,
        ticket: Ticket,
        transcript: Vec<Message>,
        mode: ReplyMode,
    ) {
        let orchestrator = self.orchestrator.clone();
        let handle = self.handle.clone();
        // Not tracked: ending the conversation does not cancel replies.
        tokio::spawn(
            async move {
                let reply = orchestrator.next_reply(&transcript, mode).await;
                handle.send(SessionEvent::ReplyReady { ticket, reply }).ok();
            }
            .instrument(debug_span!("reply")),
        );
    }

    fn report(&self, err: SessionError) {
        warn!("session error: {err}");
        if let Some(on_error) = &self.on_error {
            on_error(err);
        }
    }
}
