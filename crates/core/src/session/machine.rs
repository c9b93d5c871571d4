use tonelink_model::Message;

use crate::marker;
use crate::orchestrator::{Reply, ReplyMode};
use crate::persona::Persona;
use crate::session::external::{Speaker, ToneChannel};
use crate::transcript::Transcript;
use crate::SessionError;

/// Name of the client tool the voice agent invokes to switch to link mode.
pub const SWITCH_MODE_TOOL: &str = "gibbMode";

const TOOL_ACK: &str = "entering GibberLink mode";
const LINK_ACK: &str = "yep, GL mode activated";
const LINK_CHECK: &str = "is it better now?";

/// The active conversation mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Nothing is running.
    #[default]
    Idle,
    /// The external voice session relays the conversation.
    LiveVoice,
    /// Tone-encoded messages carry the conversation.
    DegradedLink,
}

/// Identifies one orchestrator request.
///
/// Only one ticket is outstanding at a time; the transcript epoch lets a
/// late reply detect that its transcript has been discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    id: u64,
    epoch: u64,
}

/// Identifies one attempt to open a voice session.
///
/// Callbacks from a session that has since been replaced carry an older
/// generation and are dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VoiceGeneration(u64);

/// Inputs to the session state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// The user asked to start a live voice conversation.
    StartRequested,
    /// The user asked to go straight to link mode.
    QuickStartRequested,
    /// The user asked to end the conversation.
    EndRequested,
    /// The user asked to switch between inbound and outbound personas.
    SwitchPersonaRequested,
    /// The voice session has been opened.
    VoiceOpened,
    /// Opening the voice session failed.
    VoiceFailed(SessionError),
    /// The voice session went away on its own.
    VoiceDisconnected {
        /// The session that went away.
        generation: VoiceGeneration,
    },
    /// The voice session produced a transcript line.
    VoiceMessage {
        /// The session that produced it.
        generation: VoiceGeneration,
        /// Who spoke.
        speaker: Speaker,
        /// What was said.
        text: String,
    },
    /// The voice agent invoked a client tool.
    ToolCall {
        /// The session the call came from.
        generation: VoiceGeneration,
        /// Identifier to answer the call with.
        call_id: String,
        /// The tool name.
        name: String,
    },
    /// A tone-encoded message was decoded.
    ToneReceived(String),
    /// The orchestrator produced a reply.
    ReplyReady {
        /// The request this reply answers.
        ticket: Ticket,
        /// The reply itself.
        reply: Reply,
    },
}

/// Side effects requested by the state machine, executed in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Acquire the microphone, sign and open a voice session.
    OpenVoiceSession {
        /// The persona whose agent should answer.
        persona: Persona,
        /// Stamped on every callback of the new session.
        generation: VoiceGeneration,
    },
    /// End and discard the current voice session, if any.
    EndVoiceSession,
    /// Answer a client tool call on the voice session.
    RespondToTool {
        /// The call being answered.
        call_id: String,
        /// The tool output.
        output: String,
    },
    /// Begin decoding inbound tone messages.
    StartToneListener,
    /// Stop decoding inbound tone messages.
    StopToneListener,
    /// Ask the orchestrator for the next reply.
    RequestReply {
        /// Ticket to hand back with the reply.
        ticket: Ticket,
        /// Snapshot of the transcript.
        transcript: Vec<Message>,
        /// How the reply should be stored.
        mode: ReplyMode,
    },
    /// Encode and play a message over the link.
    EmitTone {
        /// Marker-free text.
        text: String,
        /// The channel to encode on.
        channel: ToneChannel,
    },
    /// Show the latest link utterance to the user.
    ShowCaption(String),
    /// Surface an error to the user.
    ReportError(SessionError),
}

/// The conversation session state machine.
///
/// Each event is handled to completion and yields the commands the driver
/// must run. The machine never performs I/O itself.
#[derive(Clone, Debug)]
pub struct SessionMachine {
    persona: Persona,
    mode: SessionMode,
    connecting: bool,
    transcript: Transcript,
    in_flight: Option<Ticket>,
    next_ticket: u64,
    voice_generation: VoiceGeneration,
}

impl SessionMachine {
    /// Creates an idle machine for the persona.
    pub fn new(persona: Persona) -> Self {
        Self {
            persona,
            mode: SessionMode::Idle,
            connecting: false,
            transcript: Transcript::new(persona.system_prompt()),
            in_flight: None,
            next_ticket: 1,
            voice_generation: VoiceGeneration::default(),
        }
    }

    /// Returns the active persona.
    #[inline]
    pub fn persona(&self) -> Persona {
        self.persona
    }

    /// Returns the active mode.
    #[inline]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Returns whether a voice session is being opened.
    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Returns whether an orchestrator request is outstanding.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the generation of the most recently opened voice session.
    #[inline]
    pub fn voice_generation(&self) -> VoiceGeneration {
        self.voice_generation
    }

    /// Handles one event.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<Command> {
        match event {
            SessionEvent::StartRequested => self.start(),
            SessionEvent::QuickStartRequested => self.quick_start(),
            SessionEvent::EndRequested => self.end(),
            SessionEvent::SwitchPersonaRequested => self.switch_persona(),
            SessionEvent::VoiceOpened => self.voice_opened(),
            SessionEvent::VoiceFailed(err) => self.voice_failed(err),
            SessionEvent::VoiceDisconnected { generation }
            | SessionEvent::VoiceMessage { generation, .. }
            | SessionEvent::ToolCall { generation, .. }
                if generation != self.voice_generation =>
            {
                debug!("dropping event from a replaced voice session");
                vec![]
            }
            SessionEvent::VoiceDisconnected { .. } => self.voice_disconnected(),
            SessionEvent::VoiceMessage { speaker, text, .. } => {
                self.voice_message(speaker, text)
            }
            SessionEvent::ToolCall { call_id, name, .. } => {
                self.tool_call(call_id, name)
            }
            SessionEvent::ToneReceived(text) => self.tone_received(text),
            SessionEvent::ReplyReady { ticket, reply } => {
                self.reply_ready(ticket, reply)
            }
        }
    }

    fn start(&mut self) -> Vec<Command> {
        if self.connecting {
            debug!("already connecting, ignoring start");
            return vec![];
        }
        // The old session must be gone before the new one is opened.
        let mut commands = self.teardown();
        self.connecting = true;
        self.voice_generation.0 += 1;
        commands.push(Command::OpenVoiceSession {
            persona: self.persona,
            generation: self.voice_generation,
        });
        commands
    }

    fn quick_start(&mut self) -> Vec<Command> {
        if self.mode != SessionMode::Idle || self.connecting {
            debug!("quick start is only possible from idle");
            return vec![];
        }
        info!("entering link mode directly");
        self.mode = SessionMode::DegradedLink;
        vec![Command::StartToneListener]
    }

    fn end(&mut self) -> Vec<Command> {
        self.connecting = false;
        info!("ending conversation");
        self.teardown()
    }

    fn teardown(&mut self) -> Vec<Command> {
        if self.mode == SessionMode::Idle {
            return vec![];
        }
        self.mode = SessionMode::Idle;
        vec![Command::EndVoiceSession, Command::StopToneListener]
    }

    fn switch_persona(&mut self) -> Vec<Command> {
        if self.mode != SessionMode::Idle || self.connecting {
            debug!("persona can only be switched while idle");
            return vec![];
        }
        self.persona = self.persona.toggled();
        self.transcript.reset(self.persona.system_prompt());
        info!("switched persona to {}", self.persona);
        vec![]
    }

    fn voice_opened(&mut self) -> Vec<Command> {
        if !self.connecting {
            // The conversation was ended while the session was opening.
            return vec![Command::EndVoiceSession];
        }
        self.connecting = false;
        self.mode = SessionMode::LiveVoice;
        info!("live voice session opened");
        if self.persona == Persona::Inbound {
            // Listen for the other side switching to the link on its own.
            vec![Command::StartToneListener]
        } else {
            vec![]
        }
    }

    fn voice_failed(&mut self, err: SessionError) -> Vec<Command> {
        self.connecting = false;
        vec![Command::ReportError(err)]
    }

    fn voice_disconnected(&mut self) -> Vec<Command> {
        if self.mode != SessionMode::LiveVoice {
            return vec![];
        }
        info!("voice session disconnected");
        self.teardown()
    }

    fn voice_message(&mut self, speaker: Speaker, text: String) -> Vec<Command> {
        if self.mode != SessionMode::LiveVoice {
            return vec![];
        }
        let msg = match speaker {
            Speaker::Agent => Message::assistant(text),
            Speaker::User => Message::user(text),
        };
        self.transcript.push(msg);
        vec![]
    }

    fn tool_call(&mut self, call_id: String, name: String) -> Vec<Command> {
        if name != SWITCH_MODE_TOOL {
            warn!("unsupported client tool: {name}");
            return vec![Command::RespondToTool {
                call_id,
                output: format!("unsupported tool: {name}"),
            }];
        }
        if self.mode != SessionMode::LiveVoice {
            debug!("switch requested outside live voice, ignoring");
            return vec![];
        }

        info!("voice agent switched to link mode");
        self.mode = SessionMode::DegradedLink;
        self.transcript
            .push(Message::assistant(marker::tag(LINK_ACK)));
        self.transcript.push(Message::user(marker::tag(LINK_CHECK)));
        vec![
            Command::RespondToTool {
                call_id,
                output: TOOL_ACK.to_owned(),
            },
            Command::EndVoiceSession,
            Command::StartToneListener,
            Command::ShowCaption(LINK_CHECK.to_owned()),
            Command::EmitTone {
                text: LINK_CHECK.to_owned(),
                channel: self.persona.into(),
            },
        ]
    }

    fn tone_received(&mut self, text: String) -> Vec<Command> {
        if self.mode == SessionMode::Idle {
            debug!("not listening, dropping tone message");
            return vec![];
        }
        if self.in_flight.is_some() {
            debug!("still processing, dropping tone message: {text}");
            return vec![];
        }

        let mut commands = vec![];
        if self.mode == SessionMode::LiveVoice {
            info!("tone message detected, switching to link mode");
            self.mode = SessionMode::DegradedLink;
            commands.push(Command::EndVoiceSession);
        }

        self.transcript.push(Message::user(marker::tag(&text)));
        let ticket = Ticket {
            id: self.next_ticket,
            epoch: self.transcript.epoch(),
        };
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        commands.push(Command::RequestReply {
            ticket,
            transcript: self.transcript.snapshot(),
            mode: ReplyMode::Link,
        });
        commands
    }

    fn reply_ready(&mut self, ticket: Ticket, reply: Reply) -> Vec<Command> {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
        if ticket.epoch != self.transcript.epoch() {
            debug!("dropping reply for a discarded transcript");
            return vec![];
        }

        // Replies finishing after the conversation ended are still kept.
        self.transcript.push(reply.message);
        if self.mode != SessionMode::DegradedLink {
            debug!("conversation is over, not sending the reply");
            return vec![];
        }
        vec![
            Command::ShowCaption(reply.text.clone()),
            Command::EmitTone {
                text: reply.text,
                channel: self.persona.into(),
            },
        ]
    }
}
