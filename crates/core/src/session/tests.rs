use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tonelink_model::Message;
use tonelink_test_model::TestModelProvider;

use super::*;
use crate::{
    APOLOGY, AgentDirectory, ModelClient, Orchestrator, Persona, SessionError,
};

type Slot<T> = Arc<Mutex<Option<T>>>;

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push<S: Into<String>>(&self, entry: S) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct FakeMicrophone {
    granted: bool,
    log: Log,
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn request_permission(&self) -> bool {
        self.log.push("mic");
        self.granted
    }
}

struct FakeSigner {
    log: Log,
}

#[async_trait]
impl SignedUrlSource for FakeSigner {
    async fn signed_url(&self, agent_id: &str) -> Result<String, SessionError> {
        self.log.push(format!("sign {agent_id}"));
        Ok(format!("wss://voice.test/{agent_id}"))
    }
}

struct FakeConnector {
    log: Log,
    events: Slot<VoiceEvents>,
    failing_end: bool,
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        signed_url: &str,
        events: VoiceEvents,
    ) -> Result<Box<dyn VoiceSession>, SessionError> {
        self.log.push(format!("connect {signed_url}"));
        *self.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakeSession {
            log: self.log.clone(),
            failing_end: self.failing_end,
        }))
    }
}

struct FakeSession {
    log: Log,
    failing_end: bool,
}

#[async_trait]
impl VoiceSession for FakeSession {
    async fn end(&mut self) -> Result<(), SessionError> {
        self.log.push("end voice");
        if self.failing_end {
            return Err(SessionError::Teardown("socket already closed".into()));
        }
        Ok(())
    }

    async fn send_tool_result(
        &mut self,
        call_id: &str,
        output: &str,
    ) -> Result<(), SessionError> {
        self.log.push(format!("tool {call_id}: {output}"));
        Ok(())
    }
}

struct FakeToneLink {
    log: Log,
    sink: Slot<ToneSink>,
}

#[async_trait]
impl ToneLink for FakeToneLink {
    async fn start_listening(&self, sink: ToneSink) -> Result<(), SessionError> {
        self.log.push("listen");
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn stop_listening(&self) {
        self.log.push("stop listening");
    }

    async fn send(
        &self,
        text: &str,
        channel: ToneChannel,
    ) -> Result<(), SessionError> {
        self.log.push(format!("tone {channel:?}: {text}"));
        Ok(())
    }
}

struct Setup {
    persona: Persona,
    voice: bool,
    microphone_granted: bool,
    agent_ids: bool,
    failing_end: bool,
    reply_delay: Option<Duration>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            persona: Persona::Inbound,
            voice: true,
            microphone_granted: true,
            agent_ids: true,
            failing_end: false,
            reply_delay: None,
        }
    }
}

impl Setup {
    fn build(self) -> Harness {
        let log = Log::default();
        let voice_events: Slot<VoiceEvents> = Default::default();
        let tone_sink: Slot<ToneSink> = Default::default();
        let captions: Arc<Mutex<Vec<String>>> = Default::default();
        let errors: Arc<Mutex<Vec<SessionError>>> = Default::default();

        let mut primary = TestModelProvider::named("primary");
        let mut secondary = TestModelProvider::named("secondary");
        if let Some(delay) = self.reply_delay {
            primary.set_delay(delay);
            secondary.set_delay(delay);
        }
        let orchestrator = Orchestrator::new(
            ModelClient::new(primary.clone()),
            ModelClient::new(secondary.clone()),
        );

        let directory = if self.agent_ids {
            AgentDirectory::new(
                Some("agent-in".to_owned()),
                Some("agent-out".to_owned()),
            )
        } else {
            AgentDirectory::default()
        };

        let tone_link = FakeToneLink {
            log: log.clone(),
            sink: tone_sink.clone(),
        };
        let mut builder = BridgeBuilder::new(orchestrator, tone_link)
            .with_persona(self.persona)
            .with_agent_directory(directory)
            .on_caption({
                let captions = captions.clone();
                move |text| captions.lock().unwrap().push(text.to_owned())
            })
            .on_error({
                let errors = errors.clone();
                move |err| errors.lock().unwrap().push(err)
            });
        if self.voice {
            builder = builder.with_voice(
                FakeMicrophone {
                    granted: self.microphone_granted,
                    log: log.clone(),
                },
                FakeSigner { log: log.clone() },
                FakeConnector {
                    log: log.clone(),
                    events: voice_events.clone(),
                    failing_end: self.failing_end,
                },
            );
        }

        Harness {
            bridge: builder.build(),
            log,
            voice_events,
            tone_sink,
            captions,
            errors,
            primary,
        }
    }
}

struct Harness {
    bridge: Bridge,
    log: Log,
    voice_events: Slot<VoiceEvents>,
    tone_sink: Slot<ToneSink>,
    captions: Arc<Mutex<Vec<String>>>,
    errors: Arc<Mutex<Vec<SessionError>>>,
    primary: TestModelProvider,
}

impl Harness {
    fn status(&self) -> SessionStatus {
        self.bridge.status().borrow().clone()
    }

    fn voice(&self) -> VoiceEvents {
        self.voice_events.lock().unwrap().clone().expect("not connected")
    }

    fn tone(&self, text: &str) {
        let sink = self.tone_sink.lock().unwrap().clone();
        sink.expect("not listening").received(text);
    }

    fn captions(&self) -> Vec<String> {
        self.captions.lock().unwrap().clone()
    }

    fn errors(&self) -> Vec<SessionError> {
        self.errors.lock().unwrap().clone()
    }
}

/// Lets the bridge and its reply tasks run until they are idle.
async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test(start_paused = true)]
async fn test_live_voice_session() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    let status = harness.status();
    assert_eq!(status.mode, SessionMode::LiveVoice);
    assert!(!status.connecting);
    assert_eq!(
        harness.log.entries(),
        [
            "mic",
            "sign agent-in",
            "connect wss://voice.test/agent-in",
            "listen",
        ]
    );

    let voice = harness.voice();
    voice.message(Speaker::Agent, "Hello, how can I help?");
    voice.message(Speaker::User, "A table for two, please.");
    settle().await;
    let transcript = harness.status().transcript;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1], Message::assistant("Hello, how can I help?"));
    assert_eq!(transcript[2], Message::user("A table for two, please."));

    voice.disconnected();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::Idle);
    assert!(harness.log.entries().ends_with(&[
        "end voice".to_owned(),
        "stop listening".to_owned(),
    ]));
    assert!(harness.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_microphone_denied() {
    let harness = Setup {
        microphone_granted: false,
        ..Default::default()
    }
    .build();

    harness.bridge.handle().start().unwrap();
    settle().await;
    let status = harness.status();
    assert_eq!(status.mode, SessionMode::Idle);
    assert!(!status.connecting);
    assert_eq!(harness.errors(), [SessionError::PermissionDenied]);
    assert_eq!(harness.log.entries(), ["mic"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_agent_id() {
    let harness = Setup {
        agent_ids: false,
        ..Default::default()
    }
    .build();

    harness.bridge.handle().start().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::Idle);
    assert_eq!(
        harness.errors(),
        [SessionError::ConfigurationMissing(
            AgentDirectory::INBOUND_VAR.to_owned()
        )]
    );
    assert_eq!(harness.log.entries(), ["mic"]);
}

#[tokio::test(start_paused = true)]
async fn test_start_without_voice_stack() {
    let harness = Setup {
        voice: false,
        ..Default::default()
    }
    .build();

    harness.bridge.handle().start().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::Idle);
    assert!(matches!(
        harness.errors().as_slice(),
        [SessionError::ConfigurationMissing(_)]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_switch_tool_call() {
    let harness = Setup {
        persona: Persona::Outbound,
        ..Default::default()
    }
    .build();

    harness.bridge.handle().start().unwrap();
    settle().await;
    harness.voice().tool_call("call-1", SWITCH_MODE_TOOL);
    settle().await;

    let status = harness.status();
    assert_eq!(status.mode, SessionMode::DegradedLink);
    assert_eq!(
        harness.log.entries(),
        [
            "mic",
            "sign agent-out",
            "connect wss://voice.test/agent-out",
            "tool call-1: entering GibberLink mode",
            "end voice",
            "listen",
            "tone Outbound: is it better now?",
        ]
    );
    assert_eq!(harness.captions(), ["is it better now?"]);
    let transcript = status.transcript;
    assert_eq!(
        transcript[1..],
        [
            Message::assistant("[GL MODE]: yep, GL mode activated"),
            Message::user("[GL MODE]: is it better now?"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool_call() {
    let harness = Setup::default().build();

    harness.bridge.handle().start().unwrap();
    settle().await;
    harness.voice().tool_call("call-7", "bookTable");
    settle().await;

    assert_eq!(harness.status().mode, SessionMode::LiveVoice);
    assert_eq!(
        harness.log.entries().last().map(String::as_str),
        Some("tool call-7: unsupported tool: bookTable")
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_loop() {
    let harness = Setup::default().build();
    harness.primary.add_reply("[GL MODE]: Sure, for what time?");

    harness.bridge.handle().quick_start().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::DegradedLink);
    assert_eq!(harness.log.entries(), ["listen"]);

    harness.tone("Book a table for two");
    settle().await;
    let status = harness.status();
    assert!(!status.busy);
    assert_eq!(
        status.transcript[1..],
        [
            Message::user("[GL MODE]: Book a table for two"),
            Message::assistant("[GL MODE]: Sure, for what time?"),
        ]
    );
    assert_eq!(harness.captions(), ["Sure, for what time?"]);
    assert_eq!(
        harness.log.entries().last().map(String::as_str),
        Some("tone Inbound: Sure, for what time?")
    );
    assert_eq!(
        harness.primary.requests()[0].messages,
        status.transcript[..2]
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_loop_apology() {
    let harness = Setup::default().build();

    harness.bridge.handle().quick_start().unwrap();
    settle().await;
    harness.tone("Hello?");
    settle().await;

    assert_eq!(harness.captions(), [APOLOGY]);
    assert_eq!(
        harness.log.entries().last(),
        Some(&format!("tone Inbound: {APOLOGY}"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_tone_during_live_voice_switches_mode() {
    let harness = Setup::default().build();
    harness.primary.add_reply("Hi there");

    harness.bridge.handle().start().unwrap();
    settle().await;
    harness.tone("Anyone there?");
    settle().await;

    assert_eq!(harness.status().mode, SessionMode::DegradedLink);
    let entries = harness.log.entries();
    assert_eq!(entries[4], "end voice");
    assert_eq!(
        entries.last().map(String::as_str),
        Some("tone Inbound: Hi there")
    );
}

#[tokio::test(start_paused = true)]
async fn test_tone_while_busy_is_dropped() {
    let harness = Setup {
        reply_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    }
    .build();
    harness.primary.add_reply("One moment");
    harness.primary.add_reply("Another");

    harness.bridge.handle().quick_start().unwrap();
    settle().await;
    harness.tone("first");
    harness.tone("second");
    settle().await;

    let status = harness.status();
    assert!(status.busy);
    assert_eq!(status.transcript.len(), 2);

    sleep(Duration::from_secs(10)).await;
    let status = harness.status();
    assert!(!status.busy);
    assert_eq!(status.transcript.len(), 3);
    assert_eq!(harness.primary.call_count(), 1);
    assert_eq!(harness.primary.max_in_flight(), 1);
    assert_eq!(harness.captions(), ["One moment"]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_persona_only_while_idle() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.quick_start().unwrap();
    handle.switch_persona().unwrap();
    settle().await;
    assert_eq!(harness.status().persona, Persona::Inbound);

    handle.end().unwrap();
    handle.switch_persona().unwrap();
    settle().await;
    let status = harness.status();
    assert_eq!(status.persona, Persona::Outbound);
    assert_eq!(
        status.transcript,
        [Message::system(Persona::Outbound.system_prompt())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_teardown_errors_are_swallowed() {
    let harness = Setup {
        failing_end: true,
        ..Default::default()
    }
    .build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    handle.end().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::Idle);
    assert!(harness.errors().is_empty());

    handle.start().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::LiveVoice);
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_is_kept_but_not_sent() {
    let harness = Setup {
        reply_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    }
    .build();
    harness.primary.add_reply("Too late");
    let handle = harness.bridge.handle();

    handle.quick_start().unwrap();
    settle().await;
    harness.tone("Are you there?");
    settle().await;
    handle.end().unwrap();
    settle().await;
    sleep(Duration::from_secs(10)).await;

    let status = harness.status();
    assert_eq!(status.mode, SessionMode::Idle);
    assert_eq!(
        status.transcript.last(),
        Some(&Message::assistant("[GL MODE]: Too late"))
    );
    assert!(harness.captions().is_empty());
    assert!(!harness.log.entries().iter().any(|e| e.starts_with("tone ")));
}

#[tokio::test(start_paused = true)]
async fn test_restart_ends_previous_session_first() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    handle.start().unwrap();
    settle().await;

    assert_eq!(harness.status().mode, SessionMode::LiveVoice);
    assert_eq!(
        harness.log.entries(),
        [
            "mic",
            "sign agent-in",
            "connect wss://voice.test/agent-in",
            "listen",
            "end voice",
            "stop listening",
            "mic",
            "sign agent-in",
            "connect wss://voice.test/agent-in",
            "listen",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_from_replaced_session_is_ignored() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    let old = harness.voice();
    handle.start().unwrap();
    settle().await;
    let entries = harness.log.entries().len();

    old.disconnected();
    old.message(Speaker::Agent, "still talking");
    old.tool_call("call-old", "lookupReservation");
    settle().await;

    let status = harness.status();
    assert_eq!(status.mode, SessionMode::LiveVoice);
    assert_eq!(status.transcript.len(), 1);
    assert_eq!(harness.log.entries().len(), entries);

    harness.voice().disconnected();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_late_disconnect_after_end_and_start() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    let old = harness.voice();
    handle.end().unwrap();
    settle().await;
    handle.start().unwrap();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::LiveVoice);

    old.disconnected();
    settle().await;
    assert_eq!(harness.status().mode, SessionMode::LiveVoice);
    assert!(harness.log.entries().ends_with(&[
        "connect wss://voice.test/agent-in".to_owned(),
        "listen".to_owned(),
    ]));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_handles() {
    let harness = Setup::default().build();
    let handle = harness.bridge.handle();

    handle.start().unwrap();
    settle().await;
    drop(harness.bridge);
    settle().await;

    assert_eq!(handle.start(), Err(BridgeClosed));
    assert!(harness.log.entries().ends_with(&[
        "end voice".to_owned(),
        "stop listening".to_owned(),
    ]));
}
