//! A terminal client for the relay.
//!
//! Lines typed at the prompt stand in for decoded tone messages; replies
//! are printed as captions together with the tone they would be played on.

#[macro_use]
extern crate tracing;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{AnsiColors, OwoColorize};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tonelink::core::session::{
    BridgeBuilder, SessionMode, SessionStatus, SignedUrlSource, ToneChannel,
};
use tonelink::core::{Persona, SessionError};
use tonelink::{ClientConfig, RelaySession, TextToneLink, Utterance};

enum UiEvent {
    Caption(String),
    Error(SessionError),
}

const BAR_CHAR: &str = "▎";

const HELP: &str = "\
/link     enter link mode, then type messages as the other side
/start    start a live voice session (needs a voice connector, none is bundled)
/end      end the conversation
/persona  switch between the inbound and outbound persona (idle only)
/sign     fetch a signed voice session url for the current persona
/quit     exit";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    debug!("client config: {config:?}");

    let (orchestrator, relay) = config.orchestrator();
    let (link, outbound_rx) = TextToneLink::new();
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();

    let bridge = BridgeBuilder::new(orchestrator, link.clone())
        .with_persona(config.persona)
        .with_agent_directory(config.directory.clone())
        .on_caption({
            let ui_tx = ui_tx.clone();
            move |text| {
                ui_tx.send(UiEvent::Caption(text.to_owned())).ok();
            }
        })
        .on_error({
            let ui_tx = ui_tx.clone();
            move |err| {
                ui_tx.send(UiEvent::Error(err)).ok();
            }
        })
        .build();
    let handle = bridge.handle();

    tokio::spawn(render(bridge.status(), ui_rx, outbound_rx));
    println!("{}", HELP.bright_black());

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let Some(line) = read_line(&mut lines).await else {
            break;
        };
        let sent = match line.trim() {
            "" => continue,
            "/quit" => break,
            "/help" => {
                println!("{}", HELP.bright_black());
                continue;
            }
            "/start" => handle.start(),
            "/link" => handle.quick_start(),
            "/end" => handle.end(),
            "/persona" => handle.switch_persona(),
            "/sign" => {
                let persona = bridge.status().borrow().persona;
                sign(relay.as_ref(), &config, persona).await;
                continue;
            }
            text => {
                if !link.deliver(text) {
                    println!(
                        "{}",
                        "not listening, use /link to enter link mode"
                            .bright_black()
                    );
                }
                continue;
            }
        };
        if sent.is_err() {
            error!("session bridge is gone");
            break;
        }
    }

    bridge.shutdown();
}

async fn render(
    mut status_rx: watch::Receiver<SessionStatus>,
    mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<Utterance>,
) {
    let mut last = status_rx.borrow().clone();
    let mut spinner: Option<ProgressBar> = None;

    loop {
        select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                if status.busy {
                    spinner.get_or_insert_with(thinking_spinner);
                } else if let Some(spinner) = spinner.take() {
                    spinner.finish_and_clear();
                }
                if (status.mode, status.persona) != (last.mode, last.persona)
                {
                    emit(&spinner, describe(&status));
                }
                last = status;
            }
            Some(event) = ui_rx.recv() => {
                let color = persona_color(last.persona);
                let line = match event {
                    UiEvent::Caption(text) => format!(
                        "{}🤖 {}",
                        BAR_CHAR.color(color),
                        text.bright_white()
                    ),
                    UiEvent::Error(err) => format!(
                        "{}⚠️  {}",
                        BAR_CHAR.bright_yellow(),
                        err.yellow()
                    ),
                };
                emit(&spinner, line);
            }
            Some(utterance) = outbound_rx.recv() => {
                let line = format!(
                    "{}♪ [{} channel] {}",
                    BAR_CHAR.bright_black(),
                    channel_name(utterance.channel),
                    utterance.text
                );
                emit(&spinner, line.bright_black().to_string());
            }
        }
    }
}

async fn sign(
    relay: Option<&RelaySession>,
    config: &ClientConfig,
    persona: Persona,
) {
    let Some(relay) = relay else {
        println!("signing goes through the relay, set TONELINK_SERVER_URL");
        return;
    };
    let result = match config.directory.agent_id(persona) {
        Ok(agent_id) => relay.signer().signed_url(agent_id).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(url) => println!("{}🔗 {url}", BAR_CHAR.bright_blue()),
        Err(err) => println!("{}⚠️  {}", BAR_CHAR.bright_yellow(), err.yellow()),
    }
}

fn emit(spinner: &Option<ProgressBar>, line: String) {
    match spinner {
        Some(spinner) => spinner.suspend(|| println!("{line}")),
        None => println!("{line}"),
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        spinner.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    spinner.set_message("🤔 Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn describe(status: &SessionStatus) -> String {
    let mode = match status.mode {
        SessionMode::Idle => "idle",
        SessionMode::LiveVoice => "live voice",
        SessionMode::DegradedLink => "link mode",
    };
    format!(
        "{}{} · {}",
        BAR_CHAR.color(persona_color(status.persona)),
        status.persona.color(persona_color(status.persona)).bold(),
        mode
    )
}

#[inline]
fn persona_color(persona: Persona) -> AnsiColors {
    match persona {
        Persona::Inbound => AnsiColors::BrightMagenta,
        Persona::Outbound => AnsiColors::BrightCyan,
    }
}

#[inline]
fn channel_name(channel: ToneChannel) -> &'static str {
    match channel {
        ToneChannel::Inbound => "inbound",
        ToneChannel::Outbound => "outbound",
    }
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
