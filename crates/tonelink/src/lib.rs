//! A terminal relay client: runs the conversation session bridge with
//! replies from the relay server (or straight from the vendors) and a text
//! stand-in for the tone link.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the relay into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod relay;
mod text_link;

pub use config::{Backend, ClientConfig};
pub use relay::{Error, RelaySession, RelaySigner, RouteProvider};
pub use text_link::{TextToneLink, Utterance};

/// Re-exports of [`tonelink_core`] crate.
pub mod core {
    pub use tonelink_core::*;
}
