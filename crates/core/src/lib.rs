//! Core logic of the relay: transcript, provider fallback, and the
//! conversation session bridge.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod error;
pub mod marker;
mod model_client;
mod orchestrator;
mod persona;
pub mod session;
mod transcript;

pub use error::SessionError;
pub use model_client::{DEFAULT_TIMEOUT, ModelClient, ProviderResult};
pub use orchestrator::{APOLOGY, Orchestrator, Reply, ReplyMode, ReplySource};
pub use persona::{AgentDirectory, Persona};
pub use transcript::Transcript;

/// Re-exports of [`tonelink_model`] crate.
pub mod model {
    pub use tonelink_model::*;
}
