//! The conversation session bridge.
//!
//! [`SessionMachine`] holds the conversation state and decides what to do
//! for every event; [`Bridge`] runs it on a background task and carries out
//! its commands against the external collaborators.

mod bridge;
mod external;
mod machine;

#[cfg(test)]
mod tests;

pub use bridge::*;
pub use external::*;
pub use machine::*;
