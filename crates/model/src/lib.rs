//! An abstraction layer for hosted chat-completion providers.
//!
//! This crate establishes an unified protocol for the relay to talk to
//! the supported LLM vendors, so that the fallback logic can treat every
//! vendor the same way and swap one for another without modifying the
//! core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;
mod request;
mod response;

pub use error::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
