use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// The configuration selecting the system prompt and the voice agent.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// The hotel receptionist answering the call.
    #[default]
    Inbound,
    /// The assistant calling hotels on behalf of a client.
    Outbound,
}

impl Persona {
    /// Returns the system prompt for this persona.
    pub fn system_prompt(self) -> &'static str {
        match self {
            Persona::Inbound => include_str!("persona/inbound.md").trim_end(),
            Persona::Outbound => include_str!("persona/outbound.md").trim_end(),
        }
    }

    /// Finds the persona whose system prompt opens the conversation.
    pub fn from_system_prompt(prompt: &str) -> Option<Self> {
        [Persona::Inbound, Persona::Outbound]
            .into_iter()
            .find(|persona| persona.system_prompt() == prompt.trim_end())
    }

    /// Returns the other persona.
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Persona::Inbound => Persona::Outbound,
            Persona::Outbound => Persona::Inbound,
        }
    }

    /// Returns the wire name, as used by the `agentType` field.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Inbound => "inbound",
            Persona::Outbound => "outbound",
        }
    }
}

impl Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" => Ok(Persona::Inbound),
            "outbound" => Ok(Persona::Outbound),
            other => Err(format!("unknown persona: {other}")),
        }
    }
}

/// Maps personas to the external voice agent identities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentDirectory {
    inbound: Option<String>,
    outbound: Option<String>,
}

impl AgentDirectory {
    /// Environment variable holding the inbound agent id.
    pub const INBOUND_VAR: &'static str = "TONELINK_INBOUND_AGENT_ID";
    /// Environment variable holding the outbound agent id.
    pub const OUTBOUND_VAR: &'static str = "TONELINK_OUTBOUND_AGENT_ID";

    /// Creates a directory from explicit ids. Blank ids count as absent.
    pub fn new(inbound: Option<String>, outbound: Option<String>) -> Self {
        let non_blank = |id: Option<String>| id.filter(|v| !v.trim().is_empty());
        Self {
            inbound: non_blank(inbound),
            outbound: non_blank(outbound),
        }
    }

    /// Reads the ids through `lookup`, usually [`std::env::var`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(lookup(Self::INBOUND_VAR), lookup(Self::OUTBOUND_VAR))
    }

    /// Reads the ids from the process environment.
    #[inline]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Returns the agent id for the persona.
    pub fn agent_id(&self, persona: Persona) -> Result<&str, SessionError> {
        let (id, var) = match persona {
            Persona::Inbound => (&self.inbound, Self::INBOUND_VAR),
            Persona::Outbound => (&self.outbound, Self::OUTBOUND_VAR),
        };
        id.as_deref()
            .ok_or_else(|| SessionError::ConfigurationMissing(var.to_owned()))
    }
}
