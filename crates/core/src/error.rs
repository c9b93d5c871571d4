use thiserror::Error;

/// Errors surfaced by the session bridge.
///
/// Permission and configuration errors abort the transition that raised
/// them and leave the session idle. Teardown errors are only logged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The microphone could not be acquired.
    #[error("microphone permission denied")]
    PermissionDenied,
    /// A required setting is absent.
    #[error("{0} is not configured")]
    ConfigurationMissing(String),
    /// A setting is present but its value cannot be used.
    #[error("invalid value {value:?} for {name}")]
    InvalidConfiguration {
        /// The setting.
        name: String,
        /// The rejected value.
        value: String,
    },
    /// A collaborator could not be reached.
    #[error("network failure: {0}")]
    Network(String),
    /// A vendor answered without usable content.
    #[error("{0} returned an empty response")]
    VendorEmptyResponse(String),
    /// Ending the external voice session failed.
    #[error("failed to end the voice session: {0}")]
    Teardown(String),
}
