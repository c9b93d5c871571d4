use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never reached the provider, or the connection broke.
    Network,
    /// The provider answered with a non-success status.
    Status,
    /// The provider answered with a payload we cannot understand.
    MalformedPayload,
    /// The provider answered successfully but generated no text.
    EmptyContent,
    /// The provider did not answer in time.
    Timeout,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "Network failure"),
            ErrorKind::Status => write!(f, "Unexpected status"),
            ErrorKind::MalformedPayload => write!(f, "Malformed payload"),
            ErrorKind::EmptyContent => write!(f, "Empty response"),
            ErrorKind::Timeout => write!(f, "Timed out"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}
