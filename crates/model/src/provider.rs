use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::Completion;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a hosted chat-completion service.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
///
/// Implementations issue exactly one call per request and never retry;
/// retrying and falling back is up to the caller.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Returns a short name used in logs.
    fn name(&self) -> &str;

    /// Sends a request to the model and waits for the complete reply.
    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Completion, Self::Error>> + Send + 'static;
}
