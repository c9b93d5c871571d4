use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tonelink_model::{
    Completion, ErrorKind, Message, ModelProvider, ModelProviderError,
    ModelRequest, Role,
};
use tracing::Instrument;

type CompleteResult = Result<Completion, Box<dyn ModelProviderError>>;
type BoxedCompleteFuture = Pin<Box<dyn Future<Output = CompleteResult> + Send>>;
type HandlerFn = Arc<dyn Fn(ModelRequest) -> BoxedCompleteFuture + Send + Sync>;

/// Default upper bound for a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A wrapper around a model provider that provides a type-erased,
/// infallible interface for the other modules.
///
/// Every failure mode of the provider, including running past the
/// timeout, is folded into a [`ProviderResult`] with `ok == false`.
#[derive(Clone)]
pub struct ModelClient {
    name: Arc<str>,
    handler_fn: HandlerFn,
    timeout: Duration,
}

impl ModelClient {
    /// Wraps the provider with the default timeout.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let name: Arc<str> = Arc::from(provider.name());
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.complete(&req);
            Box::pin(async move {
                fut.await
                    .map_err(|err| Box::new(err) as Box<dyn ModelProviderError>)
            }) as BoxedCompleteFuture
        });
        Self {
            name,
            handler_fn,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the per-call timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the provider name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the provider for the next message of the conversation.
    ///
    /// The conversation must be non-empty and start with a system message,
    /// otherwise the provider is not called at all.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future drops the pending
    /// provider request.
    pub async fn complete(&self, messages: &[Message]) -> ProviderResult {
        if messages.first().map(Message::role) != Some(Role::System) {
            warn!("{}: conversation does not start with a system message", self.name);
            return ProviderResult::failed(ErrorKind::Other);
        }

        let req = ModelRequest::new(messages);
        let fut = (self.handler_fn)(req);
        let span = trace_span!("model client req", provider = %self.name);
        let result = async {
            trace!("sending {} messages", messages.len());
            timeout(self.timeout, fut).await
        }
        .instrument(span)
        .await;

        match result {
            Ok(Ok(completion)) => {
                let result = ProviderResult::from_completion(completion);
                if !result.has_content() {
                    warn!("{}: empty completion", self.name);
                }
                result
            }
            Ok(Err(err)) => {
                warn!("{}: request failed: {err}", self.name);
                ProviderResult::failed(err.kind())
            }
            Err(_) => {
                warn!("{}: no response within {:?}", self.name, self.timeout);
                ProviderResult::failed(ErrorKind::Timeout)
            }
        }
    }
}

/// The outcome of one provider call.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderResult {
    /// Whether the call itself succeeded.
    pub ok: bool,
    /// The generated text, if any.
    pub content: Option<String>,
    /// The vendor payload, `Value::Null` for failures.
    pub raw: Value,
    /// Why the call failed, if it did.
    pub error: Option<ErrorKind>,
}

impl ProviderResult {
    fn from_completion(completion: Completion) -> Self {
        let content = completion.text().map(ToOwned::to_owned);
        Self {
            ok: true,
            content,
            raw: completion.raw,
            error: None,
        }
    }

    fn failed(kind: ErrorKind) -> Self {
        Self {
            ok: false,
            content: None,
            raw: Value::Null,
            error: Some(kind),
        }
    }

    /// Returns the content if the call succeeded with non-blank text.
    pub fn text(&self) -> Option<&str> {
        if !self.ok {
            return None;
        }
        self.content.as_deref().filter(|text| !text.trim().is_empty())
    }

    #[inline]
    fn has_content(&self) -> bool {
        self.text().is_some()
    }
}
