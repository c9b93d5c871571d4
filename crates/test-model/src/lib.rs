//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tonelink_model::{
    Completion, ErrorKind, Message, ModelProvider, ModelProviderError,
    ModelRequest,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<PresetOutcome>,
    requests: Vec<ModelRequest>,
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlightGuard(Arc<Counters>);

impl InFlightGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A local fake model for testing purpose.
///
/// Every request pops the next [`PresetOutcome`] from the script. If the
/// script runs out, the request fails. Clones share the script and the
/// request log, so a test can keep one clone around for inspection after
/// handing the other to the code under test.
///
/// # Note
///
/// This type is not optimized for production use, every request is cloned
/// into the log. You should only use it for testing.
#[derive(Clone)]
pub struct TestModelProvider {
    name: String,
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
    delay: Option<Duration>,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self::named("test")
    }
}

impl TestModelProvider {
    #[inline]
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            script: Default::default(),
            counters: Default::default(),
            delay: None,
        }
    }

    #[inline]
    pub fn with_outcomes(
        name: &str,
        outcomes: impl IntoIterator<Item = PresetOutcome>,
    ) -> Self {
        let provider = Self::named(name);
        for outcome in outcomes {
            provider.add_outcome(outcome);
        }
        provider
    }

    #[inline]
    pub fn add_outcome(&self, outcome: PresetOutcome) {
        self.lock().outcomes.push_back(outcome);
    }

    #[inline]
    pub fn add_reply<S: Into<String>>(&self, text: S) {
        self.add_outcome(PresetOutcome::reply(text));
    }

    #[inline]
    pub fn add_failure(&self) {
        self.add_outcome(PresetOutcome::Failure);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    #[inline]
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Returns the highest number of requests that were pending at once.
    #[inline]
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn name(&self) -> &str {
        &self.name
    }

    fn complete(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Completion, Self::Error>> + Send + 'static
    {
        let outcome = {
            let mut script = self.lock();
            script.requests.push(req.clone());
            script.outcomes.pop_front()
        };
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        let counters = Arc::clone(&self.counters);

        async move {
            let _guard = InFlightGuard::enter(counters);
            sleep(delay).await;
            match outcome {
                Some(PresetOutcome::Reply(text)) => Ok(Completion {
                    message: Some(Message::assistant(text.clone())),
                    raw: json!({ "role": "assistant", "content": text }),
                }),
                Some(PresetOutcome::Empty) => Ok(Completion {
                    message: None,
                    raw: json!({ "role": "assistant", "content": null }),
                }),
                Some(PresetOutcome::Failure) => Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::Status,
                }),
                Some(PresetOutcome::Hang) => pending().await,
                None => Err(Error {
                    message: "no enough steps",
                    kind: ErrorKind::Other,
                }),
            }
        }
    }
}
