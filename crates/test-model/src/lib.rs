//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use shopkeeper_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

struct Step {
    preset: PresetResponse,
    attempts: AtomicU64,
}

#[derive(Default)]
struct Script {
    steps: Vec<Step>,
    cursor: AtomicUsize,
    requests: Mutex<Vec<ModelRequest>>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// model should respond to each request in turn. A step with pending
/// failures answers with a rate limit error and stays current. If there
/// are no enough steps in the script, an error will be returned.
///
/// Clones share the same script and cursor.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Script>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Creates a provider answering with the given presets in order.
    pub fn with_responses(presets: impl IntoIterator<Item = PresetResponse>) -> Self {
        let steps = presets
            .into_iter()
            .map(|preset| Step {
                preset,
                attempts: AtomicU64::new(0),
            })
            .collect();
        Self {
            script: Arc::new(Script {
                steps,
                ..Default::default()
            }),
            delay: None,
        }
    }

    /// Delays every response by `duration`.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns the requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.script
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many scripted responses have been delivered.
    #[inline]
    pub fn delivered(&self) -> usize {
        self.script.cursor.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<ModelResponse, Error> {
        let script = &self.script;
        let idx = script.cursor.load(Ordering::SeqCst);
        let Some(step) = script.steps.get(idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        let attempt = step.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match step.preset.failures {
            Some(0) => {
                return Err(Error {
                    message: "scripted permanent failure",
                    kind: ErrorKind::Other,
                });
            }
            Some(failures) if attempt <= failures => {
                return Err(Error {
                    message: "scripted transient failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        script.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(step.preset.to_response())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        self.script
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req.clone());
        let result = self.next_response();
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use shopkeeper_model::{
        ModelFinishReason, ModelMessage, ModelTool, ToolCallRequest,
    };
    use serde_json::json;

    use super::*;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            tools: vec![ModelTool {
                name: "list_orders".to_owned(),
                description: "Lists orders".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let provider = TestModelProvider::with_responses([
            PresetResponse::with_tool_calls([ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "list_orders".to_owned(),
                arguments: json!({ "status": "processing" }),
            }]),
            PresetResponse::text("You have two open orders."),
        ]);

        let resp = provider.send_request(&request("Orders?")).await.unwrap();
        assert_eq!(resp.finish_reason, ModelFinishReason::ToolCalls);
        assert_eq!(resp.tool_calls[0].name, "list_orders");

        let resp = provider.send_request(&request("Orders?")).await.unwrap();
        assert_eq!(resp.content, "You have two open orders.");
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.delivered(), 2);

        let err = provider.send_request(&request("More")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_failures() {
        let provider = TestModelProvider::with_responses([
            PresetResponse::text("finally").with_failures(2),
        ]);
        for _ in 0..2 {
            let err = provider.send_request(&request("Hi")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&request("Hi")).await.unwrap();
        assert_eq!(resp.content, "finally");

        let provider = TestModelProvider::with_responses([
            PresetResponse::text("never").with_failures(0),
        ]);
        for _ in 0..3 {
            let err = provider.send_request(&request("Hi")).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Other);
        }
        assert_eq!(provider.delivered(), 0);
    }
}
