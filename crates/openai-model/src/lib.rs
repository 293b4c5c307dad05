//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use reqwest::{Client, StatusCode, header};
use shopkeeper_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ConvertError, ErrorBody};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    pub fn new(config: OpenAIConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|err| {
            warn!("falling back to a default http client: {err}");
            Client::new()
        });
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let resp_fut = self
            .client
            .post(self.config.endpoint())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(status_error(status, &body));
            }

            let completion: ChatCompletion = resp.json().await.map_err(|err| {
                Error::new(format!("invalid completion: {err}"), ErrorKind::Other)
            })?;
            trace!("got completion {}", completion.id);

            proto::convert_completion(completion).map_err(|err| match err {
                ConvertError::NoChoices => {
                    Error::new("completion has no choices", ErrorKind::Other)
                }
                ConvertError::ContentFiltered => Error::new(
                    "completion was filtered",
                    ErrorKind::Moderated,
                ),
            })
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|body| body.error)
        .ok();
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        // Overloaded upstreams are retried like rate limits.
        status if status.is_server_error() => ErrorKind::RateLimitExceeded,
        _ if detail
            .as_ref()
            .and_then(|d| d.code.as_ref())
            .and_then(|code| code.as_str())
            == Some("content_filter") =>
        {
            ErrorKind::Moderated
        }
        _ => ErrorKind::Other,
    };
    let message = match detail {
        Some(detail) => format!("{status}: {}", detail.message),
        None => format!("{status}"),
    };
    Error::new(message, kind)
}
