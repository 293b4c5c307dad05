use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;

use serde_json::json;
use shopkeeper_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ToolCallRequest,
};

#[derive(Debug)]
struct EchoProviderError(ErrorKind);

impl Display for EchoProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for EchoProviderError {}

impl ModelProviderError for EchoProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the last user message, or asks for the `lookup` tool when the
/// message starts with `?`.
struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoProviderError;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let result = match last_user {
            None => Err(EchoProviderError(ErrorKind::Other)),
            Some(text) if text.starts_with('?') => Ok(ModelResponse {
                content: String::new(),
                tool_calls: vec![ToolCallRequest {
                    id: "call:0".to_owned(),
                    name: "lookup".to_owned(),
                    arguments: json!({ "query": &text[1..] }),
                }],
                finish_reason: ModelFinishReason::ToolCalls,
            }),
            Some(text) => Ok(ModelResponse::text(format!("You said {text}"))),
        };
        ready(result)
    }
}

#[tokio::test]
async fn test_completion() {
    let req = ModelRequest {
        messages: vec![
            ModelMessage::System("Be brief.".to_owned()),
            ModelMessage::User("Good morning".to_owned()),
        ],
        tools: vec![],
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    assert_eq!(resp.content, "You said Good morning");
    assert_eq!(resp.finish_reason, ModelFinishReason::Stop);
    assert!(!resp.wants_tools());
}

#[tokio::test]
async fn test_tool_call() {
    let req = ModelRequest {
        messages: vec![ModelMessage::User("?hoodie".to_owned())],
        tools: vec![],
    };
    let resp = EchoProvider.send_request(&req).await.unwrap();
    assert!(resp.wants_tools());
    assert_eq!(resp.tool_calls[0].arguments, json!({ "query": "hoodie" }));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest {
        messages: vec![],
        tools: vec![],
    };
    let err = EchoProvider.send_request(&req).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(!err.kind().is_transient());
}
