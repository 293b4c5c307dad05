use std::collections::BTreeMap;

use shopkeeper_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject, ToolResult};

/// An executor that handles tool call requests from the model.
pub struct Executor {
    tools: BTreeMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_owned();
            if tool_map.insert(name, tool).is_some() {
                warn!("duplicate tool, keeping the last one");
            }
        }
        Self { tools: tool_map }
    }

    /// Returns the tool definitions, ordered by name.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Runs the requested calls one after another and renders every outcome
    /// as a result the model can read, in request order.
    pub async fn execute(
        &self,
        requests: &[ToolCallRequest],
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(requests.len());
        for req in requests {
            let result = match self.tools.get(&req.name) {
                Some(tool) => {
                    trace!("running a tool ({}) with args: {:?}", req.id, req.arguments);
                    tool.execute(req.arguments.clone())
                        .instrument(debug_span!("tool", name = %req.name))
                        .await
                }
                None => {
                    warn!("tool not found: {}", req.name);
                    Err(Error::not_found()
                        .with_reason(format!("no tool named {}", req.name)))
                }
            };
            results.push(ToolCallResult {
                id: req.id.clone(),
                content: render_result(result),
            });
        }
        results
    }
}

fn render_result(result: ToolResult) -> String {
    match result {
        Ok(output) => output,
        Err(err) => {
            debug!("tool call failed: {err}");
            format!("Error: {err}")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::tool::{AnyTool, Tool};

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool {
        schema: Value,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                schema: json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"],
                }),
            }
        }
    }

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text back"
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            if input.text.is_empty() {
                return ready(Err(Error::execution_error()));
            }
            ready(Ok(input.text))
        }
    }

    fn request(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn test_definitions() {
        let executor = Executor::with_tools(vec![Box::new(AnyTool(EchoTool::new()))]);
        let definitions = executor.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
        assert_eq!(definitions[0].parameters["required"], json!(["text"]));
        assert!(Executor::with_tools(vec![]).definitions().is_empty());
    }

    #[tokio::test]
    async fn test_execute() {
        let executor = Executor::with_tools(vec![Box::new(AnyTool(EchoTool::new()))]);

        let results = executor
            .execute(&[
                request("tool:1", "echo", json!({ "text": "hello" })),
                request("tool:2", "read_file", json!({})),
                request("tool:3", "echo", json!({ "txt": "typo" })),
                request("tool:4", "echo", json!({ "text": "" })),
            ])
            .await;

        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["tool:1", "tool:2", "tool:3", "tool:4"]);
        assert_eq!(results[0].content, "hello");
        assert_eq!(results[1].content, "Error: Not found: no tool named read_file");
        assert!(results[2].content.starts_with("Error: Invalid input: "));
        assert_eq!(results[3].content, "Error: Execution error");
    }
}
