//! Store operations the model can invoke while answering.

mod error;
mod executor;

use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde_json::Value;
use shopkeeper_model::ModelTool;

pub use error::{Error, ErrorKind};
pub(crate) use executor::Executor;

/// Text handed back to the model, or the reason the call failed.
pub type ToolResult = Result<String, Error>;

/// An operation exposed to the model under a fixed name.
///
/// A tool holds only what it was built with (typically a REST client for the
/// store) and never changes afterwards. Each call clones what it needs into
/// the returned future, so calls can run while the tool is borrowed
/// elsewhere.
pub trait Tool: Send + Sync + 'static {
    /// Arguments the model must supply, decoded from the call's JSON.
    type Input: DeserializeOwned;

    /// Name the model uses to call the tool. Unique within an agent.
    fn name(&self) -> &str;

    /// Tells the model when and how to use the tool.
    fn description(&self) -> &str;

    /// JSON schema of [`Input`](Tool::Input).
    fn parameter_schema(&self) -> &Value;

    /// Runs the tool.
    ///
    /// The future must not borrow `self`. Dropping it abandons the call.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

pub(crate) type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// Object-safe face of a [`Tool`], taking raw JSON arguments.
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ModelTool;

    fn execute(&self, arguments: Value) -> BoxedToolFuture;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    fn definition(&self) -> ModelTool {
        ModelTool {
            name: self.0.name().to_owned(),
            description: self.0.description().to_owned(),
            parameters: self.0.parameter_schema().clone(),
        }
    }

    fn execute(&self, arguments: Value) -> BoxedToolFuture {
        match serde_json::from_value::<T::Input>(arguments) {
            Ok(input) => Box::pin(self.0.execute(input)),
            Err(err) => {
                let err = Error::invalid_input()
                    .with_reason(format!("bad arguments for {}: {err}", self.0.name()));
                Box::pin(std::future::ready(Err(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Deserialize)]
    struct Restock {
        sku: String,
        quantity: u32,
    }

    struct RestockTool {
        schema: Value,
    }

    impl Tool for RestockTool {
        type Input = Restock;

        fn name(&self) -> &str {
            "restock"
        }

        fn description(&self) -> &str {
            "Adds units to a product's stock."
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        #[allow(clippy::manual_async_fn)]
        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move { Ok(format!("{} +{}", input.sku, input.quantity)) }
        }
    }

    fn restock_tool() -> AnyTool<RestockTool> {
        AnyTool(RestockTool {
            schema: json!({ "type": "object" }),
        })
    }

    #[test]
    fn test_definition() {
        let definition = restock_tool().definition();
        assert_eq!(definition.name, "restock");
        assert_eq!(definition.description, "Adds units to a product's stock.");
        assert_eq!(definition.parameters, json!({ "type": "object" }));
    }

    #[tokio::test]
    async fn test_execute_decodes_arguments() {
        let output = restock_tool()
            .execute(json!({ "sku": "MUG-1", "quantity": 12 }))
            .await
            .unwrap();
        assert_eq!(output, "MUG-1 +12");
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_arguments() {
        let err = restock_tool()
            .execute(json!({ "sku": "MUG-1", "quantity": "many" }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.reason().starts_with("bad arguments for restock: "), "{err}");
    }
}
