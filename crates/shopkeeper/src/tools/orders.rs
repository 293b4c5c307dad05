use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopkeeper_core::tool::{Error as ToolError, Tool, ToolResult};

use super::client::{NO_QUERY, StoreApi, item_path};

const ORDERS: &str = "/api/orders";

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListOrdersParameters {
    #[schemars(description = "Maximum number of orders to return, default to 10.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u32>,
    #[schemars(description = "1-based page number.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[schemars(
        description = "Filter by status: pending, processing, on-hold, completed, cancelled, refunded or failed."
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[schemars(description = "Only orders of this customer id.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    customer: Option<u64>,
    #[schemars(description = "Only orders placed after this ISO-8601 date.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<String>,
    #[schemars(description = "Only orders placed before this ISO-8601 date.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OrderIdParameters {
    #[schemars(description = "The order id.")]
    id: u64,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct OrderChanges {
    #[schemars(description = "New status, e.g. completed.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[schemars(description = "A note for the customer.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_note: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateOrderParameters {
    #[schemars(description = "The order id.")]
    id: u64,
    #[schemars(description = "Fields to change.")]
    changes: OrderChanges,
}

/// A tool for listing orders.
pub struct ListOrdersTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl ListOrdersTool {
    /// Creates a new list orders tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(ListOrdersParameters).to_value(),
        }
    }
}

impl Tool for ListOrdersTool {
    type Input = ListOrdersParameters;

    fn name(&self) -> &str {
        "list_orders"
    }

    fn description(&self) -> &str {
        "Lists orders, most recent first, optionally filtered. Returns a JSON array."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let api = self.api.clone();
        async move { api.get(ORDERS, &input).await }
    }
}

/// A tool for fetching one order.
pub struct GetOrderTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl GetOrderTool {
    /// Creates a new get order tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(OrderIdParameters).to_value(),
        }
    }
}

impl Tool for GetOrderTool {
    type Input = OrderIdParameters;

    fn name(&self) -> &str {
        "get_order"
    }

    fn description(&self) -> &str {
        "Returns the details of an order: items, totals, customer and status."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let api = self.api.clone();
        async move { api.get(&item_path(ORDERS, input.id), NO_QUERY).await }
    }
}

/// A tool for updating the status or note of an order.
pub struct UpdateOrderTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl UpdateOrderTool {
    /// Creates a new update order tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(UpdateOrderParameters).to_value(),
        }
    }
}

impl Tool for UpdateOrderTool {
    type Input = UpdateOrderParameters;

    fn name(&self) -> &str {
        "update_order"
    }

    fn description(&self) -> &str {
        "Updates an order and returns it. Ask the user before cancelling or refunding."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let api = self.api.clone();
        async move {
            let changes = &input.changes;
            if changes.status.is_none() && changes.customer_note.is_none() {
                return Err(ToolError::invalid_input()
                    .with_reason("`changes` must set at least one field"));
            }
            api.put(&item_path(ORDERS, input.id), changes).await
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_list_get_update() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/orders"))
            .and(query_param("status", "processing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 9 }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/orders/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 9 })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/orders/9"))
            .and(body_json(json!({ "status": "completed" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": 9, "status": "completed" })),
            )
            .mount(&server)
            .await;
        let api = StoreApi::new(server.uri());

        let input = ListOrdersParameters {
            status: Some("processing".to_owned()),
            ..Default::default()
        };
        let body = ListOrdersTool::new(api.clone()).execute(input).await.unwrap();
        assert_eq!(body, r#"[{"id":9}]"#);

        let body = GetOrderTool::new(api.clone())
            .execute(OrderIdParameters { id: 9 })
            .await
            .unwrap();
        assert_eq!(body, r#"{"id":9}"#);

        let input = UpdateOrderParameters {
            id: 9,
            changes: OrderChanges {
                status: Some("completed".to_owned()),
                ..Default::default()
            },
        };
        let body = UpdateOrderTool::new(api).execute(input).await.unwrap();
        assert!(body.contains("completed"));
    }

    #[tokio::test]
    async fn test_update_without_changes() {
        let tool = UpdateOrderTool::new(StoreApi::new("http://localhost:1"));
        let input = UpdateOrderParameters {
            id: 1,
            changes: OrderChanges::default(),
        };
        let err = tool.execute(input).await.unwrap_err();
        assert_eq!(err.kind(), shopkeeper_core::tool::ErrorKind::InvalidInput);
    }
}
