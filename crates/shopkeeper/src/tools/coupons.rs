use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopkeeper_core::tool::{Tool, ToolResult};

use super::client::StoreApi;

const COUPONS: &str = "/api/coupons";

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListCouponsParameters {
    #[schemars(description = "Maximum number of coupons to return, default to 10.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u32>,
    #[schemars(description = "1-based page number.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[schemars(description = "Only the coupon with this code.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percent,
    FixedCart,
    FixedProduct,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateCouponParameters {
    #[schemars(description = "The code customers enter, e.g. SUMMER20.")]
    code: String,
    #[schemars(description = "How `amount` is applied.")]
    discount_type: DiscountType,
    #[schemars(description = "Discount amount as a decimal string, e.g. \"20\".")]
    amount: String,
    #[schemars(description = "Expiry date in ISO-8601, e.g. 2025-12-31.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    date_expires: Option<String>,
    #[schemars(description = "How many times the coupon can be used in total.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    usage_limit: Option<u32>,
    #[schemars(description = "Whether the coupon can not be combined with others.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    individual_use: Option<bool>,
    #[schemars(description = "Minimum order total as a decimal string.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    minimum_amount: Option<String>,
    #[schemars(description = "An internal description.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// A tool for listing coupons.
pub struct ListCouponsTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl ListCouponsTool {
    /// Creates a new list coupons tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(ListCouponsParameters).to_value(),
        }
    }
}

impl Tool for ListCouponsTool {
    type Input = ListCouponsParameters;

    fn name(&self) -> &str {
        "list_coupons"
    }

    fn description(&self) -> &str {
        "Lists discount coupons. Returns a JSON array."
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
        async move { api.get(COUPONS, &input).await }
    }
}

/// A tool for creating coupons.
pub struct CreateCouponTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl CreateCouponTool {
    /// Creates a new create coupon tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(CreateCouponParameters).to_value(),
        }
    }
}

impl Tool for CreateCouponTool {
    type Input = CreateCouponParameters;

    fn name(&self) -> &str {
        "create_coupon"
    }

    fn description(&self) -> &str {
        r#"
Creates a discount coupon and returns it.
For "20% off" use discount_type `percent` with amount "20"; for "$5 off the cart" use `fixed_cart` with amount "5"."#
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
        async move { api.post(COUPONS, &input).await }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_discount_type_schema() {
        let tool = CreateCouponTool::new(StoreApi::new("http://localhost"));
        let text = tool.parameter_schema().to_string();
        for variant in ["percent", "fixed_cart", "fixed_product"] {
            assert!(text.contains(variant), "{variant} missing from {text}");
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/coupons"))
            .and(body_json(json!({
                "code": "SUMMER20",
                "discount_type": "percent",
                "amount": "20",
                "date_expires": "2025-08-31",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 5 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/coupons"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 5 }])))
            .mount(&server)
            .await;
        let api = StoreApi::new(server.uri());

        let input: CreateCouponParameters = serde_json::from_value(json!({
            "code": "SUMMER20",
            "discount_type": "percent",
            "amount": "20",
            "date_expires": "2025-08-31",
        }))
        .unwrap();
        let body = CreateCouponTool::new(api.clone()).execute(input).await.unwrap();
        assert_eq!(body, r#"{"id":5}"#);

        let body = ListCouponsTool::new(api)
            .execute(ListCouponsParameters::default())
            .await
            .unwrap();
        assert_eq!(body, r#"[{"id":5}]"#);
    }

    #[test]
    fn test_rejects_unknown_discount_type() {
        let result = serde_json::from_value::<CreateCouponParameters>(json!({
            "code": "X",
            "discount_type": "bogus",
            "amount": "1",
        }));
        assert!(result.is_err());
    }
}
