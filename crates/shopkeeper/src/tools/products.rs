use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopkeeper_core::tool::{Error as ToolError, Tool, ToolResult};

use super::client::{NO_QUERY, StoreApi, item_path};

const PRODUCTS: &str = "/api/products";

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListProductsParameters {
    #[schemars(description = "Maximum number of products to return, default to 10.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u32>,
    #[schemars(description = "1-based page number.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[schemars(description = "Only products whose name or description match.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<String>,
    #[schemars(description = "Filter by status: draft, pending, private or publish.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[schemars(description = "Filter by SKU.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProductIdParameters {
    #[schemars(description = "The product id.")]
    id: u64,
}

/// Product fields that can be set on creation or update.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ProductFields {
    #[schemars(description = "Product name.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[schemars(description = "Product type: simple, grouped, external or variable.")]
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[schemars(description = "Regular price as a decimal string, e.g. \"25.00\".")]
    #[serde(skip_serializing_if = "Option::is_none")]
    regular_price: Option<String>,
    #[schemars(description = "Sale price as a decimal string.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    sale_price: Option<String>,
    #[schemars(description = "Full description, HTML allowed.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[schemars(description = "Short description, HTML allowed.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    short_description: Option<String>,
    #[schemars(description = "Stock keeping unit.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
    #[schemars(description = "Whether stock is tracked for this product.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    manage_stock: Option<bool>,
    #[schemars(description = "Units in stock, requires `manage_stock`.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    stock_quantity: Option<i64>,
    #[schemars(description = "Status: draft, pending, private or publish.")]
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProductParameters {
    #[schemars(description = "The product id.")]
    id: u64,
    #[schemars(description = "Fields to change, omitted fields stay untouched.")]
    changes: ProductFields,
}

/// A tool for listing products.
pub struct ListProductsTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl ListProductsTool {
    /// Creates a new list products tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(ListProductsParameters).to_value(),
        }
    }
}

impl Tool for ListProductsTool {
    type Input = ListProductsParameters;

    fn name(&self) -> &str {
        "list_products"
    }

    fn description(&self) -> &str {
        "Lists products in the store, optionally filtered. Returns a JSON array."
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
        async move { api.get(PRODUCTS, &input).await }
    }
}

/// A tool for fetching one product.
pub struct GetProductTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl GetProductTool {
    /// Creates a new get product tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(ProductIdParameters).to_value(),
        }
    }
}

impl Tool for GetProductTool {
    type Input = ProductIdParameters;

    fn name(&self) -> &str {
        "get_product"
    }

    fn description(&self) -> &str {
        "Returns the details of a product, including price and stock."
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
        async move { api.get(&item_path(PRODUCTS, input.id), NO_QUERY).await }
    }
}

/// A tool for creating products.
pub struct CreateProductTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl CreateProductTool {
    /// Creates a new create product tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(ProductFields).to_value(),
        }
    }
}

impl Tool for CreateProductTool {
    type Input = ProductFields;

    fn name(&self) -> &str {
        "create_product"
    }

    fn description(&self) -> &str {
        r#"
Creates a product and returns it. `name` is required.
Confirm price and stock details with the user before creating."#
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
            if input.name.as_deref().is_none_or(str::is_empty) {
                return Err(ToolError::invalid_input()
                    .with_reason("`name` is required"));
            }
            api.post(PRODUCTS, &input).await
        }
    }
}

/// A tool for updating products, including their stock.
pub struct UpdateProductTool {
    api: StoreApi,
    parameter_schema: Value,
}

impl UpdateProductTool {
    /// Creates a new update product tool.
    #[inline]
    pub fn new(api: StoreApi) -> Self {
        Self {
            api,
            parameter_schema: schema_for!(UpdateProductParameters).to_value(),
        }
    }
}

impl Tool for UpdateProductTool {
    type Input = UpdateProductParameters;

    fn name(&self) -> &str {
        "update_product"
    }

    fn description(&self) -> &str {
        r#"
Updates a product and returns it. Only the fields in `changes` are modified.
To change stock, set `manage_stock` to true and `stock_quantity` to the new level."#
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
        async move { api.put(&item_path(PRODUCTS, input.id), &input.changes).await }
    }
}
