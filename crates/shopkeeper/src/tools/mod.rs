//! Tools that let the model manage the store through the tool server.

mod client;
mod coupons;
mod orders;
mod products;

pub use client::StoreApi;
pub use coupons::{CreateCouponTool, ListCouponsTool};
pub use orders::{GetOrderTool, ListOrdersTool, UpdateOrderTool};
pub use products::{
    CreateProductTool, GetProductTool, ListProductsTool, UpdateProductTool,
};
