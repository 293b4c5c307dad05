//! A provider-neutral protocol between the agent and language models.
//!
//! The agent core only speaks the types in this crate, so a model backend
//! can be swapped without touching conversation handling or tool calling.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
