//! A store-management assistant that assembles the conversation core, an
//! OpenAI model provider and tools talking to the store tool server.
//!
//! The crate includes a CLI demo. It can also be used as a library to run the
//! assistant inside your own service.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod app;
pub mod config;
pub mod logging;
pub mod tools;

pub use app::{App, AppBuilder};

/// Re-exports of [`shopkeeper_core`] crate.
pub mod core {
    pub use shopkeeper_core::*;
}
