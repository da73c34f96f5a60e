//! # Picklist Library
//!
//! Async runtime around `picklist-core`: fetchers, the dropdown driver, the
//! fixture backend and the CLI commands.
//!
//! The binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod script;
pub mod server;

// Re-export picklist_core for convenience
pub use picklist_core;
