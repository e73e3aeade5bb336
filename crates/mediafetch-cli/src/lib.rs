//! Command-line front end for mediafetch.
//!
//! Wires the download engine to concrete adapters (HTTP and local-file
//! sources, a Kodi JSON-RPC player) and renders transfers in the terminal.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tokio_test as _;

// Used by the main.rs binary
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod kodi;
pub mod parser;
pub mod presentation;
pub mod sources;

pub use bootstrap::{CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
