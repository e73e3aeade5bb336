//! Command handlers.
//!
//! Handlers are thin wrappers: they take the loaded configuration and the
//! parsed arguments, call into `mediafetch-core` or `mediafetch-download`,
//! and format the result for the terminal. Decisions about queueing, disk
//! space or placement belong to the engine, not here.

pub mod classify;
pub mod config;
pub mod disk;
pub mod fetch;
pub mod sweep;
