//! RUM agent CLI library.
//!
//! This crate provides the offline command-line tooling around `rum-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
