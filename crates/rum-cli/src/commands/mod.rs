//! CLI subcommand implementations.

pub mod compute;
pub mod config;
pub mod replay;
pub mod track;
