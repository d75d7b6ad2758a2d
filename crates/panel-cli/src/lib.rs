//! CLI library components for the panel tool.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;
pub mod summary;
