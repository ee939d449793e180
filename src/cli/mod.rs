//! Command-line interface

pub mod args;
pub mod commands;
mod environment;

pub use args::{Cli, Commands};
pub use environment::Environment;
