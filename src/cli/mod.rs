//! CLI module for hookline.
//!
//! Argument parsing for all subcommands and the event model `replay` reads.

pub mod args;
pub mod replay;

pub use args::{Cli, Command};
