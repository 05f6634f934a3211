//! Command-line tooling over the file store.

pub mod cli;

pub use cli::{BucketCommands, Cli, CliContext, Commands};
