//! Commit and pull request messages from staged diffs, written by an LLM and
//! refined interactively.

pub mod agent;
pub mod cli_args;
pub mod config;
pub mod editor;
pub mod error;
pub mod generate;
pub mod git;
pub mod interactive;
pub mod llm;
pub mod logging;
pub mod revision;
pub mod setup;

pub use error::{Error, Result};
