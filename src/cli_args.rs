use clap::{ArgAction, Parser, Subcommand};

/// CLI options
#[derive(Parser, Debug, Default)]
#[command(
    name = "commitsmith",
    version,
    about = "LLM-assisted Git commit and pull request message generator"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Backend to use: openai or ollama
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model id to use (e.g. gpt-4o-mini)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key (otherwise uses OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of the backend (OpenAI-compatible or Ollama)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Two-letter language code for generated text
    #[arg(short, long, global = true)]
    pub locale: Option<String>,

    /// Maximum subject length in characters
    #[arg(long, global = true)]
    pub max_length: Option<usize>,

    /// Commit style: "conventional" or "" for free-form
    #[arg(short = 't', long = "type", global = true)]
    pub commit_type: Option<String>,

    /// Number of candidates to request (1-5)
    #[arg(short, long, global = true)]
    pub generate: Option<usize>,

    /// Lines of context in the diff sent to the model
    #[arg(long, global = true)]
    pub context_lines: Option<u32>,

    /// Pathspec patterns to leave out of the diff
    #[arg(short = 'x', long, global = true)]
    pub exclude: Vec<String>,

    /// Stream the subject and body as they are generated
    #[arg(long, global = true)]
    pub stream: bool,

    /// Cap the review at 10 rounds
    #[arg(long, global = true)]
    pub bounded: bool,

    /// Show the result without committing or opening a PR
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Stage all changes before generating
    #[arg(short, long)]
    pub all: bool,

    /// Subcommand (e.g. 'pr')
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `commitsmith pr main`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a pull request title and description for the current branch
    Pr {
        /// Base branch to compare against (e.g. main or develop)
        base: String,
    },

    /// List the chat models the backend offers, or check one id
    Models {
        /// Model id to look up
        id: Option<String>,
    },
}
