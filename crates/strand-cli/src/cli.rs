use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strand",
    about = "Strand: link-addressed content graphs for threaded listings",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (defaults to ./strand.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory of JSON fixtures served as the remote API
    #[arg(long, global = true)]
    pub fixtures: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load a page and print its graph
    Load(LoadArgs),
    /// Execute an encoded load-more continuation
    Expand(ExpandArgs),
    /// Show how a path routes
    Route(RouteArgs),
    /// Derive the link token of a base given as JSON
    Token(TokenArgs),
}

#[derive(Args)]
pub struct LoadArgs {
    /// Page path, e.g. /r/rust/comments/abc
    pub path: String,
    /// Execute up to N load-more continuations found on the page
    #[arg(long, default_value = "0")]
    pub follow: usize,
    /// Deepest level printed
    #[arg(long, default_value = "8")]
    pub depth: usize,
    /// Check every node's URL against its token
    #[arg(long)]
    pub validate: bool,
}

#[derive(Args)]
pub struct ExpandArgs {
    /// Opaque continuation as printed by `load`
    pub opaque: String,
    #[arg(long, default_value = "8")]
    pub depth: usize,
}

#[derive(Args)]
pub struct RouteArgs {
    pub path: String,
}

#[derive(Args)]
pub struct TokenArgs {
    /// Base as JSON, e.g. '{"subreddit_about": {"subreddit": "rust"}}'
    pub base: String,
}
