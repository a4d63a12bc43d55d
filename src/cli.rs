use clap::{Parser, Subcommand};

pub fn get_version() -> &'static str {
    const BASE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // If there's a git tag at HEAD, use just the tag (release build)
    if let Some(tag) = option_env!("VENDORHUB_GIT_TAG") {
        return tag;
    }

    // Not on a tag - include commit hash and branch (dev build)
    let commit = option_env!("VENDORHUB_GIT_COMMIT").unwrap_or("unknown");
    let branch = option_env!("VENDORHUB_GIT_BRANCH").unwrap_or("unknown");

    // Leaked once at startup
    let version = format!("v{}-{} ({})", BASE_VERSION, commit, branch);
    Box::leak(version.into_boxed_str())
}

#[derive(Parser, Debug)]
#[command(name = "vendorhub")]
#[command(about = "A self-updating launcher keeping its vendor tools installed")]
#[command(version = get_version(), propagate_version = true)]
pub struct Cli {
    /// Log debug messages to the terminal
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log every environment variable at startup
    #[arg(long, global = true)]
    pub log_environ: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_coloring: bool,

    /// Restart once into the local install even when already running from it
    #[arg(long)]
    pub force_local_restart: bool,

    #[arg(long = "restarted__", hide = true, default_value_t = 0)]
    pub restarted: u32,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Remove the hub, its vendors and its data from this machine
    Uninstall,

    /// Show version and installation details
    About,

    /// Run a program once the hub is up to date
    #[command(external_subcommand)]
    External(Vec<String>),
}
