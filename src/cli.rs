use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "sqlconverge")]
#[command(version)]
#[command(
    about = "Converge SQL Server databases, logins, users and roles to a declared state",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Manifest file (default: ./converge.toml, then ~/.config/sqlconverge/converge.toml)
    #[arg(short, long, global = true, env = "SQLCONVERGE_CONFIG")]
    pub config: Option<String>,

    /// State file (default: converge.state.toml next to the manifest)
    #[arg(long, global = true)]
    pub state: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge the server onto the manifest
    Apply(ApplyArgs),

    /// Re-read tracked resources and drop the ones that vanished
    Refresh,

    /// Delete every tracked resource
    Destroy(DestroyArgs),

    /// Start tracking an existing server object
    Import(ImportArgs),

    /// Show the server version
    ServerInfo,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct PlanArgs {
    /// Only plan resources matching kind or kind.label
    #[arg(short, long)]
    pub target: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only apply resources matching kind or kind.label
    #[arg(short, long)]
    pub target: Option<String>,

    /// Dry run - show the plan without changing anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources applied in parallel within a stage
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Only destroy resources matching kind or kind.label
    #[arg(short, long)]
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Address to store the resource under, e.g. login.app
    pub address: String,

    /// Server-side identifier, e.g. app, app.bob or app.readers.bob
    pub identifier: String,
}
