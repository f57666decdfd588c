mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod server;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<String>,
    pub state: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
    };
    log::trace!("verbosity {}", ctx.verbose);

    match cli.command {
        Command::Plan(args) => commands::lifecycle::plan(&ctx, args),
        Command::Apply(args) => commands::lifecycle::apply(&ctx, args),
        Command::Refresh => commands::lifecycle::refresh(&ctx),
        Command::Destroy(args) => commands::lifecycle::destroy(&ctx, args),
        Command::Import(args) => commands::import::run(&ctx, args),
        Command::ServerInfo => commands::server_info::run(&ctx),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sqlconverge", &mut io::stdout());
            Ok(())
        }
    }
}
