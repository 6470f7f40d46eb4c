mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Declarative front-end build orchestration: tasks, pipelines, dev server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: sluice.toml in the working directory)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    cwd: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, action, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks and their prerequisites (default: "default")
    Run { tasks: Vec<String> },
    /// List tasks with prerequisites and action kinds
    List {
        #[arg(long, action)]
        json: bool,
    },
    /// Check the task graph for unknown prerequisites and cycles
    Check,
    /// Write a starter sluice.toml
    Init {
        #[arg(long, action)]
        force: bool,
    },
    /// Any other word is taken as a task name
    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if let Some(dir) = &cli.cwd {
        std::env::set_current_dir(dir)
            .map_err(|e| anyhow::anyhow!("Cannot change directory to {}: {}", dir.display(), e))?;
    }

    let config_path = cli
        .file
        .clone()
        .unwrap_or_else(|| PathBuf::from(sluice_core::CONFIG_FILE));

    match cli.command {
        None => commands::cmd_run(&config_path, Vec::new())?,
        Some(Commands::Run { tasks }) => commands::cmd_run(&config_path, tasks)?,
        Some(Commands::External(tasks)) => commands::cmd_run(&config_path, tasks)?,
        Some(Commands::List { json }) => commands::cmd_list(&config_path, json)?,
        Some(Commands::Check) => commands::cmd_check(&config_path)?,
        Some(Commands::Init { force }) => commands::cmd_init(&config_path, force)?,
    }

    Ok(())
}
