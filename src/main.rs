// src/main.rs

//! eosbot: EOS portal chat attendance bot CLI

use clap::{Parser, Subcommand};

use eosbot::engine::{run_bot, run_check, run_schedule, run_validate};
use eosbot::error::Result;
use eosbot::models::Config;

#[derive(Parser, Debug)]
#[command(
    name = "eosbot",
    version = "0.1.0",
    about = "Chat attendance bot for the EOS university portal"
)]

/// CLI Arguments
struct Cli {
    #[arg(short, long, default_value = "data/config.toml")]
    config: String,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// CLI Commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the bot until interrupted
    Run,
    /// Check every profile's login once
    Check,
    /// Validate configuration, schedule and profiles
    Validate,
    /// Show the schedule and the currently live lesson
    Schedule,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run => run_bot(config).await?,
        Command::Check => run_check(config).await?,
        Command::Validate => run_validate(config).await?,
        Command::Schedule => run_schedule(config).await?,
    }

    Ok(())
}
