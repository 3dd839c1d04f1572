//! connectum CLI entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod args;
mod commands;
mod config;
mod proxy;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --log-level wins over RUST_LOG, which wins over the default
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Serve(args) => commands::serve::execute(args, cli.config).await,
        Commands::Feed(args) => commands::feed::execute(args, cli.config).await,
        Commands::Ask(args) => commands::post::ask(args, cli.config).await,
        Commands::Answer(args) => commands::post::answer(args, cli.config).await,
        Commands::Like(args) => commands::react::like(args, cli.config).await,
        Commands::Best(args) => commands::react::best(args, cli.config).await,
        Commands::Profile(args) => commands::profile::show(args, cli.config).await,
        Commands::Leaderboard(args) => commands::profile::leaderboard(args, cli.config).await,
        Commands::Translate(args) => commands::translate::execute(args, cli.config).await,
        Commands::UploadAvatar(args) => commands::upload::execute(args, cli.config).await,
        Commands::Config(args) => commands::config::execute(args, cli.config).await,
        Commands::Doctor(args) => commands::doctor::execute(args, cli.config).await,
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
