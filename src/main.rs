//! shelfplay - local video playback for your media shelf
//!
//! Command-line front end over the playback library: inspect tracks, build
//! stream URLs, manage resume positions and hand videos to the system player.
//!
//! # Usage
//!
//! ```bash
//! shelfplay tracks /movies/akira.mkv
//! shelfplay url /movies/akira.mkv --start 120 --audio 2
//! shelfplay positions list --json
//! ```

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shelfplay::config::Config;

use crate::cli::{Cli, Command, ExitCode, Output};
use crate::commands::Context;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    init_tracing(&config);

    let exit_code = run_cli(cli, config).await;
    std::process::exit(exit_code.into());
}

/// Logs go to stderr so JSON on stdout stays parseable
fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli, config: Config) -> ExitCode {
    let output = Output::new(&cli);
    let ctx = Context {
        config,
        port: cli.port,
    };

    match cli.command {
        Command::Tracks(cmd) => commands::tracks_cmd(cmd, &ctx, &output).await,

        Command::Url(cmd) => commands::url_cmd(cmd, &ctx, &output).await,

        Command::Classify(cmd) => commands::classify_cmd(cmd, &output).await,

        Command::Positions(cmd) => commands::positions_cmd(cmd, &ctx, &output).await,

        Command::OpenExternal(cmd) => commands::open_external_cmd(cmd, &output).await,
    }
}
