// Copyright 2026 Matchfeed Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use matchfeed_runtime::cli;
use matchfeed_runtime::config::Config;
use std::net::{IpAddr, Ipv4Addr};

#[derive(Parser)]
#[command(
    name = "matchfeed",
    about = "matchfeed: CS2 match schedules from API, mirror or browser, cached behind a read API",
    version,
    after_help = "Run 'matchfeed <command> --help' for details on each command.\nRun 'matchfeed' with no command to serve."
)]
struct Cli {
    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the read API and refresh in the background
    Serve {
        /// Port to listen on (overrides MATCHFEED_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Address to bind
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        host: IpAddr,
    },
    /// Run the pipeline once and print the snapshot
    Fetch {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Inspect or clear the saved browser session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Show saved cookies and storage
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Delete the saved session
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the process environment still applies.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    cli::init_tracing(cli.verbose, cli.log_json);

    let result = run(cli).await;
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "matchfeed", &mut std::io::stdout());
        return Ok(());
    }

    let config = Config::from_env()?;
    match cli.command {
        None => cli::serve::run(config, IpAddr::V4(Ipv4Addr::LOCALHOST), None).await,
        Some(Commands::Serve { port, host }) => cli::serve::run(config, host, port).await,
        Some(Commands::Fetch { json }) => cli::fetch_cmd::run(config, json).await,
        Some(Commands::Doctor) => cli::doctor::run(&config).await,
        Some(Commands::Session { action }) => match action {
            SessionAction::Show { json } => cli::session_cmd::show(&config, json),
            SessionAction::Clear => cli::session_cmd::clear(&config),
        },
        Some(Commands::Completions { .. }) => Ok(()),
    }
}
