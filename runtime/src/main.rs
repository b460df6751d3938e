// Copyright 2026 Vakio Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use vakio_runtime::cli;

#[derive(Parser)]
#[command(
    name = "vakio",
    about = "Vakio draw scraper: 13 matches, public percentages and odds-implied probabilities",
    version,
    after_help = "Run 'vakio <command> --help' for details on each command.\nRun 'vakio' with no command to start the server."
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST server (default)
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Discover open draw identifiers, newest first
    Find,
    /// Scrape one draw in the foreground and print the result
    Scrape {
        /// Draw identifier, or "auto" for the newest draw
        target: Option<String>,
        /// Replay a recorded fixture instead of launching Chromium
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        None => cli::serve::run(None, cli.json_logs).await,
        Some(Commands::Serve { port }) => cli::serve::run(port, cli.json_logs).await,
        Some(Commands::Find) => cli::find_cmd::run(cli.json_logs).await,
        Some(Commands::Scrape { target, fixture }) => {
            cli::scrape_cmd::run(target.as_deref(), fixture.as_deref(), cli.json_logs).await
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "vakio", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
