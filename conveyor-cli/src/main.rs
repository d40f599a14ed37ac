//! Conveyor CLI
//!
//! Command-line interface for submitting batches to the Conveyor orchestrator
//! and inspecting their results.

mod commands;
mod config;
mod display;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(about = "Conveyor batch pipeline CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "CONVEYOR_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_batch_submit() {
        let cli = Cli::try_parse_from([
            "conveyor",
            "--orchestrator-url",
            "http://orchestrator:8080",
            "batch",
            "submit",
            "--method",
            "INDIVIDUAL",
            "--source",
            "USERS",
            "--template",
            "6f1c3b0e-8a57-4c1e-9a43-0d3f4c6f2b11",
            "--capability",
            "analysis",
            "users.json",
        ])
        .expect("valid arguments");

        assert_eq!(cli.orchestrator_url, "http://orchestrator:8080");
        assert!(matches!(cli.command, Commands::Batch { .. }));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(Cli::try_parse_from(["conveyor", "batch", "status", "not-a-uuid"]).is_err());
    }
}
