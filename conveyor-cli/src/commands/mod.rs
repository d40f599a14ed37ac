//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod batch;
mod item;
mod template;

pub use batch::BatchCommands;
pub use item::ItemCommands;
pub use template::TemplateCommands;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value as JsonValue;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline template management
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Batch submission and inspection
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
    /// Work item inspection
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
}

/// Route a command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Template { command } => {
            template::handle_template_command(command, config).await
        }
        Commands::Batch { command } => batch::handle_batch_command(command, config).await,
        Commands::Item { command } => item::handle_item_command(command, config).await,
    }
}

/// Read and parse a JSON file
fn read_json(path: &str) -> Result<JsonValue> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path))
}
