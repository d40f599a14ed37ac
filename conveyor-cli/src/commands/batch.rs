//! Batch command handlers
//!
//! Submission from a JSON file, status polling, and the advisory
//! retry/compensation operations.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use conveyor_client::OrchestratorClient;
use conveyor_core::dto::batch::SubmitBatch;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::read_json;
use crate::config::Config;
use crate::display::{print_batch_status, print_compensation, print_receipt};

/// Batch subcommands
#[derive(Subcommand)]
pub enum BatchCommands {
    /// Submit a JSON array of elements for processing
    Submit {
        /// Processing method (INDIVIDUAL or BATCH)
        #[arg(long)]
        method: String,

        /// Data source type (USERS or CATEGORIES)
        #[arg(long)]
        source: String,

        /// Template ID
        #[arg(long)]
        template: Uuid,

        /// Worker capability required to process the items
        #[arg(long)]
        capability: String,

        /// Path to a JSON file containing an array of elements
        file: String,
    },
    /// Show batch status, with per-element results once finished
    Status {
        /// Batch ID
        id: Uuid,
    },
    /// Resubmit the retriable error elements of a finished batch
    Retry {
        /// Batch ID
        id: Uuid,
    },
    /// Show rollback plans for failed elements
    Compensation {
        /// Batch ID
        id: Uuid,
    },
}

pub async fn handle_batch_command(command: BatchCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        BatchCommands::Submit {
            method,
            source,
            template,
            capability,
            file,
        } => {
            let items = read_elements(&file)?;
            submit_batch(
                &client,
                SubmitBatch {
                    processing_method: method,
                    data_source_type: source,
                    template_ref: template,
                    capability,
                    items,
                },
            )
            .await
        }
        BatchCommands::Status { id } => batch_status(&client, id).await,
        BatchCommands::Retry { id } => retry_batch(&client, id).await,
        BatchCommands::Compensation { id } => compensation(&client, id).await,
    }
}

fn read_elements(path: &str) -> Result<Vec<JsonValue>> {
    match read_json(path)? {
        JsonValue::Array(items) if items.is_empty() => bail!("{} contains no elements", path),
        JsonValue::Array(items) => Ok(items),
        _ => bail!("{} must contain a JSON array of elements", path),
    }
}

async fn submit_batch(client: &OrchestratorClient, req: SubmitBatch) -> Result<()> {
    println!(
        "{}",
        format!(
            "Submitting {} element(s) as {}/{}...",
            req.items.len(),
            req.processing_method,
            req.data_source_type
        )
        .cyan()
    );

    let receipt = client
        .submit_batch(req)
        .await
        .context("Failed to submit batch")?;

    println!("{}", "✓ Batch submitted successfully!".green().bold());
    print_receipt(&receipt);

    Ok(())
}

async fn batch_status(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let report = client.get_batch_status(id).await?;
    print_batch_status(&report);
    Ok(())
}

async fn retry_batch(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let receipt = client
        .retry_batch(id)
        .await
        .with_context(|| format!("Failed to retry batch {}", id))?;

    println!("{}", "✓ Retriable elements resubmitted".green().bold());
    print_receipt(&receipt);

    Ok(())
}

async fn compensation(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let entries = client.get_compensation(id).await?;

    if entries.is_empty() {
        println!("{}", "No compensation needed.".green());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} element(s) need compensation:", entries.len()).bold()
    );
    println!();
    for entry in &entries {
        print_compensation(entry);
    }

    Ok(())
}
