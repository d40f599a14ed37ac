//! Work item command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use conveyor_client::OrchestratorClient;
use conveyor_core::domain::item::ItemStatus;
use conveyor_core::dto::item::ListItemsQuery;
use uuid::Uuid;

use crate::config::Config;
use crate::display::{print_item_details, print_item_summary};

/// Work item subcommands
#[derive(Subcommand)]
pub enum ItemCommands {
    /// Get work item details
    Get {
        /// Work item ID
        id: Uuid,
    },
    /// List work items
    List {
        /// Only items in this status (pending, processing, completed, failed)
        #[arg(long)]
        status: Option<ItemStatus>,

        /// Only items requiring this capability
        #[arg(long)]
        capability: Option<String>,

        /// Maximum number of items to show
        #[arg(long)]
        limit: Option<i64>,
    },
}

pub async fn handle_item_command(command: ItemCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        ItemCommands::Get { id } => {
            let item = client.get_item(id).await?;
            print_item_details(&item);
            Ok(())
        }
        ItemCommands::List {
            status,
            capability,
            limit,
        } => {
            let query = ListItemsQuery {
                status,
                capability,
                limit,
            };
            list_items(&client, &query).await
        }
    }
}

async fn list_items(client: &OrchestratorClient, query: &ListItemsQuery) -> Result<()> {
    let items = client.list_items(query).await?;

    if items.is_empty() {
        println!("{}", "No work items found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} work item(s):", items.len()).bold());
    println!();
    for item in &items {
        print_item_summary(item);
    }

    Ok(())
}
