//! Template command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use conveyor_client::OrchestratorClient;
use conveyor_core::dto::template::CreateTemplate;
use uuid::Uuid;

use super::read_json;
use crate::config::Config;
use crate::display::{print_template_details, print_template_summary};

/// Template subcommands
#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Publish a template from a JSON file (`{"name": ..., "steps": [...]}`)
    Create {
        /// Path to the template file
        file: String,

        /// Override the template name from the file
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List all template versions
    List,
    /// Get template details
    Get {
        /// Template ID
        id: Uuid,
    },
}

pub async fn handle_template_command(command: TemplateCommands, config: &Config) -> Result<()> {
    let client = OrchestratorClient::new(&config.orchestrator_url);

    match command {
        TemplateCommands::Create { file, name } => create_template(&client, &file, name).await,
        TemplateCommands::List => list_templates(&client).await,
        TemplateCommands::Get { id } => get_template(&client, id).await,
    }
}

async fn create_template(
    client: &OrchestratorClient,
    path: &str,
    name_override: Option<String>,
) -> Result<()> {
    let mut req: CreateTemplate = serde_json::from_value(read_json(path)?)
        .with_context(|| format!("{} is not a valid template definition", path))?;

    if let Some(name) = name_override {
        req.name = name;
    }

    println!("{}", format!("Publishing template '{}'...", req.name).cyan());

    let template = client
        .create_template(req)
        .await
        .context("Failed to create template")?;

    println!("{}", "✓ Template created successfully!".green().bold());
    println!();
    print_template_details(&template);

    Ok(())
}

async fn list_templates(client: &OrchestratorClient) -> Result<()> {
    let templates = client.list_templates().await?;

    if templates.is_empty() {
        println!("{}", "No templates found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} template(s):", templates.len()).bold());
    println!();
    for template in &templates {
        print_template_summary(template);
    }

    Ok(())
}

async fn get_template(client: &OrchestratorClient, id: Uuid) -> Result<()> {
    let template = client.get_template(id).await?;
    print_template_details(&template);
    Ok(())
}
