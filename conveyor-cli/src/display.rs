//! Human-readable output for orchestrator responses

use colored::*;
use conveyor_core::domain::compensation::CompensationAction;
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::domain::result::{BatchStatus, ExecutionResult};
use conveyor_core::domain::template::PipelineTemplate;
use conveyor_core::dto::batch::{BatchReceipt, BatchStatusReport, CompensationEntry};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn print_receipt(receipt: &BatchReceipt) {
    println!("  Batch ID:   {}", receipt.batch_id.to_string().cyan());
    println!("  Work items: {}", receipt.item_count);
    println!();
    println!(
        "{}",
        format!("Check progress with: conveyor batch status {}", receipt.batch_id).dimmed()
    );
}

pub fn print_template_summary(template: &PipelineTemplate) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        template.name.bold(),
        format!("v{}", template.version).dimmed()
    );
    println!("    ID:      {}", template.id.to_string().dimmed());
    println!("    Steps:   {}", template.steps.len());
    println!(
        "    Created: {}",
        template.created_at.format(TIME_FORMAT).to_string().dimmed()
    );
    println!();
}

pub fn print_template_details(template: &PipelineTemplate) {
    println!("{}", "Template Details:".bold());
    println!("  ID:      {}", template.id.to_string().cyan());
    println!("  Name:    {}", template.name);
    println!("  Version: {}", template.version);
    println!("  Created: {}", template.created_at.format(TIME_FORMAT));

    println!("\n{}", "Steps:".bold());
    for (index, step) in template.steps.iter().enumerate() {
        println!("  {}. {}", index + 1, step.label().cyan());
        if let Some(timeout) = step.timeout_ms {
            println!("     timeout:      {}ms", timeout);
        }
        if let Some(retries) = step.retry_count {
            println!("     retries:      {}", retries);
        }
        if let Some(compensation) = &step.compensation {
            println!("     compensation: {}.{}", step.service, compensation);
        }
    }
}

pub fn print_batch_status(report: &BatchStatusReport) {
    println!("{}", "Batch Status:".bold());
    println!("  ID:       {}", report.batch_id.to_string().cyan());
    println!("  Status:   {}", colorize_batch_status(&report.status));
    println!("  Elements: {}", report.total_items);

    let Some(results) = &report.per_item_results else {
        println!();
        println!("{}", "Results are available once every item has finished.".dimmed());
        return;
    };

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    println!(
        "  Outcome:  {} succeeded, {} failed",
        succeeded.to_string().green(),
        (results.len() - succeeded).to_string().red()
    );

    println!("\n{}", "Results:".bold());
    for result in results {
        print_execution_result(result);
    }
}

fn print_execution_result(result: &ExecutionResult) {
    match &result.error {
        None => println!("  {} {}", "✓".green(), result.item_id),
        Some(error) => {
            let step = error
                .step
                .map(|s| format!(" at step {}", s))
                .unwrap_or_default();
            let retriable = if error.retriable { " (retriable)" } else { "" };
            println!(
                "  {} {} {}{}{}",
                "✗".red(),
                result.item_id,
                error.kind.as_str().red(),
                step,
                retriable.yellow()
            );
            println!("      {}", error.message.dimmed());
        }
    }
}

pub fn print_compensation(entry: &CompensationEntry) {
    let action = match entry.plan.action {
        CompensationAction::Rollback => "rollback".yellow(),
        CompensationAction::None => "none".dimmed(),
    };

    println!(
        "  {} {} failed at step {} ({})",
        "▸".cyan(),
        entry.item_id.bold(),
        entry.failed_step,
        action
    );
    for step in &entry.plan.steps {
        println!(
            "    undo step {}: {}.{}",
            step.step, step.service, step.operation
        );
    }
    println!("    {}", entry.plan.notification.dimmed());
    println!();
}

pub fn print_item_summary(item: &WorkItem) {
    println!("  {} Item {}", "▸".cyan(), item.id.to_string().dimmed());
    println!("    Batch:      {} #{}", item.batch_id.to_string().dimmed(), item.sequence);
    println!("    Status:     {}", colorize_item_status(&item.status));
    println!("    Capability: {}", item.capability);
    if let Some(owner) = &item.owner {
        println!("    Owner:      {}", owner.dimmed());
    }
    println!();
}

pub fn print_item_details(item: &WorkItem) {
    println!("{}", "Work Item Details:".bold());
    println!("  ID:         {}", item.id.to_string().cyan());
    println!("  Batch:      {}", item.batch_id.to_string().dimmed());
    println!("  Sequence:   {}", item.sequence);
    println!("  Type:       {}", item.batch_type);
    println!("  Status:     {}", colorize_item_status(&item.status));
    println!("  Capability: {}", item.capability);
    println!("  Template:   {}", item.template_ref.to_string().dimmed());
    println!("  Created:    {}", item.created_at.format(TIME_FORMAT));

    if let Some(owner) = &item.owner {
        println!("  Owner:      {}", owner);
    }
    if let Some(claimed) = item.claimed_at {
        println!("  Claimed:    {}", claimed.format(TIME_FORMAT));
    }
    if let Some(completed) = item.completed_at {
        println!("  Completed:  {}", completed.format(TIME_FORMAT));
        if let Some(claimed) = item.claimed_at {
            let duration = completed.signed_duration_since(claimed);
            println!("  Duration:   {}ms", duration.num_milliseconds());
        }
    }

    if let Some(result) = &item.result {
        if let Some(failure) = &result.failure {
            println!("\n{}", "Failure:".bold());
            println!("  {} {}", failure.kind.as_str().red(), failure.message);
        }
        if !result.results.is_empty() {
            println!("\n{}", "Results:".bold());
            for element in &result.results {
                print_execution_result(element);
            }
        }
    }
}

fn colorize_batch_status(status: &BatchStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        BatchStatus::Pending => label.yellow(),
        BatchStatus::Processing => label.cyan(),
        BatchStatus::Completed => label.green(),
        BatchStatus::PartiallyFailed => label.yellow().bold(),
        BatchStatus::Failed => label.red(),
    }
}

fn colorize_item_status(status: &ItemStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ItemStatus::Pending => label.yellow(),
        ItemStatus::Processing => label.cyan(),
        ItemStatus::Completed => label.green(),
        ItemStatus::Failed => label.red(),
    }
}
