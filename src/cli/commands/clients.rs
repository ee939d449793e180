//! Clients command - attach, detach and list application instances

use crate::cli::args::{ClientsAction, ClientsArgs, OutputFormat};
use crate::cli::commands::install::print_activation;
use crate::cli::Environment;
use crate::error::StreamsResult;
use crate::ui::{self, UiContext};
use crate::worker::{ClientRecord, Registry};
use console::style;

/// Execute the clients command
pub async fn execute(args: ClientsArgs, env: &Environment) -> StreamsResult<()> {
    let mut registry = env.registry().await?;

    match args.action {
        ClientsAction::List { format } => list(&registry, format)?,
        ClientsAction::Attach => {
            let client = registry.attach_client();
            registry.save().await?;
            println!("{}", client.id);
        }
        ClientsAction::Detach { id } => {
            let activation = registry.detach_client(id).await?;
            registry.save().await?;

            let ctx = UiContext::detect();
            ui::step_ok(&ctx, &format!("Detached client {}", id));
            if let (Some(report), Some(active)) = (activation, registry.active()) {
                print_activation(&ctx, &active.cache_name, &report);
            }
        }
    }
    Ok(())
}

fn list(registry: &Registry, format: OutputFormat) -> StreamsResult<()> {
    let clients = registry.clients().snapshot();

    if clients.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(&UiContext::detect(), "No clients attached"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(registry, &clients),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&clients)?),
        OutputFormat::Plain => {
            for client in &clients {
                println!("{}", client.id);
            }
        }
    }
    Ok(())
}

fn print_table(registry: &Registry, clients: &[ClientRecord]) {
    println!(
        "{:<38} {:<24} {:<17}",
        style("ID").bold(),
        style("CONTROLLER").bold(),
        style("ATTACHED").bold()
    );
    println!("{}", "-".repeat(79));

    for client in clients {
        let controller = controller_name(registry, client);
        let attached = client.attached_at.format("%Y-%m-%d %H:%M").to_string();
        println!("{:<38} {:<24} {:<17}", client.id, controller, attached);
    }

    println!();
    println!("{} client(s)", clients.len());
}

fn controller_name(registry: &Registry, client: &ClientRecord) -> String {
    let Some(controller) = client.controller else {
        return "-".to_string();
    };
    [registry.active(), registry.waiting()]
        .into_iter()
        .flatten()
        .find(|w| w.id == controller)
        .map(|w| w.cache_name.clone())
        .unwrap_or_else(|| "(redundant)".to_string())
}
