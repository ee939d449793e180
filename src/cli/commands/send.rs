//! Send command - post a control message to a worker

use crate::cli::args::{OutputFormat, SendArgs};
use crate::cli::Environment;
use crate::error::{StreamsError, StreamsResult};
use crate::ui::{self, UiContext};
use crate::worker::{MessageOutcome, MessageTarget, UncacheStatus};
use serde_json::Value;

/// Execute the send command
pub async fn execute(args: SendArgs, env: &Environment) -> StreamsResult<()> {
    let message: Value = serde_json::from_str(&args.message)
        .map_err(|e| StreamsError::User(format!("Message is not valid JSON: {}", e)))?;
    let target = if args.waiting {
        MessageTarget::Waiting
    } else {
        MessageTarget::Active
    };

    let mut registry = env.registry().await?;
    let outcome = registry.post_message(target, message).await?;
    registry.save().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Plain => println!("{}", outcome.label()),
        OutputFormat::Table => print_outcome(&UiContext::detect(), &outcome),
    }
    Ok(())
}

fn print_outcome(ctx: &UiContext, outcome: &MessageOutcome) {
    match outcome {
        MessageOutcome::Ignored => ui::step_info(ctx, "Message ignored"),
        MessageOutcome::SkipWaiting => ui::step_ok(ctx, "skipWaiting delivered"),
        MessageOutcome::CacheApp(report) => {
            for url in &report.cached {
                ui::step_ok(ctx, &format!("Cached {}", url));
            }
            for (url, reason) in &report.failed {
                ui::step_error_detail(ctx, &format!("Not cached {}", url), reason);
            }
        }
        MessageOutcome::UncacheApp(report) => {
            for (url, status) in &report.results {
                match status {
                    UncacheStatus::Removed => ui::step_ok(ctx, &format!("Removed {}", url)),
                    UncacheStatus::NotFound => ui::step_info(ctx, &format!("{} was not cached", url)),
                    UncacheStatus::Failed(reason) => {
                        ui::step_error_detail(ctx, &format!("Could not remove {}", url), reason)
                    }
                }
            }
        }
        MessageOutcome::Failed { action, reason } => {
            ui::step_warn(ctx, &format!("{} failed: {}", action, reason))
        }
    }
}
