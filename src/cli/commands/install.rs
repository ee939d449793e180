//! Install command - register the configured worker version

use crate::cli::Environment;
use crate::error::StreamsResult;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{ActivationReport, WorkerRecord, WorkerState};

/// Execute the install command
pub async fn execute(env: &Environment) -> StreamsResult<()> {
    let ctx = UiContext::detect();
    let mut registry = env.registry().await?;
    let candidate = WorkerRecord::from_config(&env.config);
    let name = candidate.cache_name.clone();

    ui::intro(&ctx, &format!("Installing {}", name));

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Fetching {} core assets from {}",
        candidate.core_assets.len(),
        env.config.network.origin
    ));

    let state = match registry.register(candidate).await {
        Ok(state) => state,
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };
    spinner.stop("Core assets cached");
    registry.save().await?;

    match state {
        WorkerState::Installed => {
            ui::step_warn_hint(
                &ctx,
                &format!("{} is waiting for clients of the active worker", name),
                "Detach them or run: streams-cache skip-waiting",
            );
            ui::outro_warn(&ctx, "Installed, not yet active");
        }
        _ => ui::outro_success(&ctx, &format!("{} is active", name)),
    }

    Ok(())
}

/// Execute the skip-waiting command
pub async fn skip_waiting(env: &Environment) -> StreamsResult<()> {
    let ctx = UiContext::detect();
    let mut registry = env.registry().await?;

    let report = registry.skip_waiting().await?;
    registry.save().await?;

    if let Some(active) = registry.active() {
        print_activation(&ctx, &active.cache_name, &report);
    }
    Ok(())
}

/// Report what an activation did
pub(crate) fn print_activation(ctx: &UiContext, cache: &str, report: &ActivationReport) {
    ui::step_ok_detail(ctx, "Activated", cache);
    for name in &report.deleted {
        ui::step_info(ctx, &format!("Deleted stale cache {}", name));
    }
    for (name, reason) in &report.failed {
        ui::step_error_detail(ctx, &format!("Could not delete {}", name), reason);
    }
    if report.claimed > 0 {
        ui::remark(ctx, &format!("Claimed {} client(s)", report.claimed));
    }
}
