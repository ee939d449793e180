//! Status command - show registration, workers, caches and clients

use crate::cli::Environment;
use crate::error::StreamsResult;
use crate::ui::{self, UiContext};
use crate::worker::{RoutePolicy, WorkerRecord};

/// Number of recent lifecycle events shown
const RECENT_EVENTS: usize = 5;

/// Execute the status command
pub async fn execute(env: &Environment) -> StreamsResult<()> {
    let ctx = UiContext::detect();
    let registry = env.registry().await?;
    let storage = registry.storage();

    ui::intro(&ctx, "streams-cache status");

    ui::section(&ctx, "Configuration");
    ui::key_value(&ctx, "Config", &env.config_path.display().to_string());
    ui::key_value(&ctx, "State", &env.paths.root().display().to_string());
    ui::key_value(&ctx, "Storage", storage.backend_name());
    ui::key_value(&ctx, "Origin", &env.config.network.origin);
    ui::key_value(&ctx, "Configured cache", &env.config.worker.cache_name());
    let policy = RoutePolicy::new(&env.config.network.bypass_hosts);
    let bypass = if policy.bypass_hosts().is_empty() {
        "none".to_string()
    } else {
        policy.bypass_hosts().join(", ")
    };
    ui::key_value(&ctx, "Network only", &bypass);

    ui::section(&ctx, "Workers");
    match registry.active() {
        Some(worker) => ui::key_value_status(&ctx, "Active", &describe(worker), true),
        None => ui::key_value_status(&ctx, "Active", "none - run: streams-cache install", false),
    }
    if let Some(worker) = registry.waiting() {
        ui::key_value_status(&ctx, "Waiting", &describe(worker), false);
    }
    let configured = env.config.worker.cache_name();
    if registry.active().is_some_and(|w| w.cache_name != configured)
        && registry.waiting().map_or(true, |w| w.cache_name != configured)
    {
        ui::step_warn_hint(
            &ctx,
            &format!("{} is configured but not installed", configured),
            "Run: streams-cache install",
        );
    }

    ui::section(&ctx, "Caches");
    let names = storage.keys().await?;
    if names.is_empty() {
        ui::remark(&ctx, "none");
    }
    for name in names {
        let active = registry.active().is_some_and(|w| w.cache_name == name);
        let label = if active { "active" } else { "stale" };
        ui::key_value_status(&ctx, &name, label, active);
    }

    ui::section(&ctx, "Clients");
    let clients = registry.clients();
    ui::key_value(&ctx, "Attached", &clients.len().to_string());
    if let Some(worker) = registry.active() {
        ui::key_value(
            &ctx,
            "Controlled",
            &clients.controlled_by(worker.id).to_string(),
        );
    }

    let log = env.events();
    let events = log.tail(RECENT_EVENTS).await;
    if !events.is_empty() {
        ui::section(&ctx, "Recent events");
        ui::key_value(&ctx, "Log", &log.path().display().to_string());
        for event in events {
            ui::remark(
                &ctx,
                &format!(
                    "{} {}",
                    event["timestamp"].as_str().unwrap_or("-"),
                    event["event"].as_str().unwrap_or("-")
                ),
            );
        }
    }

    Ok(())
}

fn describe(worker: &WorkerRecord) -> String {
    match worker.activated_at.or(worker.installed_at) {
        Some(at) => format!(
            "{} ({} since {})",
            worker.cache_name,
            worker.state,
            at.format("%Y-%m-%d %H:%M")
        ),
        None => format!("{} ({})", worker.cache_name, worker.state),
    }
}
