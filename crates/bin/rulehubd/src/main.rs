//! # rulehubd — rulehub daemon
//!
//! Composition root that wires the adapters together and runs the engine.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize tracing
//! - Construct the JSON file store and the virtual sensor/executor adapters
//! - Construct the engine and service, injecting adapters via port traits
//! - Run the boot pass, then spawn the scheduler loop
//! - Serve the line-command surface on stdin until EOF or ctrl-c
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod commands;
mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rulehub_adapter_storage_json::JsonFileStore;
use rulehub_adapter_virtual::{LoggingExecutor, VirtualSensorHub};
use rulehub_app::automation_engine::AutomationEngine;
use rulehub_app::services::automation_service::AutomationService;
use rulehub_domain::time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Adapters
    let store = JsonFileStore::new(&config.store.path);
    let sensors = VirtualSensorHub::new();
    let executor = LoggingExecutor::new();

    // Scheduler wake-up channel: the service pokes it after mutations.
    let wake = Arc::new(Notify::new());

    // Engine: boot pass first, then the polling loop.
    let mut engine = AutomationEngine::new(store.clone(), executor.clone(), sensors.clone());
    let deferred = engine.run_boot_pass(time::now()).await;
    if deferred > 0 {
        info!(deferred, "boot automations deferred through the scheduler");
    }
    let tick = Duration::from_secs(config.scheduler.tick_seconds);
    tokio::spawn(engine.run(tick, Arc::clone(&wake)));

    // Command surface
    let service = AutomationService::new(store, executor, sensors, Arc::clone(&wake));

    info!(store = %config.store.path, "rulehubd ready; reading commands from stdin");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => {
                        let reply = commands::dispatch(&service, &line).await;
                        println!("{reply}");
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    Ok(())
}
