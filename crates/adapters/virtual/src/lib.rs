//! # rulehub-adapter-virtual
//!
//! Virtual/demo adapter that provides simulated collaborators for testing
//! and demonstration purposes.
//!
//! | Collaborator | Port | Behaviour |
//! |--------------|------|-----------|
//! | [`VirtualSensorHub`] | `SensorReader` | Holds settable cached readings behind a short-timeout lock |
//! | [`LoggingExecutor`] | `CommandExecutor` | Logs every command and records it in history |
//!
//! ## Dependency rule
//!
//! Depends on `rulehub-app` (port traits) and `rulehub-domain` only.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::sync::RwLock;
use tracing::{info, warn};

use rulehub_app::ports::{CommandExecutor, CommandOutcome, SensorReader};
use rulehub_domain::sensor::{RangingObject, SensorSnapshot};

/// Bounded wait for the sensor cache lock. A timeout yields an empty
/// snapshot so conditions fail closed instead of stalling a scheduler
/// pass.
pub const SENSOR_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Simulated sensor hub with settable cached readings.
#[derive(Default, Clone)]
pub struct VirtualSensorHub {
    cache: Arc<RwLock<SensorSnapshot>>,
}

impl VirtualSensorHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_temperature(&self, value: f32) {
        self.cache.write().await.temperature = Some(value);
    }

    pub async fn set_light_level(&self, value: f32) {
        self.cache.write().await.light_level = Some(value);
    }

    pub async fn set_ranging(&self, objects: Vec<RangingObject>) {
        self.cache.write().await.ranging = objects;
    }

    pub async fn set_motion(&self, detected: bool) {
        self.cache.write().await.motion = Some(detected);
    }

    /// Pin the hour reported to the `TIME` sensor (tests/demo); unset
    /// readings fall back to the wall clock at snapshot time.
    pub async fn set_local_hour(&self, hour: u32) {
        self.cache.write().await.local_hour = Some(hour);
    }
}

impl SensorReader for VirtualSensorHub {
    async fn snapshot(&self) -> SensorSnapshot {
        let mut snapshot =
            match tokio::time::timeout(SENSOR_READ_TIMEOUT, self.cache.read()).await {
                Ok(cache) => cache.clone(),
                Err(_) => {
                    warn!("sensor cache read timed out; conditions will fail closed");
                    SensorSnapshot::default()
                }
            };
        if snapshot.local_hour.is_none() {
            snapshot.local_hour = Some(Local::now().hour());
        }
        snapshot
    }
}

/// Command sink that logs and records everything it is asked to execute.
///
/// Replies speak the text protocol: a leading `"Error:"` marks failure,
/// which [`CommandOutcome::from_text`] turns into the structured flag.
/// Clones share one history.
#[derive(Default, Clone)]
pub struct LoggingExecutor {
    history: Arc<StdMutex<Vec<CommandOutcome>>>,
}

impl LoggingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcomes of every dispatched command, in order.
    #[must_use]
    pub fn history(&self) -> Vec<CommandOutcome> {
        self.history.lock().unwrap().clone()
    }
}

impl CommandExecutor for LoggingExecutor {
    async fn execute(&self, command: &str) -> CommandOutcome {
        let output = if command.trim().is_empty() {
            "Error: empty command".to_string()
        } else {
            format!("Executed: {command}")
        };
        let outcome = CommandOutcome::from_text(command, output);
        if outcome.success {
            info!(command, "virtual executor ran command");
        } else {
            warn!(command, output = %outcome.output, "virtual executor rejected command");
        }
        self.history.lock().unwrap().push(outcome.clone());
        outcome
    }
}
