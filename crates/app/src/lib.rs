//! # rulehub-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound
//!   ports):
//!   - `AutomationStore` — durable persistence for the rule collection
//!   - `CommandExecutor` — dispatches command strings to the outside world
//!   - `SensorReader` — read-only cached sensor snapshots
//! - Provide the **scheduler** ([`automation_engine::AutomationEngine`]):
//!   due-checks, lazy `next_at` backfill, condition gating, fire-and-continue
//!   command execution, deferred duplicate-id sanitize, and the boot pass
//! - Provide the **command surface**
//!   ([`services::automation_service::AutomationService`]): add / list /
//!   enable / disable / delete / run / sanitize / recompute, each with a
//!   validate-only dry-run mode
//!
//! ## Dependency rule
//! Depends on `rulehub-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the
//! reverse.

pub mod automation_engine;
pub mod ports;
pub mod services;
