//! # rulehub-domain
//!
//! Pure domain model for the rulehub automation engine.
//!
//! ## Responsibilities
//! - Foundational types: numeric automation identifiers, error conventions,
//!   epoch-second timestamps
//! - Define **Automations** (trigger + optional condition gate + ordered
//!   command list) and their persisted document shape
//! - Define **Triggers** (at-time / after-delay / interval) and the schedule
//!   arithmetic mapping a trigger to its next fire instant
//! - Define the **condition language** (`IF` / `ELSE IF` / `ELSE` chains over
//!   sensor comparisons): parsing, validation, and evaluation
//! - Define **sensor snapshots**, the read-only inputs conditions evaluate
//!   against
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod condition;
pub mod sensor;
