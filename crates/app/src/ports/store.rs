//! Automation store port — durable persistence for the rule collection.
//!
//! The store is the canonical state; everything the scheduler caches in
//! memory is a fast path over it. Every load→modify→write sequence behind
//! these methods must be mutually exclusive with every other, so a
//! scheduler pass and a concurrent command-surface edit never interleave.

use std::future::Future;

use rulehub_domain::automation::{Automation, AutomationDocument};
use rulehub_domain::error::HubError;
use rulehub_domain::id::AutomationId;

/// Repository for the persisted automation document.
pub trait AutomationStore {
    /// Load the whole document. A missing or malformed store reads as
    /// empty — never an error.
    fn load(&self) -> impl Future<Output = Result<AutomationDocument, HubError>> + Send;

    /// Replace the whole document via an atomic write.
    fn replace(
        &self,
        doc: &AutomationDocument,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Visit each stored automation object's raw JSON text in document
    /// order without materializing the document. Stops early when `visit`
    /// returns `false`.
    fn for_each_raw(
        &self,
        visit: &mut (dyn FnMut(&str) -> bool + Send),
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Persist a new `next_at` for one automation.
    fn update_next_at(
        &self,
        id: AutomationId,
        next_at: Option<i64>,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Append a new automation to the document.
    fn append(&self, automation: Automation)
    -> impl Future<Output = Result<(), HubError>> + Send;

    /// Remove an automation by id.
    fn remove(&self, id: AutomationId) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Flip the enabled flag of one automation.
    fn set_enabled(
        &self,
        id: AutomationId,
        enabled: bool,
    ) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Detect and resolve duplicate ids. Returns whether anything changed;
    /// idempotent when the store is already clean.
    fn sanitize(&self) -> impl Future<Output = Result<bool, HubError>> + Send;

    /// Pick an id not currently present in the store.
    fn unique_id(&self) -> impl Future<Output = Result<AutomationId, HubError>> + Send;
}
