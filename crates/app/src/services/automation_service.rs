//! Automation service — the thin command surface over the store.
//!
//! Every mutating operation supports [`Mode::ValidateOnly`]: all shape and
//! argument checks run, the sentinel [`VALIDATED`] comes back, and nothing
//! observable happens — no persistence, no execution.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use rulehub_domain::automation::{Automation, AutomationDocument, Trigger, schedule};
use rulehub_domain::condition::{ChainError, ConditionChain, ConditionExpr};
use rulehub_domain::error::{HubError, NotFoundError, ValidationError};
use rulehub_domain::id::AutomationId;
use rulehub_domain::time;

use crate::automation_engine::dispatch_command;
use crate::ports::{AutomationStore, CommandExecutor, SensorReader};

/// Whether an operation should apply or only validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Apply,
    /// Dry-run: perform every check, touch nothing.
    ValidateOnly,
}

/// Sentinel success marker returned by every validate-only operation.
pub const VALIDATED: &str = "VALID";

/// Parsed arguments for the add operation.
#[derive(Debug, Clone)]
pub struct AddAutomation {
    pub name: String,
    pub trigger: Trigger,
    /// Explicit id override; replaces an existing entry with the same id.
    pub id: Option<AutomationId>,
    pub enabled: bool,
    pub run_at_boot: bool,
    pub boot_delay_ms: Option<u64>,
    pub conditions: Option<String>,
    pub commands: Vec<String>,
}

/// Application service for the automation command surface.
pub struct AutomationService<S, X, R> {
    store: S,
    executor: X,
    sensors: R,
    wake: Arc<Notify>,
}

impl<S, X, R> AutomationService<S, X, R>
where
    S: AutomationStore,
    X: CommandExecutor,
    R: SensorReader,
{
    /// Create a new service. `wake` is notified after every applied
    /// mutation so the scheduler picks it up without waiting a full tick.
    pub fn new(store: S, executor: X, sensors: R, wake: Arc<Notify>) -> Self {
        Self {
            store,
            executor,
            sensors,
            wake,
        }
    }

    /// Add a new automation (or replace one when an explicit id is given).
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the request fails shape
    /// checks, or a storage error from the repository.
    #[tracing::instrument(skip(self, request), fields(automation_name = %request.name))]
    pub async fn add(&self, request: AddAutomation, mode: Mode) -> Result<String, HubError> {
        // Full argument validation happens in both modes.
        if request.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let commands: Vec<String> = request
            .commands
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if commands.is_empty() {
            return Err(ValidationError::NoCommands.into());
        }
        for command in &commands {
            validate_command(command)?;
        }
        validate_trigger(&request.trigger)?;
        if let Some(gate) = request.conditions.as_deref() {
            validate_gate(gate)?;
        }

        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }

        let replacing = match request.id {
            Some(id) if id.is_valid() => self.store.load().await?.contains_id(id),
            _ => false,
        };
        let id = match request.id {
            Some(id) if id.is_valid() => id,
            _ => self.store.unique_id().await?,
        };
        if replacing {
            self.store.remove(id).await?;
        }

        let next_at = schedule::next_run_time(&request.trigger, &time::local_now())
            .map(|at| at.timestamp());

        let mut builder = Automation::builder()
            .id(id)
            .name(request.name.clone())
            .enabled(request.enabled)
            .trigger(request.trigger)
            .run_at_boot(request.run_at_boot)
            .commands(commands);
        if let Some(delay) = request.boot_delay_ms {
            builder = builder.boot_delay_ms(delay);
        }
        if let Some(gate) = request.conditions.filter(|c| !c.trim().is_empty()) {
            builder = builder.conditions(gate);
        }
        if let Some(at) = next_at {
            builder = builder.next_at(at);
        } else {
            debug!(id = %id, "could not compute an initial next run time");
        }

        self.store.append(builder.build()?).await?;
        self.wake.notify_one();

        let verb = if replacing { "Updated" } else { "Added" };
        Ok(format!("{verb} automation id={id} name={}", request.name))
    }

    /// List all automations in document order.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list(&self) -> Result<Vec<Automation>, HubError> {
        Ok(self.store.load().await?.automations)
    }

    /// Enable or disable one automation.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn set_enabled(
        &self,
        id: AutomationId,
        enabled: bool,
        mode: Mode,
    ) -> Result<String, HubError> {
        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }
        self.require(id).await?;
        self.store.set_enabled(id, enabled).await?;
        self.wake.notify_one();
        let verb = if enabled { "Enabled" } else { "Disabled" };
        Ok(format!("{verb} automation id={id}"))
    }

    /// Delete one automation.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when `id` is unknown, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: AutomationId, mode: Mode) -> Result<String, HubError> {
        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }
        self.require(id).await?;
        self.store.remove(id).await?;
        self.wake.notify_one();
        Ok(format!("Deleted automation id={id}"))
    }

    /// Run one automation's commands immediately, bypassing its schedule
    /// and condition gate.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] when `id` is unknown, or a storage
    /// error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, id: AutomationId, mode: Mode) -> Result<String, HubError> {
        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }
        let doc = self.store.load().await?;
        let auto = doc.find(id).ok_or_else(|| NotFoundError {
            entity: "Automation",
            id: id.to_string(),
        })?;

        let mut dispatched = 0;
        for command in &auto.commands {
            if dispatch_command(&self.executor, &self.sensors, command)
                .await
                .is_some()
            {
                dispatched += 1;
            }
        }
        Ok(format!("Ran automation id={id} ({dispatched} commands)"))
    }

    /// Detect and resolve duplicate ids in the store.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn sanitize(&self, mode: Mode) -> Result<String, HubError> {
        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }
        if self.store.sanitize().await? {
            self.wake.notify_one();
            Ok("Sanitized automation store: fixed duplicate IDs".to_string())
        } else {
            Ok("Sanitize: no changes needed".to_string())
        }
    }

    /// Recompute `next_at` for every enabled automation from the current
    /// time. Failures leave the stored value untouched.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn recompute(&self, mode: Mode) -> Result<String, HubError> {
        if mode == Mode::ValidateOnly {
            return Ok(VALIDATED.to_string());
        }
        let doc = self.store.load().await?;
        let now = time::local_now();
        let mut recomputed = 0;
        let mut failed = 0;
        for auto in &doc.automations {
            if !auto.enabled || !auto.id.is_valid() {
                continue;
            }
            match schedule::next_run_time(&auto.trigger, &now) {
                Some(at) => {
                    match self.store.update_next_at(auto.id, Some(at.timestamp())).await {
                        Ok(()) => recomputed += 1,
                        Err(_) => failed += 1,
                    }
                }
                None => failed += 1,
            }
        }
        if recomputed > 0 {
            self.wake.notify_one();
        }
        Ok(format!(
            "Recomputed nextAt: {recomputed} succeeded, {failed} failed"
        ))
    }

    async fn require(&self, id: AutomationId) -> Result<AutomationDocument, HubError> {
        let doc = self.store.load().await?;
        if !doc.contains_id(id) {
            return Err(NotFoundError {
                entity: "Automation",
                id: id.to_string(),
            }
            .into());
        }
        Ok(doc)
    }
}

fn validate_trigger(trigger: &Trigger) -> Result<(), HubError> {
    match trigger {
        Trigger::AtTime { time, .. } => {
            if schedule::parse_hhmm(time).is_none() {
                return Err(ValidationError::BadTime.into());
            }
        }
        Trigger::AfterDelay { delay_ms } => {
            if *delay_ms == 0 {
                return Err(ValidationError::BadMillis("delayms").into());
            }
        }
        Trigger::Interval { interval_ms } => {
            if *interval_ms == 0 {
                return Err(ValidationError::BadMillis("intervalms").into());
            }
        }
    }
    Ok(())
}

/// Validate one automation command: conditional chains go through the
/// chain validator; plain commands only need to be non-empty (their
/// meaning belongs to the executor collaborator).
fn validate_command(command: &str) -> Result<(), HubError> {
    let upper = command.to_ascii_uppercase();
    if upper == "ELSE" || upper.starts_with("ELSE ") {
        return Err(ValidationError::BadCommand(command.to_string()).into());
    }
    if upper.starts_with("IF ") && upper.contains(" THEN ") {
        ConditionChain::parse(command).map_err(ValidationError::Condition)?;
    }
    Ok(())
}

/// Validate a gate: either a bare expression or a full chain.
fn validate_gate(gate: &str) -> Result<(), HubError> {
    let trimmed = gate.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    if trimmed.to_ascii_uppercase().starts_with("IF ") {
        ConditionChain::parse(trimmed).map_err(ValidationError::Condition)?;
    } else {
        ConditionExpr::parse(trimmed)
            .map_err(|reason| ValidationError::Condition(ChainError { branch: 0, reason }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::Mutex;

    use rulehub_domain::sensor::SensorSnapshot;

    use crate::ports::CommandOutcome;

    // ── In-memory store ────────────────────────────────────────────

    #[derive(Default)]
    struct InMemoryStore {
        doc: Mutex<AutomationDocument>,
    }

    impl InMemoryStore {
        fn count(&self) -> usize {
            self.doc.lock().unwrap().automations.len()
        }
    }

    impl AutomationStore for InMemoryStore {
        fn load(&self) -> impl Future<Output = Result<AutomationDocument, HubError>> + Send {
            let doc = self.doc.lock().unwrap().clone();
            async { Ok(doc) }
        }

        fn replace(
            &self,
            doc: &AutomationDocument,
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            *self.doc.lock().unwrap() = doc.clone();
            async { Ok(()) }
        }

        fn for_each_raw(
            &self,
            visit: &mut (dyn FnMut(&str) -> bool + Send),
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            let doc = self.doc.lock().unwrap().clone();
            for auto in &doc.automations {
                let text = serde_json::to_string(auto).unwrap();
                if !visit(&text) {
                    break;
                }
            }
            async { Ok(()) }
        }

        fn update_next_at(
            &self,
            id: AutomationId,
            next_at: Option<i64>,
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            let mut doc = self.doc.lock().unwrap();
            let result = match doc.automations.iter_mut().find(|a| a.id == id) {
                Some(auto) => {
                    auto.next_at = next_at;
                    Ok(())
                }
                None => Err(NotFoundError {
                    entity: "Automation",
                    id: id.to_string(),
                }
                .into()),
            };
            async { result }
        }

        fn append(
            &self,
            automation: Automation,
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            self.doc.lock().unwrap().automations.push(automation);
            async { Ok(()) }
        }

        fn remove(&self, id: AutomationId) -> impl Future<Output = Result<(), HubError>> + Send {
            self.doc.lock().unwrap().automations.retain(|a| a.id != id);
            async { Ok(()) }
        }

        fn set_enabled(
            &self,
            id: AutomationId,
            enabled: bool,
        ) -> impl Future<Output = Result<(), HubError>> + Send {
            let mut doc = self.doc.lock().unwrap();
            if let Some(auto) = doc.automations.iter_mut().find(|a| a.id == id) {
                auto.enabled = enabled;
            }
            async { Ok(()) }
        }

        fn sanitize(&self) -> impl Future<Output = Result<bool, HubError>> + Send {
            let mut doc = self.doc.lock().unwrap();
            let mut seen: Vec<i64> = Vec::new();
            let mut changed = false;
            for auto in &mut doc.automations {
                let mut raw = auto.id.as_i64();
                while seen.contains(&raw) {
                    raw += 1;
                    changed = true;
                }
                auto.id = AutomationId::new(raw);
                seen.push(raw);
            }
            async move { Ok(changed) }
        }

        fn unique_id(&self) -> impl Future<Output = Result<AutomationId, HubError>> + Send {
            let doc = self.doc.lock().unwrap();
            let max = doc
                .automations
                .iter()
                .map(|a| a.id.as_i64())
                .max()
                .unwrap_or(0);
            async move { Ok(AutomationId::new(max + 1)) }
        }
    }

    // ── Spy executor / stub sensors ────────────────────────────────

    #[derive(Default)]
    struct SpyExecutor {
        commands: Mutex<Vec<String>>,
    }

    impl CommandExecutor for SpyExecutor {
        fn execute(&self, command: &str) -> impl Future<Output = CommandOutcome> + Send {
            self.commands.lock().unwrap().push(command.to_string());
            let outcome = CommandOutcome::from_text(command, "OK");
            async move { outcome }
        }
    }

    struct StubSensors;

    impl SensorReader for StubSensors {
        fn snapshot(&self) -> impl Future<Output = SensorSnapshot> + Send {
            async { SensorSnapshot::default() }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn make_service() -> AutomationService<InMemoryStore, SpyExecutor, StubSensors> {
        AutomationService::new(
            InMemoryStore::default(),
            SpyExecutor::default(),
            StubSensors,
            Arc::new(Notify::new()),
        )
    }

    fn add_request(name: &str) -> AddAutomation {
        AddAutomation {
            name: name.to_string(),
            trigger: Trigger::Interval { interval_ms: 60_000 },
            id: None,
            enabled: true,
            run_at_boot: false,
            boot_delay_ms: None,
            conditions: None,
            commands: vec!["lights on".to_string()],
        }
    }

    // ── add ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_add_automation_and_compute_initial_next_at() {
        let svc = make_service();
        let reply = svc.add(add_request("Evening"), Mode::Apply).await.unwrap();
        assert!(reply.starts_with("Added automation id="));

        let all = svc.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Evening");
        assert!(all[0].next_at.is_some());
    }

    #[tokio::test]
    async fn should_not_touch_store_in_validate_only_mode() {
        let svc = make_service();
        let before = svc.store.count();
        let reply = svc
            .add(add_request("Dry run"), Mode::ValidateOnly)
            .await
            .unwrap();
        assert_eq!(reply, VALIDATED);
        assert_eq!(svc.store.count(), before);
    }

    #[tokio::test]
    async fn should_reject_add_without_name_even_in_validate_mode() {
        let svc = make_service();
        let result = svc.add(add_request(""), Mode::ValidateOnly).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[tokio::test]
    async fn should_reject_add_with_empty_commands() {
        let svc = make_service();
        let mut request = add_request("No commands");
        request.commands = vec!["   ".to_string()];
        let result = svc.add(request, Mode::Apply).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::NoCommands))
        ));
    }

    #[tokio::test]
    async fn should_reject_add_with_malformed_time() {
        let svc = make_service();
        let mut request = add_request("Bad time");
        request.trigger = Trigger::AtTime {
            time: "7pm".to_string(),
            days: None,
        };
        let result = svc.add(request, Mode::ValidateOnly).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::BadTime))
        ));
    }

    #[tokio::test]
    async fn should_reject_add_with_zero_interval() {
        let svc = make_service();
        let mut request = add_request("Zero interval");
        request.trigger = Trigger::Interval { interval_ms: 0 };
        let result = svc.add(request, Mode::Apply).await;
        assert!(matches!(
            result,
            Err(HubError::Validation(ValidationError::BadMillis("intervalms")))
        ));
    }

    #[tokio::test]
    async fn should_reject_add_with_malformed_condition_gate() {
        let svc = make_service();
        let mut request = add_request("Bad gate");
        request.conditions = Some("TEMP ??? 30".to_string());
        let result = svc.add(request, Mode::ValidateOnly).await;
        assert!(matches!(result, Err(HubError::Validation(_))));
        assert_eq!(svc.store.count(), 0);
    }

    #[tokio::test]
    async fn should_reject_add_with_malformed_conditional_command() {
        let svc = make_service();
        let mut request = add_request("Bad chain");
        request.commands = vec!["IF TEMP>30 THEN x ELSE y ELSE z".to_string()];
        let result = svc.add(request, Mode::Apply).await;
        assert!(matches!(result, Err(HubError::Validation(_))));
    }

    #[tokio::test]
    async fn should_replace_existing_automation_when_id_given() {
        let svc = make_service();
        let mut request = add_request("Original");
        request.id = Some(AutomationId::new(42));
        svc.add(request, Mode::Apply).await.unwrap();

        let mut replacement = add_request("Replacement");
        replacement.id = Some(AutomationId::new(42));
        let reply = svc.add(replacement, Mode::Apply).await.unwrap();
        assert!(reply.starts_with("Updated automation id=42"));

        let all = svc.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Replacement");
    }

    // ── enable / disable / delete ──────────────────────────────────

    #[tokio::test]
    async fn should_enable_and_disable_automation() {
        let svc = make_service();
        let mut request = add_request("Toggle me");
        request.id = Some(AutomationId::new(5));
        svc.add(request, Mode::Apply).await.unwrap();

        let reply = svc
            .set_enabled(AutomationId::new(5), false, Mode::Apply)
            .await
            .unwrap();
        assert_eq!(reply, "Disabled automation id=5");
        assert!(!svc.list().await.unwrap()[0].enabled);

        let reply = svc
            .set_enabled(AutomationId::new(5), true, Mode::Apply)
            .await
            .unwrap();
        assert_eq!(reply, "Enabled automation id=5");
        assert!(svc.list().await.unwrap()[0].enabled);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_id() {
        let svc = make_service();
        let result = svc
            .set_enabled(AutomationId::new(404), true, Mode::Apply)
            .await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_delete_automation() {
        let svc = make_service();
        let mut request = add_request("Doomed");
        request.id = Some(AutomationId::new(9));
        svc.add(request, Mode::Apply).await.unwrap();

        let reply = svc.delete(AutomationId::new(9), Mode::Apply).await.unwrap();
        assert_eq!(reply, "Deleted automation id=9");
        assert_eq!(svc.store.count(), 0);
    }

    #[tokio::test]
    async fn should_short_circuit_mutations_in_validate_mode() {
        let svc = make_service();
        assert_eq!(
            svc.delete(AutomationId::new(1), Mode::ValidateOnly)
                .await
                .unwrap(),
            VALIDATED
        );
        assert_eq!(
            svc.set_enabled(AutomationId::new(1), true, Mode::ValidateOnly)
                .await
                .unwrap(),
            VALIDATED
        );
        assert_eq!(svc.sanitize(Mode::ValidateOnly).await.unwrap(), VALIDATED);
        assert_eq!(svc.recompute(Mode::ValidateOnly).await.unwrap(), VALIDATED);
        assert_eq!(
            svc.run(AutomationId::new(1), Mode::ValidateOnly)
                .await
                .unwrap(),
            VALIDATED
        );
    }

    // ── run ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_run_commands_immediately_bypassing_gate() {
        let svc = make_service();
        let mut request = add_request("Manual");
        request.id = Some(AutomationId::new(3));
        // Gate would fail against the empty stub snapshot; manual run
        // bypasses it.
        request.conditions = Some("TEMP>30".to_string());
        request.commands = vec!["one".to_string(), "two".to_string()];
        svc.add(request, Mode::Apply).await.unwrap();

        let reply = svc.run(AutomationId::new(3), Mode::Apply).await.unwrap();
        assert_eq!(reply, "Ran automation id=3 (2 commands)");
        assert_eq!(
            svc.executor.commands.lock().unwrap().clone(),
            vec!["one".to_string(), "two".to_string()]
        );
    }

    // ── sanitize / recompute ───────────────────────────────────────

    #[tokio::test]
    async fn should_report_noop_sanitize() {
        let svc = make_service();
        svc.add(add_request("Clean"), Mode::Apply).await.unwrap();
        let reply = svc.sanitize(Mode::Apply).await.unwrap();
        assert_eq!(reply, "Sanitize: no changes needed");
    }

    #[tokio::test]
    async fn should_report_fixed_duplicates_after_sanitize() {
        let svc = make_service();
        let mut first = add_request("First");
        first.id = Some(AutomationId::new(8));
        svc.add(first, Mode::Apply).await.unwrap();
        // Inject a duplicate directly, as a corrupted store would have it.
        let clone = svc.list().await.unwrap()[0].clone();
        svc.store.doc.lock().unwrap().automations.push(clone);

        let reply = svc.sanitize(Mode::Apply).await.unwrap();
        assert_eq!(reply, "Sanitized automation store: fixed duplicate IDs");

        let all = svc.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].id, all[1].id);
    }

    #[tokio::test]
    async fn should_recompute_next_at_for_enabled_automations_only() {
        let svc = make_service();
        let mut enabled = add_request("Enabled");
        enabled.id = Some(AutomationId::new(1));
        svc.add(enabled, Mode::Apply).await.unwrap();
        let mut disabled = add_request("Disabled");
        disabled.id = Some(AutomationId::new(2));
        disabled.enabled = false;
        svc.add(disabled, Mode::Apply).await.unwrap();

        let reply = svc.recompute(Mode::Apply).await.unwrap();
        assert_eq!(reply, "Recomputed nextAt: 1 succeeded, 0 failed");
    }
}
