//! Automation engine — the scheduler that decides due-ness and fires rules.
//!
//! The engine owns everything a pass needs: the store handle, a bounded
//! memo cache of persisted `next_at` values, and transient per-pass state.
//! The store is always canonical; the memo is only a fast path.
//!
//! Each pass streams the store without materializing it, skips corrupt and
//! disabled entries, lazily backfills missing `next_at` values, and fires
//! due automations **fire-and-continue**: one command failing never halts
//! the remaining commands, and one automation failing never halts the pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, TimeZone};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use rulehub_domain::automation::{Automation, Trigger, schedule};
use rulehub_domain::condition::{self, ConditionChain};
use rulehub_domain::id::AutomationId;
use rulehub_domain::time;

use crate::ports::{AutomationStore, CommandExecutor, CommandOutcome, SensorReader};

/// Capacity of the `next_at` memo cache.
const MEMO_CAPACITY: usize = 128;

/// Capacity of the per-pass seen-id set used for live duplicate detection.
const SEEN_CAPACITY: usize = 128;

/// Minimum spacing between store sanitize runs triggered by live duplicate
/// detection.
const SANITIZE_DEBOUNCE: Duration = Duration::from_secs(5);

/// What one scheduler pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// Automations considered this pass.
    pub evaluated: usize,
    /// Automations whose commands actually ran.
    pub executed: usize,
    /// Whether a deferred sanitize ran and changed the store.
    pub sanitized: bool,
}

/// Bounded fast-path cache of persisted `next_at` values.
///
/// Once full, further entries are silently not recorded — the store stays
/// canonical and the scheduler just recomputes more often.
#[derive(Debug, Default)]
struct NextAtMemo {
    entries: Vec<(AutomationId, i64)>,
}

impl NextAtMemo {
    fn get(&self, id: AutomationId) -> Option<i64> {
        self.entries
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, next_at)| *next_at)
    }

    fn record(&mut self, id: AutomationId, next_at: i64) {
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == id) {
            entry.1 = next_at;
        } else if self.entries.len() < MEMO_CAPACITY {
            self.entries.push((id, next_at));
        }
    }

    fn forget(&mut self, id: AutomationId) {
        self.entries.retain(|(key, _)| *key != id);
    }
}

/// Transient per-pass bookkeeping.
#[derive(Debug)]
struct PassState {
    seen: Vec<AutomationId>,
    evaluated: usize,
    executed: usize,
    queue_sanitize: bool,
}

impl PassState {
    fn new() -> Self {
        Self {
            seen: Vec::new(),
            evaluated: 0,
            executed: 0,
            queue_sanitize: false,
        }
    }
}

/// Scheduler context object owning the store handle, memo cache, and pass
/// state.
pub struct AutomationEngine<S, X, R> {
    store: S,
    executor: X,
    sensors: R,
    memo: NextAtMemo,
    last_sanitize: Option<Instant>,
    booted: bool,
}

impl<S, X, R> AutomationEngine<S, X, R>
where
    S: AutomationStore,
    X: CommandExecutor,
    R: SensorReader,
{
    /// Create a new engine over the given collaborators.
    pub fn new(store: S, executor: X, sensors: R) -> Self {
        Self {
            store,
            executor,
            sensors,
            memo: NextAtMemo::default(),
            last_sanitize: None,
            booted: false,
        }
    }

    /// Run the scheduler loop: one pass per tick, plus an immediate pass
    /// whenever `wake` is notified after an external mutation.
    pub async fn run(mut self, tick: Duration, wake: Arc<Notify>) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_secs = tick.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = wake.notified() => {}
            }
            let summary = self.run_pass(time::now()).await;
            debug!(
                evaluated = summary.evaluated,
                executed = summary.executed,
                "scheduler pass complete"
            );
        }
    }

    /// Fire every `enabled && run_at_boot` automation once at startup by
    /// deferring it through the normal scheduler primitive: its `next_at`
    /// becomes `now + boot_delay`, and the next due-check fires it. No
    /// blocking sleeps serialize unrelated boot work.
    ///
    /// Returns how many automations were deferred. Runs once per engine.
    pub async fn run_boot_pass(&mut self, now: i64) -> usize {
        if self.booted {
            return 0;
        }
        self.booted = true;

        let doc = match self.store.load().await {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "boot pass could not load the store");
                return 0;
            }
        };

        let mut deferred = 0;
        for auto in &doc.automations {
            if !auto.id.is_valid() || !auto.enabled || !auto.run_at_boot {
                continue;
            }
            let delay_secs =
                i64::try_from(auto.boot_delay_ms.unwrap_or(0) / 1000).unwrap_or_default();
            let at = now + delay_secs;
            self.persist_next_at(auto.id, Some(at)).await;
            info!(id = %auto.id, name = %auto.name, next_at = at, "deferred boot automation");
            deferred += 1;
        }
        deferred
    }

    /// One scheduler pass over the whole store at instant `now`.
    pub async fn run_pass(&mut self, now: i64) -> PassSummary {
        let mut state = PassState::new();
        let mut due: Vec<Automation> = Vec::new();
        let mut backfill: Vec<Automation> = Vec::new();

        let Self { store, memo, .. } = &*self;
        let mut visit = |object: &str| -> bool {
            let Ok(auto) = serde_json::from_str::<Automation>(object) else {
                debug!("skipping unparseable automation object");
                return true;
            };
            // Zero ids mark corrupt or half-written entries.
            if !auto.id.is_valid() {
                return true;
            }
            if state.seen.contains(&auto.id) {
                warn!(id = %auto.id, "duplicate automation id detected; queuing sanitize");
                state.queue_sanitize = true;
                return true;
            }
            if state.seen.len() < SEEN_CAPACITY {
                state.seen.push(auto.id);
            }
            state.evaluated += 1;

            if !auto.enabled {
                debug!(id = %auto.id, "skip: disabled");
                return true;
            }

            let next_at = auto
                .next_at
                .filter(|&t| t > 0)
                .or_else(|| memo.get(auto.id).filter(|&t| t > 0));
            match next_at {
                Some(at) if now >= at => due.push(auto),
                Some(at) => debug!(id = %auto.id, next_at = at, "wait: not due"),
                None => backfill.push(auto),
            }
            true
        };
        if let Err(err) = store.for_each_raw(&mut visit).await {
            warn!(error = %err, "scheduler pass could not read the store");
            return PassSummary::default();
        }

        // Lazily backfill missing next-run times and persist immediately.
        for auto in backfill {
            let Some(next) = compute_next(&auto.trigger, now) else {
                debug!(id = %auto.id, trigger = %auto.trigger, "could not compute a next run time");
                continue;
            };
            self.persist_next_at(auto.id, Some(next)).await;
            debug!(id = %auto.id, next_at = next, "backfilled missing next run time");
            if now >= next {
                due.push(auto);
            }
        }

        for auto in due {
            self.fire(&auto, now, &mut state).await;
        }

        let mut sanitized = false;
        if state.queue_sanitize {
            sanitized = self.maybe_sanitize().await;
        }

        PassSummary {
            evaluated: state.evaluated,
            executed: state.executed,
            sanitized,
        }
    }

    /// Fire one due automation: condition gate, commands in order, then
    /// reschedule.
    async fn fire(&mut self, auto: &Automation, now: i64, state: &mut PassState) {
        if auto.commands.iter().all(|c| c.trim().is_empty()) {
            debug!(id = %auto.id, "skip: no commands found");
            return;
        }

        // The gate not holding is not a miss: next_at stays put and the
        // automation is retried on the next pass.
        if let Some(gate) = auto.conditions.as_deref() {
            if !gate.trim().is_empty() {
                let snapshot = self.sensors.snapshot().await;
                if !condition::gate_passes(gate, &snapshot) {
                    debug!(id = %auto.id, condition = gate, "skip: condition gate not met");
                    return;
                }
            }
        }

        info!(id = %auto.id, name = %auto.name, "firing automation");
        for command in &auto.commands {
            if let Some(outcome) =
                dispatch_command(&self.executor, &self.sensors, command).await
            {
                if outcome.success {
                    debug!(id = %auto.id, command = %outcome.command, "command ok");
                } else {
                    warn!(
                        id = %auto.id,
                        command = %outcome.command,
                        output = %outcome.output,
                        "command failed; continuing"
                    );
                }
            }
        }
        state.executed += 1;

        match compute_next(&auto.trigger, now) {
            Some(next) => self.persist_next_at(auto.id, Some(next)).await,
            None => {
                // Exhausted day horizon or a one-shot trigger; clearing
                // next_at stops the automation from firing again.
                debug!(id = %auto.id, trigger = %auto.trigger, "trigger produced no next run time; unscheduling");
                self.persist_next_at(auto.id, None).await;
            }
        }
    }

    async fn persist_next_at(&mut self, id: AutomationId, next_at: Option<i64>) {
        if let Err(err) = self.store.update_next_at(id, next_at).await {
            warn!(id = %id, error = %err, "failed to persist next run time");
        }
        match next_at {
            Some(at) => self.memo.record(id, at),
            None => self.memo.forget(id),
        }
    }

    /// Deferred sanitize after live duplicate detection, debounced so a
    /// persistently corrupt store does not thrash rewrites.
    async fn maybe_sanitize(&mut self) -> bool {
        if let Some(last) = self.last_sanitize {
            if last.elapsed() < SANITIZE_DEBOUNCE {
                debug!("sanitize skipped (debounced)");
                return false;
            }
        }
        self.last_sanitize = Some(Instant::now());
        match self.store.sanitize().await {
            Ok(true) => {
                info!("sanitize resolved duplicate automation ids");
                true
            }
            Ok(false) => {
                debug!("sanitize found no duplicates");
                false
            }
            Err(err) => {
                warn!(error = %err, "sanitize failed");
                false
            }
        }
    }
}

/// Map a trigger to its next epoch-second fire instant, from `now` in the
/// local time zone. `None` means the trigger cannot currently be scheduled.
fn compute_next(trigger: &Trigger, now: i64) -> Option<i64> {
    let from = Local.timestamp_opt(now, 0).single()?;
    schedule::next_run_time(trigger, &from).map(|at| at.timestamp())
}

/// Dispatch one automation command.
///
/// A command that is itself a conditional chain is evaluated against a
/// fresh sensor snapshot and only the selected branch's action is
/// dispatched. Empty and malformed commands are skipped, never fatal.
pub async fn dispatch_command<X, R>(
    executor: &X,
    sensors: &R,
    command: &str,
) -> Option<CommandOutcome>
where
    X: CommandExecutor,
    R: SensorReader,
{
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if upper == "ELSE" || upper.starts_with("ELSE ") {
        warn!(command = trimmed, "'ELSE' cannot stand alone outside a conditional chain");
        return None;
    }
    if upper.starts_with("IF ") && upper.contains(" THEN ") {
        match ConditionChain::parse(trimmed) {
            Ok(chain) => {
                let snapshot = sensors.snapshot().await;
                match chain.evaluate(&snapshot) {
                    Some(action) => Some(executor.execute(&action).await),
                    None => {
                        debug!(command = trimmed, "no conditional branch selected");
                        None
                    }
                }
            }
            Err(err) => {
                warn!(command = trimmed, error = %err, "skipping malformed conditional command");
                None
            }
        }
    } else {
        Some(executor.execute(trimmed).await)
    }
}
