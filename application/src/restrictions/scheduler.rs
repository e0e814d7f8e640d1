use futures::{StreamExt, stream};
use rand::Rng;
use std::{collections::HashMap, sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::{
    sync::{Mutex, watch},
    time::sleep,
};
use tracing::{debug, error, info, warn};

use super::{executor::ActionExecutor, store::RestrictionStore};
use crate::error::AppError;
use crate::ports::outgoing::clock::DynClockPort;
use domain::restriction::{RestrictionCategory, RestrictionEntry, RestrictionKey};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    /// Upper bound on entries lifted concurrently within one tick.
    pub max_concurrency: usize,
    /// Random delay in `[0, max_jitter]` before each external call.
    pub max_jitter: Duration,
    /// Drop an entry after this many consecutive resolution failures.
    /// `None` retries forever.
    pub max_resolution_failures: Option<u32>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_concurrency: 8,
            max_jitter: Duration::ZERO,
            max_resolution_failures: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub examined: usize,
    pub expired: usize,
    pub lifted: usize,
    pub deferred: usize,
    pub force_removed: usize,
    /// Entries removed or replaced by someone else while this tick held them.
    pub superseded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Lifted,
    Deferred,
    ForceRemoved,
    Superseded,
}

/// Periodic sweep over one category's store.
///
/// Each tick lifts every entry whose expiry is at or before the tick's `now`
/// and waits for all of them before the loop sleeps again, so an entry is
/// handled at most once per interval. Entries whose lift fails stay in the
/// store and are retried on the next tick. Removal is conditional on the
/// expiry the tick saw, so a restriction re-created mid-lift survives.
pub struct ExpiryScheduler {
    store: Arc<RestrictionStore>,
    executor: Arc<ActionExecutor>,
    clock: DynClockPort,
    settings: SchedulerSettings,
    /// Consecutive resolution failures, tied to the expiry they were counted for.
    resolution_failures: Mutex<HashMap<RestrictionKey, (OffsetDateTime, u32)>>,
}

impl ExpiryScheduler {
    pub fn new(
        store: Arc<RestrictionStore>,
        executor: Arc<ActionExecutor>,
        clock: DynClockPort,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            executor,
            clock,
            settings,
            resolution_failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn category(&self) -> RestrictionCategory {
        self.store.category()
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped. The
    /// signal is only observed between ticks; a running tick always finishes.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            category = %self.category(),
            interval_secs = self.settings.interval.as_secs_f64(),
            max_concurrency = self.settings.max_concurrency,
            "Expiry scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                () = sleep(self.settings.interval) => {}
            }

            let report = self.tick().await;
            if report.expired > 0 {
                info!(
                    category = %self.category(),
                    examined = report.examined,
                    expired = report.expired,
                    lifted = report.lifted,
                    deferred = report.deferred,
                    force_removed = report.force_removed,
                    superseded = report.superseded,
                    "Expiry sweep finished"
                );
            } else {
                debug!(
                    category = %self.category(),
                    examined = report.examined,
                    "Expiry sweep found nothing to lift"
                );
            }
        }

        info!(category = %self.category(), "Expiry scheduler stopped");
    }

    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let snapshot = self.store.snapshot().await;
        self.prune_resolution_failures(&snapshot).await;

        let mut report = TickReport {
            examined: snapshot.len(),
            ..TickReport::default()
        };

        let expired: Vec<RestrictionEntry> = snapshot
            .into_iter()
            .filter(|entry| entry.is_expired_at(now))
            .collect();
        report.expired = expired.len();

        if expired.is_empty() {
            return report;
        }

        let outcomes: Vec<EntryOutcome> = stream::iter(expired)
            .map(|entry| self.process_entry(entry))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                EntryOutcome::Lifted => report.lifted += 1,
                EntryOutcome::Deferred => report.deferred += 1,
                EntryOutcome::ForceRemoved => report.force_removed += 1,
                EntryOutcome::Superseded => report.superseded += 1,
            }
        }

        report
    }

    async fn process_entry(&self, entry: RestrictionEntry) -> EntryOutcome {
        self.wait_jitter().await;

        let category = self.category();
        if self.store.entry(entry.key).await != Some(entry) {
            debug!(category = %category, key = %entry.key, "Entry changed before lift, skipping");
            return EntryOutcome::Superseded;
        }

        match self.executor.lift(category, &entry).await {
            Ok(()) => {
                self.reset_resolution_failures(entry.key).await;
                match self.store.remove_if(entry.key, entry.expires_at).await {
                    Ok(true) => {
                        info!(category = %category, key = %entry.key, "Expired restriction lifted");
                        EntryOutcome::Lifted
                    }
                    Ok(false) => {
                        self.reapply_replacement(entry.key).await;
                        EntryOutcome::Superseded
                    }
                    Err(e) => {
                        error!(
                            category = %category,
                            key = %entry.key,
                            error = %e,
                            "Restriction lifted but entry removal failed, retrying next tick"
                        );
                        EntryOutcome::Deferred
                    }
                }
            }
            Err(e @ AppError::ResolutionFailure { .. }) => {
                self.handle_resolution_failure(entry, &e).await
            }
            Err(e) => {
                self.reset_resolution_failures(entry.key).await;
                if e.is_transient() {
                    warn!(
                        category = %category,
                        key = %entry.key,
                        error = %e,
                        "Failed to lift expired restriction, retrying next tick"
                    );
                } else {
                    error!(
                        category = %category,
                        key = %entry.key,
                        error = %e,
                        "Unexpected error lifting expired restriction, retrying next tick"
                    );
                }
                EntryOutcome::Deferred
            }
        }
    }

    /// The lift raced a re-creation of the same key, so the platform side of
    /// the new restriction may have just been undone.
    async fn reapply_replacement(&self, key: RestrictionKey) {
        let category = self.category();
        let now = self.clock.now();
        let Some(fresh) = self.store.entry(key).await else {
            debug!(category = %category, key = %key, "Entry removed during lift");
            return;
        };
        if fresh.is_expired_at(now) {
            return;
        }

        let remaining = fresh.remaining_at(now);
        match self
            .executor
            .apply(category, key.subject_id, key.scope_id, remaining)
            .await
        {
            Ok(()) => info!(
                category = %category,
                key = %key,
                "Restriction replaced during lift, re-applied"
            ),
            Err(e) => error!(
                category = %category,
                key = %key,
                error = %e,
                "Restriction replaced during lift and could not be re-applied"
            ),
        }
    }

    async fn handle_resolution_failure(
        &self,
        entry: RestrictionEntry,
        error: &AppError,
    ) -> EntryOutcome {
        let category = self.category();
        let failures = {
            let mut counters = self.resolution_failures.lock().await;
            let counter = counters.entry(entry.key).or_insert((entry.expires_at, 0));
            if counter.0 != entry.expires_at {
                *counter = (entry.expires_at, 0);
            }
            counter.1 = counter.1.saturating_add(1);
            counter.1
        };

        match self.settings.max_resolution_failures {
            Some(limit) if failures >= limit => {
                match self.store.remove_if(entry.key, entry.expires_at).await {
                    Ok(removed) => {
                        self.reset_resolution_failures(entry.key).await;
                        if !removed {
                            return EntryOutcome::Superseded;
                        }
                        warn!(
                            category = %category,
                            key = %entry.key,
                            failures,
                            error = %error,
                            "Dropping restriction that could not be resolved"
                        );
                        EntryOutcome::ForceRemoved
                    }
                    Err(e) => {
                        error!(
                            category = %category,
                            key = %entry.key,
                            error = %e,
                            "Failed to drop unresolvable restriction, retrying next tick"
                        );
                        EntryOutcome::Deferred
                    }
                }
            }
            _ => {
                warn!(
                    category = %category,
                    key = %entry.key,
                    failures,
                    error = %error,
                    "Restriction target could not be resolved, retrying next tick"
                );
                EntryOutcome::Deferred
            }
        }
    }

    async fn reset_resolution_failures(&self, key: RestrictionKey) {
        self.resolution_failures.lock().await.remove(&key);
    }

    /// Forgets counters for entries that were removed or replaced elsewhere.
    async fn prune_resolution_failures(&self, snapshot: &[RestrictionEntry]) {
        let live: HashMap<RestrictionKey, OffsetDateTime> = snapshot
            .iter()
            .map(|entry| (entry.key, entry.expires_at))
            .collect();
        self.resolution_failures
            .lock()
            .await
            .retain(|key, (expires_at, _)| live.get(key) == Some(expires_at));
    }

    async fn wait_jitter(&self) {
        let max_millis = u64::try_from(self.settings.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max_millis == 0 {
            return;
        }

        let delay = rand::rng().random_range(0..=max_millis);
        sleep(Duration::from_millis(delay)).await;
    }
}
