use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{executor::ActionExecutor, store::RestrictionStore};
use crate::error::AppResult;
use crate::ports::incoming::rejoin::{RejoinDecision, RejoinOutcome, RejoinUseCase};
use crate::ports::outgoing::clock::DynClockPort;
use domain::events::MemberRejoinedEvent;
use domain::restriction::RestrictionKey;

/// Re-enforces restrictions that a member tried to shed by leaving and
/// rejoining a scope, and clears the ones that expired while they were away.
pub struct RejoinGuard {
    stores: Vec<Arc<RestrictionStore>>,
    executor: Arc<ActionExecutor>,
    clock: DynClockPort,
}

impl RejoinGuard {
    pub fn new(
        stores: Vec<Arc<RestrictionStore>>,
        executor: Arc<ActionExecutor>,
        clock: DynClockPort,
    ) -> Self {
        Self {
            stores,
            executor,
            clock,
        }
    }

    async fn evaluate(
        &self,
        store: &RestrictionStore,
        key: RestrictionKey,
    ) -> AppResult<RejoinDecision> {
        let Some(mut entry) = store.entry(key).await else {
            return Ok(RejoinDecision::NoEntry);
        };

        let category = store.category();
        let now = self.clock.now();

        if entry.is_expired_at(now) {
            self.executor.lift(category, &entry).await?;
            if store.remove_if(key, entry.expires_at).await? {
                info!(category = %category, key = %key, "Expired restriction cleared on rejoin");
                return Ok(RejoinDecision::Lifted);
            }

            // Re-created while the lift was in flight; enforce the new one.
            match store.entry(key).await {
                Some(fresh) if !fresh.is_expired_at(now) => {
                    debug!(category = %category, key = %key, "Entry replaced while clearing on rejoin");
                    entry = fresh;
                }
                _ => return Ok(RejoinDecision::Lifted),
            }
        }

        let remaining = entry.remaining_at(now);
        self.executor
            .apply(category, key.subject_id, key.scope_id, remaining)
            .await?;
        info!(
            category = %category,
            key = %key,
            remaining_secs = remaining.whole_seconds(),
            "Restriction re-applied on rejoin"
        );
        Ok(RejoinDecision::Reapplied {
            expires_at: entry.expires_at,
        })
    }
}

#[async_trait::async_trait]
impl RejoinUseCase for RejoinGuard {
    #[instrument(skip(self), fields(subject = %event.subject_id, scope = %event.scope_id))]
    async fn handle_member_rejoin(&self, event: MemberRejoinedEvent) -> Vec<RejoinOutcome> {
        let key = event.key();
        let mut outcomes = Vec::with_capacity(self.stores.len());

        for store in &self.stores {
            let decision = match self.evaluate(store, key).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(
                        category = %store.category(),
                        key = %key,
                        error = %e,
                        "Rejoin enforcement failed, leaving entry in place"
                    );
                    RejoinDecision::Deferred
                }
            };

            outcomes.push(RejoinOutcome {
                category: store.category(),
                decision,
            });
        }

        outcomes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::ports::outgoing::{
        moderation_api::DynModerationApiPort, platform_directory::DynPlatformDirectoryPort,
        restriction_persistence::DynRestrictionPersistencePort,
    };
    use crate::testing::{
        FakeDirectory, InMemoryPersistence, ManualClock, ModerationCall, RecordingModerationApi,
        key, start,
    };
    use domain::restriction::{RestrictionCategory, ScopeId, SubjectId};
    use time::Duration;

    struct Harness {
        clock: Arc<ManualClock>,
        api: Arc<RecordingModerationApi>,
        mutes: Arc<RestrictionStore>,
        bans: Arc<RestrictionStore>,
        guard: RejoinGuard,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(start()));
        let api = Arc::new(RecordingModerationApi::default());
        let persistence = Arc::new(InMemoryPersistence::default());

        let mut stores = Vec::new();
        for category in RestrictionCategory::ALL {
            stores.push(Arc::new(
                RestrictionStore::load(
                    category,
                    Arc::clone(&persistence) as DynRestrictionPersistencePort,
                    Arc::clone(&clock) as DynClockPort,
                )
                .await
                .unwrap(),
            ));
        }
        let mutes = Arc::clone(&stores[0]);
        let bans = Arc::clone(&stores[1]);

        let executor = Arc::new(ActionExecutor::new(
            Arc::clone(&api) as DynModerationApiPort,
            Arc::new(FakeDirectory::default()) as DynPlatformDirectoryPort,
        ));
        let guard = RejoinGuard::new(stores, executor, Arc::clone(&clock) as DynClockPort);

        Harness {
            clock,
            api,
            mutes,
            bans,
            guard,
        }
    }

    fn decision_for(outcomes: &[RejoinOutcome], category: RestrictionCategory) -> RejoinDecision {
        outcomes
            .iter()
            .find(|outcome| outcome.category == category)
            .map(|outcome| outcome.decision)
            .unwrap()
    }

    fn rejoin(subject: u64, scope: u64) -> MemberRejoinedEvent {
        MemberRejoinedEvent::new(SubjectId(subject), ScopeId(scope))
    }

    #[tokio::test]
    async fn rejoin_without_entries_is_a_no_op() {
        let h = harness().await;

        let outcomes = h.guard.handle_member_rejoin(rejoin(42, 7)).await;

        assert_eq!(outcomes.len(), 2);
        assert!(
            outcomes
                .iter()
                .all(|outcome| outcome.decision == RejoinDecision::NoEntry)
        );
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn clearing_an_expired_mute_spares_one_recreated_meanwhile() {
        let h = harness().await;
        h.mutes.add(key(42, 7), Duration::minutes(1)).await.unwrap();
        h.clock.advance(Duration::minutes(2));
        let gate = h.api.gate_unmutes();

        let (outcomes, fresh) = tokio::join!(h.guard.handle_member_rejoin(rejoin(42, 7)), async {
            gate.entered.notified().await;
            h.mutes.remove(key(42, 7)).await.unwrap();
            let fresh = h.mutes.add(key(42, 7), Duration::minutes(10)).await.unwrap();
            gate.release.notify_one();
            fresh
        });

        assert_eq!(h.mutes.get(key(42, 7)).await.unwrap(), fresh.expires_at);
        assert_eq!(
            decision_for(&outcomes, RestrictionCategory::Mute),
            RejoinDecision::Reapplied {
                expires_at: fresh.expires_at
            }
        );
        assert!(matches!(
            h.api.calls().last(),
            Some(ModerationCall::Mute {
                subject: SubjectId(42),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn active_mute_is_reapplied_once_per_rejoin() {
        let h = harness().await;
        let entry = h.mutes.add(key(42, 7), Duration::minutes(10)).await.unwrap();
        h.clock.advance(Duration::minutes(4));

        let outcomes = h.guard.handle_member_rejoin(rejoin(42, 7)).await;

        assert_eq!(
            decision_for(&outcomes, RestrictionCategory::Mute),
            RejoinDecision::Reapplied {
                expires_at: entry.expires_at
            }
        );
        assert_eq!(
            h.api.calls(),
            vec![ModerationCall::Mute {
                subject: SubjectId(42),
                scope: ScopeId(7),
                reason: "Muted for 6 minute(s)".to_string(),
            }]
        );
        assert!(h.mutes.has(key(42, 7)).await);
    }

    #[tokio::test]
    async fn expired_mute_is_cleared_on_rejoin() {
        let h = harness().await;
        h.mutes.add(key(42, 7), Duration::minutes(10)).await.unwrap();
        h.clock.advance(Duration::minutes(11));

        let outcomes = h.guard.handle_member_rejoin(rejoin(42, 7)).await;

        assert_eq!(
            decision_for(&outcomes, RestrictionCategory::Mute),
            RejoinDecision::Lifted
        );
        assert_eq!(
            h.api.calls(),
            vec![ModerationCall::Unmute {
                subject: SubjectId(42),
                scope: ScopeId(7)
            }]
        );
        assert!(!h.mutes.has(key(42, 7)).await);
    }

    #[tokio::test]
    async fn active_ban_is_reapplied_after_external_unban() {
        let h = harness().await;
        h.bans.add(key(42, 7), Duration::days(1)).await.unwrap();

        let outcomes = h.guard.handle_member_rejoin(rejoin(42, 7)).await;

        assert!(matches!(
            decision_for(&outcomes, RestrictionCategory::Ban),
            RejoinDecision::Reapplied { .. }
        ));
        assert_eq!(h.api.bans(ScopeId(7)).len(), 1);
    }

    #[tokio::test]
    async fn failed_reapply_is_deferred_and_keeps_entry() {
        let h = harness().await;
        h.mutes.add(key(42, 7), Duration::minutes(10)).await.unwrap();
        h.clock.advance(Duration::minutes(20));
        h.api.set_failing(true);

        let outcomes = h.guard.handle_member_rejoin(rejoin(42, 7)).await;

        assert_eq!(
            decision_for(&outcomes, RestrictionCategory::Mute),
            RejoinDecision::Deferred
        );
        assert!(h.mutes.has(key(42, 7)).await);
    }
}
