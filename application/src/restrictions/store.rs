use std::{collections::HashMap, sync::Arc};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::ports::outgoing::{
    clock::DynClockPort,
    restriction_persistence::{DynRestrictionPersistencePort, PersistedRecord},
};
use domain::restriction::{
    RestrictionCategory, RestrictionEntry, RestrictionKey, RestrictionState, expiry_from_millis,
    expiry_to_millis, format_expiry,
};

/// Expiry map for one restriction category, mirrored to durable storage.
///
/// Entries are only ever added or removed. The lock is held across the durable
/// write so that memory and storage change together and mutations of the same
/// key serialize.
pub struct RestrictionStore {
    category: RestrictionCategory,
    entries: Mutex<HashMap<RestrictionKey, OffsetDateTime>>,
    persistence: DynRestrictionPersistencePort,
    clock: DynClockPort,
}

impl RestrictionStore {
    /// Loads every durable record for `category`. Unparsable records are
    /// skipped with a warning.
    pub async fn load(
        category: RestrictionCategory,
        persistence: DynRestrictionPersistencePort,
        clock: DynClockPort,
    ) -> AppResult<Self> {
        let records = persistence.load_all(category).await?;
        let total = records.len();
        let mut entries = HashMap::with_capacity(total);

        for record in records {
            match RestrictionEntry::from_persisted(&record.key, &record.value) {
                Ok(entry) => {
                    if entries.insert(entry.key, entry.expires_at).is_some() {
                        warn!(
                            category = %category,
                            key = %entry.key,
                            "Duplicate persisted restriction key, keeping the last record"
                        );
                    }
                }
                Err(e) => {
                    let error = AppError::MalformedPersistedEntry {
                        message: format!("{}={}: {}", record.key, record.value, e),
                    };
                    warn!(category = %category, error = %error, "Skipping persisted record");
                }
            }
        }

        info!(
            category = %category,
            loaded = entries.len(),
            skipped = total - entries.len(),
            "Restriction store loaded"
        );

        Ok(Self {
            category,
            entries: Mutex::new(entries),
            persistence,
            clock,
        })
    }

    pub fn category(&self) -> RestrictionCategory {
        self.category
    }

    pub async fn add(&self, key: RestrictionKey, duration: Duration) -> AppResult<RestrictionEntry> {
        if !duration.is_positive() {
            return Err(AppError::ValidationError {
                message: format!("Restriction duration must be positive, got {duration}"),
            });
        }

        let expires_at = self
            .clock
            .now()
            .checked_add(duration)
            .ok_or_else(|| AppError::ValidationError {
                message: format!("Restriction duration {duration} is out of range"),
            })?;
        let expires_at = expiry_from_millis(expiry_to_millis(expires_at))?;

        let mut entries = self.entries.lock().await;
        if entries.contains_key(&key) {
            return Err(AppError::AlreadyRestricted {
                message: format!(
                    "Subject {} already has an active {} in scope {}",
                    key.subject_id, self.category, key.scope_id
                ),
            });
        }

        let record = PersistedRecord::new(key.to_string(), format_expiry(expires_at));
        self.persistence.persist(self.category, &record).await?;
        entries.insert(key, expires_at);

        debug!(category = %self.category, key = %key, "Restriction added");
        Ok(RestrictionEntry::new(key, expires_at))
    }

    /// Returns whether an entry was actually removed. Removing an absent key
    /// succeeds so racing removers never see an error.
    pub async fn remove(&self, key: RestrictionKey) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(&key) {
            return Ok(false);
        }

        self.persistence
            .erase(self.category, &key.to_string())
            .await?;
        entries.remove(&key);

        debug!(category = %self.category, key = %key, "Restriction removed");
        Ok(true)
    }

    /// Removes `key` only while it still expires at `expected_expires_at`.
    /// Returns `false` when the entry is gone or was replaced by a newer one.
    pub async fn remove_if(
        &self,
        key: RestrictionKey,
        expected_expires_at: OffsetDateTime,
    ) -> AppResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries.get(&key) != Some(&expected_expires_at) {
            return Ok(false);
        }

        self.persistence
            .erase(self.category, &key.to_string())
            .await?;
        entries.remove(&key);

        debug!(category = %self.category, key = %key, "Restriction removed");
        Ok(true)
    }

    pub async fn has(&self, key: RestrictionKey) -> bool {
        self.entries.lock().await.contains_key(&key)
    }

    pub async fn get(&self, key: RestrictionKey) -> AppResult<OffsetDateTime> {
        self.entries
            .lock()
            .await
            .get(&key)
            .copied()
            .ok_or_else(|| AppError::NotFound {
                message: format!("No {} restriction for {}", self.category, key),
            })
    }

    pub async fn entry(&self, key: RestrictionKey) -> Option<RestrictionEntry> {
        self.entries
            .lock()
            .await
            .get(&key)
            .map(|expires_at| RestrictionEntry::new(key, *expires_at))
    }

    pub async fn state(&self, key: RestrictionKey, now: OffsetDateTime) -> RestrictionState {
        let expires_at = self.entries.lock().await.get(&key).copied();
        RestrictionState::derive(expires_at, now)
    }

    /// Point-in-time copy ordered by expiry, safe to iterate while the store
    /// keeps changing.
    pub async fn snapshot(&self) -> Vec<RestrictionEntry> {
        let mut snapshot: Vec<RestrictionEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .map(|(key, expires_at)| RestrictionEntry::new(*key, *expires_at))
            .collect();
        snapshot.sort_by_key(|entry| (entry.expires_at, entry.key));
        snapshot
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// One store per restriction category, loaded together at startup.
#[derive(Clone)]
pub struct RestrictionStores {
    mutes: Arc<RestrictionStore>,
    bans: Arc<RestrictionStore>,
}

impl RestrictionStores {
    pub async fn load(
        persistence: &DynRestrictionPersistencePort,
        clock: &DynClockPort,
    ) -> AppResult<Self> {
        let mutes = RestrictionStore::load(
            RestrictionCategory::Mute,
            Arc::clone(persistence),
            Arc::clone(clock),
        )
        .await?;
        let bans = RestrictionStore::load(
            RestrictionCategory::Ban,
            Arc::clone(persistence),
            Arc::clone(clock),
        )
        .await?;

        Ok(Self {
            mutes: Arc::new(mutes),
            bans: Arc::new(bans),
        })
    }

    pub fn get(&self, category: RestrictionCategory) -> &Arc<RestrictionStore> {
        match category {
            RestrictionCategory::Mute => &self.mutes,
            RestrictionCategory::Ban => &self.bans,
        }
    }

    pub fn all(&self) -> Vec<Arc<RestrictionStore>> {
        vec![Arc::clone(&self.mutes), Arc::clone(&self.bans)]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryPersistence, ManualClock, key, start};

    async fn store_with(
        persistence: &Arc<InMemoryPersistence>,
        clock: &Arc<ManualClock>,
    ) -> RestrictionStore {
        RestrictionStore::load(
            RestrictionCategory::Mute,
            Arc::clone(persistence) as DynRestrictionPersistencePort,
            Arc::clone(clock) as DynClockPort,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn add_sets_expiry_from_now_and_persists_it() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;

        let entry = store.add(key(42, 7), Duration::minutes(2)).await.unwrap();

        assert_eq!(entry.expires_at, start() + Duration::minutes(2));
        assert!(store.has(key(42, 7)).await);
        assert_eq!(store.get(key(42, 7)).await.unwrap(), entry.expires_at);
        assert_eq!(
            persistence.record(RestrictionCategory::Mute, "42,7"),
            Some(format_expiry(entry.expires_at))
        );
    }

    #[tokio::test]
    async fn duplicate_add_is_rejected_without_touching_expiry() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;

        let first = store.add(key(42, 7), Duration::minutes(2)).await.unwrap();
        let second = store.add(key(42, 7), Duration::hours(5)).await;

        assert!(matches!(second, Err(AppError::AlreadyRestricted { .. })));
        assert_eq!(store.get(key(42, 7)).await.unwrap(), first.expires_at);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn non_positive_duration_is_rejected() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;

        assert!(matches!(
            store.add(key(1, 1), Duration::ZERO).await,
            Err(AppError::ValidationError { .. })
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;
        store.add(key(42, 7), Duration::minutes(2)).await.unwrap();

        assert!(store.remove(key(42, 7)).await.unwrap());
        assert!(!store.has(key(42, 7)).await);
        assert!(!store.remove(key(42, 7)).await.unwrap());
        assert_eq!(persistence.record(RestrictionCategory::Mute, "42,7"), None);
        assert!(matches!(
            store.get(key(42, 7)).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn conditional_remove_spares_a_replaced_entry() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;
        let stale = store.add(key(42, 7), Duration::minutes(2)).await.unwrap();

        store.remove(key(42, 7)).await.unwrap();
        clock.advance(Duration::minutes(1));
        let fresh = store.add(key(42, 7), Duration::minutes(10)).await.unwrap();

        assert!(!store.remove_if(key(42, 7), stale.expires_at).await.unwrap());
        assert_eq!(store.get(key(42, 7)).await.unwrap(), fresh.expires_at);
        assert_eq!(
            persistence.record(RestrictionCategory::Mute, "42,7"),
            Some(format_expiry(fresh.expires_at))
        );

        assert!(store.remove_if(key(42, 7), fresh.expires_at).await.unwrap());
        assert!(!store.has(key(42, 7)).await);
        assert!(!store.remove_if(key(42, 7), fresh.expires_at).await.unwrap());
    }

    #[tokio::test]
    async fn failed_flush_leaves_memory_unchanged() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;
        store.add(key(1, 1), Duration::minutes(1)).await.unwrap();

        persistence.set_fail_writes(true);
        assert!(store.add(key(2, 1), Duration::minutes(1)).await.is_err());
        assert!(store.remove(key(1, 1)).await.is_err());

        assert!(!store.has(key(2, 1)).await);
        assert!(store.has(key(1, 1)).await);
    }

    #[tokio::test]
    async fn load_skips_malformed_records() {
        let persistence = Arc::new(InMemoryPersistence::with_records(
            RestrictionCategory::Mute,
            &[
                ("42,7", "1714566600250"),
                ("not-a-key", "1714566600250"),
                ("43,7", "1714566700000"),
                ("44,7", "tomorrow"),
            ],
        ));
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;

        assert_eq!(store.len().await, 2);
        assert!(store.has(key(42, 7)).await);
        assert!(store.has(key(43, 7)).await);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_mutation() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = store_with(&persistence, &clock).await;
        store.add(key(1, 1), Duration::minutes(5)).await.unwrap();
        store.add(key(2, 1), Duration::minutes(1)).await.unwrap();

        let snapshot = store.snapshot().await;
        store.remove(key(1, 1)).await.unwrap();
        store.add(key(3, 1), Duration::minutes(3)).await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, key(2, 1));
        assert_eq!(snapshot[1].key, key(1, 1));
    }

    #[tokio::test]
    async fn concurrent_mutations_on_distinct_keys_all_land() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(store_with(&persistence, &clock).await);

        for subject in 0..20 {
            store.add(key(subject, 9), Duration::minutes(1)).await.unwrap();
        }

        let mut handles = Vec::new();
        for subject in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.remove(key(subject, 9)).await.unwrap();
                store.add(key(subject + 100, 9), Duration::minutes(1)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 20);
        assert!(!store.has(key(5, 9)).await);
        assert!(store.has(key(105, 9)).await);
        assert_eq!(persistence.count(RestrictionCategory::Mute), 20);
    }

    #[tokio::test]
    async fn racing_removers_on_one_key_both_succeed() {
        let persistence = Arc::new(InMemoryPersistence::default());
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(store_with(&persistence, &clock).await);
        store.add(key(42, 7), Duration::minutes(1)).await.unwrap();

        let (a, b) = tokio::join!(store.remove(key(42, 7)), store.remove(key(42, 7)));

        let removed = [a.unwrap(), b.unwrap()];
        assert_eq!(removed.iter().filter(|r| **r).count(), 1);
        assert!(!store.has(key(42, 7)).await);
    }
}
