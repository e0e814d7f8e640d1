use std::sync::Arc;

use crate::error::AppResult;
use domain::restriction::RestrictionCategory;

/// One raw durable record: `"<subject>,<scope>"` mapped to epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedRecord {
    pub key: String,
    pub value: String,
}

impl PersistedRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Durable mirror of a restriction store. Records are handed back raw so the
/// store decides what counts as malformed.
#[async_trait::async_trait]
pub trait RestrictionPersistencePort: Send + Sync {
    async fn load_all(&self, category: RestrictionCategory) -> AppResult<Vec<PersistedRecord>>;

    /// Must be durable before returning `Ok`.
    async fn persist(&self, category: RestrictionCategory, record: &PersistedRecord)
    -> AppResult<()>;

    /// Erasing an absent key succeeds.
    async fn erase(&self, category: RestrictionCategory, key: &str) -> AppResult<()>;
}

pub type DynRestrictionPersistencePort = Arc<dyn RestrictionPersistencePort>;
