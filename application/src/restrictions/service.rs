use std::sync::Arc;
use tracing::{error, info, instrument};

use super::{executor::ActionExecutor, store::RestrictionStores};
use crate::error::{AppError, AppResult};
use crate::ports::incoming::restrictions::{RestrictRequest, RestrictionStatus, RestrictionUseCase};
use crate::ports::outgoing::clock::DynClockPort;
use domain::restriction::{RestrictionCategory, RestrictionEntry, RestrictionKey};

pub struct RestrictionService {
    stores: RestrictionStores,
    executor: Arc<ActionExecutor>,
    clock: DynClockPort,
}

impl RestrictionService {
    pub fn new(stores: RestrictionStores, executor: Arc<ActionExecutor>, clock: DynClockPort) -> Self {
        Self {
            stores,
            executor,
            clock,
        }
    }
}

#[async_trait::async_trait]
impl RestrictionUseCase for RestrictionService {
    /// Records the entry first so a duplicate request is rejected before any
    /// external call, then applies it. A failed apply takes the entry back out.
    #[instrument(skip(self), fields(category = %request.category, key = %request.key))]
    async fn restrict(&self, request: RestrictRequest) -> AppResult<RestrictionEntry> {
        let store = self.stores.get(request.category);
        let entry = store.add(request.key, request.duration).await?;

        if let Err(e) = self
            .executor
            .apply(
                request.category,
                request.key.subject_id,
                request.key.scope_id,
                request.duration,
            )
            .await
        {
            if let Err(rollback) = store.remove_if(request.key, entry.expires_at).await {
                error!(
                    error = %rollback,
                    "Failed to roll back restriction after apply failure"
                );
            }
            return Err(e);
        }

        info!(expires_at = %entry.expires_at, "Restriction created");
        Ok(entry)
    }

    #[instrument(skip(self), fields(category = %category, key = %key))]
    async fn lift(&self, category: RestrictionCategory, key: RestrictionKey) -> AppResult<()> {
        let store = self.stores.get(category);
        let entry = store.entry(key).await.ok_or_else(|| AppError::NotFound {
            message: format!("No {category} restriction for {key}"),
        })?;

        self.executor.lift(category, &entry).await?;
        store.remove_if(key, entry.expires_at).await?;

        info!("Restriction lifted manually");
        Ok(())
    }

    async fn list(&self, category: RestrictionCategory) -> AppResult<Vec<RestrictionEntry>> {
        Ok(self.stores.get(category).snapshot().await)
    }

    async fn status(&self, key: RestrictionKey) -> AppResult<Vec<RestrictionStatus>> {
        let now = self.clock.now();
        let mut statuses = Vec::with_capacity(RestrictionCategory::ALL.len());
        for category in RestrictionCategory::ALL {
            statuses.push(RestrictionStatus {
                category,
                state: self.stores.get(category).state(key, now).await,
            });
        }
        Ok(statuses)
    }
}
