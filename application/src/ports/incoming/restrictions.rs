use time::Duration;

use crate::error::AppResult;
use domain::restriction::{
    RestrictionCategory, RestrictionEntry, RestrictionKey, RestrictionState,
};

#[derive(Debug, Clone, Copy)]
pub struct RestrictRequest {
    pub category: RestrictionCategory,
    pub key: RestrictionKey,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionStatus {
    pub category: RestrictionCategory,
    pub state: RestrictionState,
}

#[async_trait::async_trait]
pub trait RestrictionUseCase: Send + Sync {
    async fn restrict(&self, request: RestrictRequest) -> AppResult<RestrictionEntry>;

    async fn lift(&self, category: RestrictionCategory, key: RestrictionKey) -> AppResult<()>;

    async fn list(&self, category: RestrictionCategory) -> AppResult<Vec<RestrictionEntry>>;

    async fn status(&self, key: RestrictionKey) -> AppResult<Vec<RestrictionStatus>>;
}
