use std::sync::Arc;

use crate::error::AppResult;
use domain::{
    platform::{BanRecord, MemberHandle, ScopeHandle},
    restriction::SubjectId,
};

#[async_trait::async_trait]
pub trait ModerationApiPort: Send + Sync {
    async fn mute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        reason: &str,
    ) -> AppResult<()>;

    /// Succeeds when the member is already unmuted.
    async fn unmute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        reason: &str,
    ) -> AppResult<()>;

    async fn ban_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
        reason: &str,
    ) -> AppResult<()>;

    async fn list_bans(&self, scope: &ScopeHandle) -> AppResult<Vec<BanRecord>>;

    async fn remove_ban(&self, scope: &ScopeHandle, record: &BanRecord, reason: &str)
    -> AppResult<()>;
}

pub type DynModerationApiPort = Arc<dyn ModerationApiPort>;
