use std::sync::Arc;

use crate::error::AppResult;
use domain::{
    platform::{MemberHandle, ScopeHandle},
    restriction::{ScopeId, SubjectId},
};

/// `Ok(None)` means the platform answered and the object no longer exists;
/// `Err` is reserved for failing to get an answer at all.
#[async_trait::async_trait]
pub trait PlatformDirectoryPort: Send + Sync {
    async fn resolve_scope(&self, scope_id: ScopeId) -> AppResult<Option<ScopeHandle>>;

    async fn resolve_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
    ) -> AppResult<Option<MemberHandle>>;
}

pub type DynPlatformDirectoryPort = Arc<dyn PlatformDirectoryPort>;
