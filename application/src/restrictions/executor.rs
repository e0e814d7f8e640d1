use time::Duration;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::ports::outgoing::{
    moderation_api::DynModerationApiPort, platform_directory::DynPlatformDirectoryPort,
};
use domain::{
    platform::{MemberHandle, ScopeHandle},
    restriction::{RestrictionCategory, RestrictionEntry, ScopeId, SubjectId},
};

const MUTE_EXPIRED_REASON: &str = "Temporary mute expired";
const BAN_EXPIRED_REASON: &str = "Temporary ban expired";

/// Talks to the moderation platform on behalf of one entry at a time.
///
/// Never touches a restriction store: callers mutate the store once a call
/// here has succeeded. Lifts are idempotent, so a scheduler tick and a rejoin
/// racing on the same entry both observe success.
pub struct ActionExecutor {
    moderation: DynModerationApiPort,
    directory: DynPlatformDirectoryPort,
}

impl ActionExecutor {
    pub fn new(moderation: DynModerationApiPort, directory: DynPlatformDirectoryPort) -> Self {
        Self {
            moderation,
            directory,
        }
    }

    pub async fn lift(&self, category: RestrictionCategory, entry: &RestrictionEntry) -> AppResult<()> {
        match category {
            RestrictionCategory::Mute => self.lift_mute(entry).await,
            RestrictionCategory::Ban => self.lift_ban(entry).await,
        }
    }

    pub async fn apply(
        &self,
        category: RestrictionCategory,
        subject_id: SubjectId,
        scope_id: ScopeId,
        duration: Duration,
    ) -> AppResult<()> {
        match category {
            RestrictionCategory::Mute => self.apply_mute(subject_id, scope_id, duration).await,
            RestrictionCategory::Ban => self.apply_ban(subject_id, scope_id, duration).await,
        }
    }

    #[instrument(skip(self, entry), fields(key = %entry.key))]
    pub async fn lift_mute(&self, entry: &RestrictionEntry) -> AppResult<()> {
        let scope = self.require_scope(entry.scope_id()).await?;
        let member = self.require_member(&scope, entry.subject_id()).await?;

        self.moderation
            .unmute_member(&scope, &member, MUTE_EXPIRED_REASON)
            .await?;

        debug!(scope = %scope.scope_id, subject = %member.subject_id, "Mute lifted");
        Ok(())
    }

    #[instrument(skip(self, entry), fields(key = %entry.key))]
    pub async fn lift_ban(&self, entry: &RestrictionEntry) -> AppResult<()> {
        let scope = self.require_scope(entry.scope_id()).await?;
        let bans = self.moderation.list_bans(&scope).await?;

        let Some(record) = bans
            .into_iter()
            .find(|record| record.subject_id == entry.subject_id())
        else {
            debug!(
                scope = %scope.scope_id,
                subject = %entry.subject_id(),
                "Subject missing from ban list, treating ban as already lifted"
            );
            return Ok(());
        };

        self.moderation
            .remove_ban(&scope, &record, BAN_EXPIRED_REASON)
            .await?;

        debug!(scope = %scope.scope_id, subject = %record.subject_id, "Ban lifted");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn apply_mute(
        &self,
        subject_id: SubjectId,
        scope_id: ScopeId,
        duration: Duration,
    ) -> AppResult<()> {
        let scope = self.require_scope(scope_id).await?;
        let member = self.require_member(&scope, subject_id).await?;

        self.moderation
            .mute_member(&scope, &member, &restriction_reason("Muted", duration))
            .await
    }

    #[instrument(skip(self))]
    pub async fn apply_ban(
        &self,
        subject_id: SubjectId,
        scope_id: ScopeId,
        duration: Duration,
    ) -> AppResult<()> {
        let scope = self.require_scope(scope_id).await?;

        self.moderation
            .ban_member(&scope, subject_id, &restriction_reason("Banned", duration))
            .await
    }

    async fn require_scope(&self, scope_id: ScopeId) -> AppResult<ScopeHandle> {
        self.directory
            .resolve_scope(scope_id)
            .await?
            .ok_or_else(|| AppError::ResolutionFailure {
                message: format!("Scope {scope_id} could not be resolved"),
            })
    }

    async fn require_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
    ) -> AppResult<MemberHandle> {
        self.directory
            .resolve_member(scope, subject_id)
            .await?
            .ok_or_else(|| AppError::ResolutionFailure {
                message: format!(
                    "Member {subject_id} could not be resolved in scope {}",
                    scope.scope_id
                ),
            })
    }
}

fn restriction_reason(action: &str, duration: Duration) -> String {
    let minutes = duration.whole_minutes();
    if minutes >= 1 {
        format!("{action} for {minutes} minute(s)")
    } else {
        format!("{action} for {} second(s)", duration.whole_seconds().max(1))
    }
}
