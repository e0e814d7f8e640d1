use tracing::instrument;

use super::{
    client::DiscordRestClient,
    models::{GuildDto, GuildMemberDto},
};
use domain::{
    platform::{MemberHandle, ScopeHandle},
    restriction::{ScopeId, SubjectId},
};
use warden_application::{error::AppResult, ports::outgoing::platform_directory::PlatformDirectoryPort};

#[async_trait::async_trait]
impl PlatformDirectoryPort for DiscordRestClient {
    #[instrument(skip(self))]
    async fn resolve_scope(&self, scope_id: ScopeId) -> AppResult<Option<ScopeHandle>> {
        let guild: Option<GuildDto> = self.get_optional(&format!("/guilds/{scope_id}")).await?;
        Ok(guild.map(ScopeHandle::from))
    }

    #[instrument(skip(self, scope), fields(scope = %scope.scope_id))]
    async fn resolve_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
    ) -> AppResult<Option<MemberHandle>> {
        let member: Option<GuildMemberDto> = self
            .get_optional(&format!("/guilds/{}/members/{subject_id}", scope.scope_id))
            .await?;
        Ok(member.map(|member| member.into_handle(scope.scope_id)))
    }
}
