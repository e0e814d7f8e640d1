use reqwest::Method;
use tracing::{debug, instrument};

use super::{
    client::DiscordRestClient,
    models::{BanDto, CreateBanBody, RoleDto},
};
use domain::{
    platform::{BanRecord, MemberHandle, ScopeHandle},
    restriction::{ScopeId, SubjectId},
};
use warden_application::{
    error::{AppError, AppResult},
    ports::outgoing::moderation_api::ModerationApiPort,
};

const BAN_PAGE_SIZE: usize = 1000;

impl DiscordRestClient {
    /// Looks up the mute role by name, caching the id per scope.
    async fn mute_role_id(&self, scope: &ScopeHandle) -> AppResult<Option<u64>> {
        match self.cached_mute_role(scope.scope_id).await {
            Some(role_id) => Ok(Some(role_id)),
            None => self.fetch_mute_role_id(scope).await,
        }
    }

    async fn cached_mute_role(&self, scope_id: ScopeId) -> Option<u64> {
        self.mute_roles.lock().await.get(&scope_id).copied()
    }

    async fn fetch_mute_role_id(&self, scope: &ScopeHandle) -> AppResult<Option<u64>> {
        let roles: Vec<RoleDto> = self
            .get_required(&format!("/guilds/{}/roles", scope.scope_id))
            .await?;
        let role_id = roles
            .into_iter()
            .find(|role| role.name.eq_ignore_ascii_case(&self.mute_role_name))
            .map(|role| role.id);

        let mut cache = self.mute_roles.lock().await;
        if let Some(role_id) = role_id {
            cache.insert(scope.scope_id, role_id);
        } else {
            cache.remove(&scope.scope_id);
        }
        Ok(role_id)
    }

    async fn forget_mute_role(&self, scope_id: ScopeId) {
        self.mute_roles.lock().await.remove(&scope_id);
    }

    async fn remove_member_role(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        role_id: u64,
        reason: &str,
    ) -> AppResult<bool> {
        let path = format!(
            "/guilds/{}/members/{}/roles/{role_id}",
            scope.scope_id, member.subject_id
        );
        self.mutate(Method::DELETE, &path, reason, None::<&()>).await
    }
}

#[async_trait::async_trait]
impl ModerationApiPort for DiscordRestClient {
    #[instrument(skip(self, scope, member), fields(scope = %scope.scope_id, subject = %member.subject_id))]
    async fn mute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        reason: &str,
    ) -> AppResult<()> {
        let role_id = self
            .mute_role_id(scope)
            .await?
            .ok_or_else(|| AppError::ResolutionFailure {
                message: format!(
                    "Scope {} has no '{}' role",
                    scope.scope_id, self.mute_role_name
                ),
            })?;

        let path = format!(
            "/guilds/{}/members/{}/roles/{role_id}",
            scope.scope_id, member.subject_id
        );
        if !self.mutate(Method::PUT, &path, reason, None::<&()>).await? {
            self.forget_mute_role(scope.scope_id).await;
            return Err(AppError::ResolutionFailure {
                message: format!(
                    "Member {} or mute role vanished from scope {}",
                    member.subject_id, scope.scope_id
                ),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, scope, member), fields(scope = %scope.scope_id, subject = %member.subject_id))]
    async fn unmute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        reason: &str,
    ) -> AppResult<()> {
        let cached = self.cached_mute_role(scope.scope_id).await;
        let role_id = match cached {
            Some(role_id) => role_id,
            None => {
                let Some(role_id) = self.fetch_mute_role_id(scope).await? else {
                    debug!("Mute role missing, nothing to remove");
                    return Ok(());
                };
                role_id
            }
        };

        if self.remove_member_role(scope, member, role_id, reason).await? {
            return Ok(());
        }
        if cached.is_none() {
            debug!("Member no longer holds the mute role");
            return Ok(());
        }

        // The cached role may have been deleted and recreated under a new id.
        let Some(fresh_id) = self.fetch_mute_role_id(scope).await? else {
            debug!("Mute role deleted, nothing to remove");
            return Ok(());
        };
        if fresh_id != role_id && !self.remove_member_role(scope, member, fresh_id, reason).await? {
            debug!("Member no longer holds the recreated mute role");
        }
        Ok(())
    }

    #[instrument(skip(self, scope), fields(scope = %scope.scope_id))]
    async fn ban_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
        reason: &str,
    ) -> AppResult<()> {
        let body = CreateBanBody {
            delete_message_seconds: 0,
        };
        let path = format!("/guilds/{}/bans/{subject_id}", scope.scope_id);

        if !self.mutate(Method::PUT, &path, reason, Some(&body)).await? {
            return Err(AppError::ResolutionFailure {
                message: format!("Subject {subject_id} cannot be banned in scope {}", scope.scope_id),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, scope), fields(scope = %scope.scope_id))]
    async fn list_bans(&self, scope: &ScopeHandle) -> AppResult<Vec<BanRecord>> {
        let mut records = Vec::new();
        let mut after: Option<u64> = None;

        loop {
            let path = match after {
                Some(after) => format!(
                    "/guilds/{}/bans?limit={BAN_PAGE_SIZE}&after={after}",
                    scope.scope_id
                ),
                None => format!("/guilds/{}/bans?limit={BAN_PAGE_SIZE}", scope.scope_id),
            };

            let page: Vec<BanDto> = self.get_required(&path).await?;
            let page_len = page.len();
            after = page.iter().map(|ban| ban.user.id).max();
            records.extend(page.into_iter().map(BanRecord::from));

            if page_len < BAN_PAGE_SIZE || after.is_none() {
                break;
            }
        }

        debug!(bans = records.len(), "Fetched ban list");
        Ok(records)
    }

    #[instrument(skip(self, scope, record), fields(scope = %scope.scope_id, subject = %record.subject_id))]
    async fn remove_ban(
        &self,
        scope: &ScopeHandle,
        record: &BanRecord,
        reason: &str,
    ) -> AppResult<()> {
        let path = format!("/guilds/{}/bans/{}", scope.scope_id, record.subject_id);
        if !self.mutate(Method::DELETE, &path, reason, None::<&()>).await? {
            debug!("Ban already gone");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        routing::{delete, get},
    };
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };
    use tokio::net::TcpListener;
    use warden_application::infrastructure_config::ModerationApiConfig;

    /// One guild: its current mute role and the `(member, role)` grants.
    #[derive(Default)]
    struct Guild {
        mute_role: Mutex<Option<u64>>,
        grants: Mutex<HashSet<(u64, u64)>>,
    }

    async fn list_roles(State(guild): State<Arc<Guild>>) -> Json<Value> {
        let role = *guild.mute_role.lock().unwrap();
        let roles: Vec<Value> = role
            .into_iter()
            .map(|id| json!({ "id": id.to_string(), "name": "Muted" }))
            .collect();
        Json(Value::Array(roles))
    }

    async fn revoke_role(
        State(guild): State<Arc<Guild>>,
        Path((_scope, member, role)): Path<(u64, u64, u64)>,
    ) -> StatusCode {
        if guild.grants.lock().unwrap().remove(&(member, role)) {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::NOT_FOUND
        }
    }

    async fn client_for(guild: &Arc<Guild>) -> DiscordRestClient {
        let app = Router::new()
            .route("/guilds/{scope}/roles", get(list_roles))
            .route(
                "/guilds/{scope}/members/{member}/roles/{role}",
                delete(revoke_role),
            )
            .with_state(Arc::clone(guild));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        DiscordRestClient::new(&ModerationApiConfig {
            base_url: format!("http://{addr}"),
            bot_token: SecretString::from("test-token"),
            mute_role_name: "muted".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    fn scope() -> ScopeHandle {
        ScopeHandle {
            scope_id: ScopeId(7),
            name: "guild".to_string(),
        }
    }

    fn member(subject: u64) -> MemberHandle {
        MemberHandle {
            subject_id: SubjectId(subject),
            scope_id: ScopeId(7),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn unmute_follows_a_recreated_mute_role() {
        let guild = Arc::new(Guild::default());
        *guild.mute_role.lock().unwrap() = Some(2);
        guild.grants.lock().unwrap().insert((42, 2));
        let client = client_for(&guild).await;
        client.mute_roles.lock().await.insert(ScopeId(7), 1);

        client.unmute_member(&scope(), &member(42), "expired").await.unwrap();

        assert!(guild.grants.lock().unwrap().is_empty());
        assert_eq!(client.cached_mute_role(ScopeId(7)).await, Some(2));
    }

    #[tokio::test]
    async fn unmute_succeeds_when_the_mute_role_was_deleted() {
        let guild = Arc::new(Guild::default());
        let client = client_for(&guild).await;
        client.mute_roles.lock().await.insert(ScopeId(7), 1);

        client.unmute_member(&scope(), &member(42), "expired").await.unwrap();

        assert_eq!(client.cached_mute_role(ScopeId(7)).await, None);
    }

    #[tokio::test]
    async fn unmute_uses_the_cached_role_when_it_is_current() {
        let guild = Arc::new(Guild::default());
        *guild.mute_role.lock().unwrap() = Some(1);
        guild.grants.lock().unwrap().insert((42, 1));
        let client = client_for(&guild).await;

        client.unmute_member(&scope(), &member(42), "expired").await.unwrap();
        guild.grants.lock().unwrap().insert((43, 1));
        client.unmute_member(&scope(), &member(43), "expired").await.unwrap();

        assert!(guild.grants.lock().unwrap().is_empty());
        assert_eq!(client.cached_mute_role(ScopeId(7)).await, Some(1));
    }
}
