use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use domain::{
    platform::{BanRecord, MemberHandle, ScopeHandle},
    restriction::{ScopeId, SubjectId},
};

// Snowflake ids travel as decimal strings.

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GuildDto {
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
    pub name: String,
}

impl From<GuildDto> for ScopeHandle {
    fn from(guild: GuildDto) -> Self {
        Self {
            scope_id: ScopeId(guild.id),
            name: guild.name,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct UserDto {
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct GuildMemberDto {
    pub user: UserDto,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    pub roles: Vec<u64>,
}

impl GuildMemberDto {
    pub fn into_handle(self, scope_id: ScopeId) -> MemberHandle {
        let display_name = self
            .nick
            .or(self.user.global_name)
            .or(Some(self.user.username));
        MemberHandle {
            subject_id: SubjectId(self.user.id),
            scope_id,
            display_name,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct RoleDto {
    #[serde_as(as = "DisplayFromStr")]
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanDto {
    #[serde(default)]
    pub reason: Option<String>,
    pub user: UserDto,
}

impl From<BanDto> for BanRecord {
    fn from(ban: BanDto) -> Self {
        Self {
            subject_id: SubjectId(ban.user.id),
            reason: ban.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateBanBody {
    pub delete_message_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    #[serde(default)]
    pub retry_after: f64,
}
