use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use validator::Validate;

use domain::{
    events::MemberRejoinedEvent,
    restriction::{RestrictionKey, ScopeId, SubjectId},
};

/// One year.
pub const MAX_RESTRICTION_SECS: i64 = 366 * 24 * 60 * 60;

// Ids are accepted as JSON numbers or as decimal strings.

#[serde_as]
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRestrictionRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub subject_id: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub scope_id: u64,
    #[validate(range(min = 1, max = MAX_RESTRICTION_SECS))]
    pub duration_secs: i64,
}

impl CreateRestrictionRequest {
    pub fn key(&self) -> RestrictionKey {
        RestrictionKey::new(SubjectId(self.subject_id), ScopeId(self.scope_id))
    }

    pub fn duration(&self) -> time::Duration {
        time::Duration::seconds(self.duration_secs)
    }
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct MemberRejoinRequest {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub subject_id: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub scope_id: u64,
}

impl From<MemberRejoinRequest> for MemberRejoinedEvent {
    fn from(request: MemberRejoinRequest) -> Self {
        MemberRejoinedEvent::new(SubjectId(request.subject_id), ScopeId(request.scope_id))
    }
}
