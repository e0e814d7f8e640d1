use crate::restriction::{RestrictionKey, ScopeId, SubjectId};

/// A member came back into a scope they had previously left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRejoinedEvent {
    pub subject_id: SubjectId,
    pub scope_id: ScopeId,
}

impl MemberRejoinedEvent {
    #[must_use]
    pub fn new(subject_id: SubjectId, scope_id: ScopeId) -> Self {
        Self {
            subject_id,
            scope_id,
        }
    }

    #[must_use]
    pub fn key(&self) -> RestrictionKey {
        RestrictionKey::new(self.subject_id, self.scope_id)
    }
}
