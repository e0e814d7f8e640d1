use crate::restriction::{ScopeId, SubjectId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeHandle {
    pub scope_id: ScopeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHandle {
    pub subject_id: SubjectId,
    pub scope_id: ScopeId,
    pub display_name: Option<String>,
}

/// An entry of a scope's ban list as reported by the moderation platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub subject_id: SubjectId,
    pub reason: Option<String>,
}
