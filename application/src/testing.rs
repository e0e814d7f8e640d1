#![allow(clippy::unwrap_used)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::sync::Notify;
use time::{Duration, OffsetDateTime, macros::datetime};

use crate::error::{AppError, AppResult};
use crate::ports::outgoing::{
    clock::ClockPort,
    moderation_api::ModerationApiPort,
    platform_directory::PlatformDirectoryPort,
    restriction_persistence::{PersistedRecord, RestrictionPersistencePort},
};
use domain::{
    platform::{BanRecord, MemberHandle, ScopeHandle},
    restriction::{RestrictionCategory, RestrictionKey, ScopeId, SubjectId},
};

pub fn key(subject: u64, scope: u64) -> RestrictionKey {
    RestrictionKey::new(SubjectId(subject), ScopeId(scope))
}

pub fn start() -> OffsetDateTime {
    datetime!(2024-05-01 12:00 UTC)
}

pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct InMemoryPersistence {
    records: Mutex<HashMap<(RestrictionCategory, String), String>>,
    fail_writes: Mutex<bool>,
}

impl InMemoryPersistence {
    pub fn with_records(category: RestrictionCategory, records: &[(&str, &str)]) -> Self {
        let persistence = Self::default();
        {
            let mut stored = persistence.records.lock().unwrap();
            for (key, value) in records {
                stored.insert((category, (*key).to_string()), (*value).to_string());
            }
        }
        persistence
    }

    pub fn record(&self, category: RestrictionCategory, key: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&(category, key.to_string()))
            .cloned()
    }

    pub fn count(&self, category: RestrictionCategory) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == category)
            .count()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    fn check_writable(&self) -> AppResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::PersistenceError {
                message: "storage offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RestrictionPersistencePort for InMemoryPersistence {
    async fn load_all(&self, category: RestrictionCategory) -> AppResult<Vec<PersistedRecord>> {
        let mut records: Vec<PersistedRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((c, _), _)| *c == category)
            .map(|((_, key), value)| PersistedRecord::new(key.clone(), value.clone()))
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn persist(
        &self,
        category: RestrictionCategory,
        record: &PersistedRecord,
    ) -> AppResult<()> {
        self.check_writable()?;
        self.records
            .lock()
            .unwrap()
            .insert((category, record.key.clone()), record.value.clone());
        Ok(())
    }

    async fn erase(&self, category: RestrictionCategory, key: &str) -> AppResult<()> {
        self.check_writable()?;
        self.records
            .lock()
            .unwrap()
            .remove(&(category, key.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationCall {
    Mute {
        subject: SubjectId,
        scope: ScopeId,
        reason: String,
    },
    Unmute {
        subject: SubjectId,
        scope: ScopeId,
    },
    Ban {
        subject: SubjectId,
        scope: ScopeId,
    },
    ListBans {
        scope: ScopeId,
    },
    RemoveBan {
        subject: SubjectId,
        scope: ScopeId,
    },
}

/// Records successful calls and keeps a ban list per scope.
#[derive(Default)]
pub struct RecordingModerationApi {
    calls: Mutex<Vec<ModerationCall>>,
    bans: Mutex<HashMap<ScopeId, Vec<BanRecord>>>,
    failing: Mutex<bool>,
    failing_subjects: Mutex<HashSet<SubjectId>>,
    unmute_gate: Mutex<Option<Arc<CallGate>>>,
}

/// Holds a call until the test releases it. `entered` fires once the call
/// is parked.
#[derive(Default)]
pub struct CallGate {
    pub entered: Notify,
    pub release: Notify,
}

impl RecordingModerationApi {
    pub fn calls(&self) -> Vec<ModerationCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Parks every later `unmute_member` call on the returned gate.
    pub fn gate_unmutes(&self) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::default());
        *self.unmute_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn fail_for(&self, subject_id: SubjectId) {
        self.failing_subjects.lock().unwrap().insert(subject_id);
    }

    pub fn seed_ban(&self, scope_id: ScopeId, record: BanRecord) {
        self.bans
            .lock()
            .unwrap()
            .entry(scope_id)
            .or_default()
            .push(record);
    }

    pub fn bans(&self, scope_id: ScopeId) -> Vec<BanRecord> {
        self.bans
            .lock()
            .unwrap()
            .get(&scope_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, subject_id: Option<SubjectId>) -> AppResult<()> {
        let blocked = subject_id
            .is_some_and(|subject| self.failing_subjects.lock().unwrap().contains(&subject));
        if *self.failing.lock().unwrap() || blocked {
            return Err(AppError::ExternalApiFailure {
                message: "moderation api unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn record(&self, call: ModerationCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ModerationApiPort for RecordingModerationApi {
    async fn mute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        reason: &str,
    ) -> AppResult<()> {
        self.check(Some(member.subject_id))?;
        self.record(ModerationCall::Mute {
            subject: member.subject_id,
            scope: scope.scope_id,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn unmute_member(
        &self,
        scope: &ScopeHandle,
        member: &MemberHandle,
        _reason: &str,
    ) -> AppResult<()> {
        let gate = self.unmute_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.check(Some(member.subject_id))?;
        self.record(ModerationCall::Unmute {
            subject: member.subject_id,
            scope: scope.scope_id,
        });
        Ok(())
    }

    async fn ban_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
        reason: &str,
    ) -> AppResult<()> {
        self.check(Some(subject_id))?;
        self.record(ModerationCall::Ban {
            subject: subject_id,
            scope: scope.scope_id,
        });
        let mut bans = self.bans.lock().unwrap();
        let list = bans.entry(scope.scope_id).or_default();
        if !list.iter().any(|record| record.subject_id == subject_id) {
            list.push(BanRecord {
                subject_id,
                reason: Some(reason.to_string()),
            });
        }
        Ok(())
    }

    async fn list_bans(&self, scope: &ScopeHandle) -> AppResult<Vec<BanRecord>> {
        self.check(None)?;
        self.record(ModerationCall::ListBans {
            scope: scope.scope_id,
        });
        Ok(self.bans(scope.scope_id))
    }

    async fn remove_ban(
        &self,
        scope: &ScopeHandle,
        record: &BanRecord,
        _reason: &str,
    ) -> AppResult<()> {
        self.check(Some(record.subject_id))?;
        self.record(ModerationCall::RemoveBan {
            subject: record.subject_id,
            scope: scope.scope_id,
        });
        if let Some(list) = self.bans.lock().unwrap().get_mut(&scope.scope_id) {
            list.retain(|existing| existing.subject_id != record.subject_id);
        }
        Ok(())
    }
}

/// Resolves every scope and member unless told otherwise.
#[derive(Default)]
pub struct FakeDirectory {
    missing_scopes: Mutex<HashSet<ScopeId>>,
    missing_members: Mutex<HashSet<(ScopeId, SubjectId)>>,
}

impl FakeDirectory {
    pub fn remove_scope(&self, scope_id: ScopeId) {
        self.missing_scopes.lock().unwrap().insert(scope_id);
    }

    pub fn remove_member(&self, scope_id: ScopeId, subject_id: SubjectId) {
        self.missing_members
            .lock()
            .unwrap()
            .insert((scope_id, subject_id));
    }
}

#[async_trait::async_trait]
impl PlatformDirectoryPort for FakeDirectory {
    async fn resolve_scope(&self, scope_id: ScopeId) -> AppResult<Option<ScopeHandle>> {
        if self.missing_scopes.lock().unwrap().contains(&scope_id) {
            return Ok(None);
        }
        Ok(Some(ScopeHandle {
            scope_id,
            name: format!("scope-{scope_id}"),
        }))
    }

    async fn resolve_member(
        &self,
        scope: &ScopeHandle,
        subject_id: SubjectId,
    ) -> AppResult<Option<MemberHandle>> {
        if self
            .missing_members
            .lock()
            .unwrap()
            .contains(&(scope.scope_id, subject_id))
        {
            return Ok(None);
        }
        Ok(Some(MemberHandle {
            subject_id,
            scope_id: scope.scope_id,
            display_name: None,
        }))
    }
}
