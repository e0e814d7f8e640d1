use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use time::{Duration, OffsetDateTime};

use crate::error::{DomainError, DomainResult};

const NANOS_PER_MILLI: i128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl SubjectId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub u64);

impl ScopeId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionCategory {
    Mute,
    Ban,
}

impl RestrictionCategory {
    pub const ALL: [RestrictionCategory; 2] = [RestrictionCategory::Mute, RestrictionCategory::Ban];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionCategory::Mute => "mute",
            RestrictionCategory::Ban => "ban",
        }
    }
}

impl fmt::Display for RestrictionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestrictionCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mute" | "mutes" => Ok(RestrictionCategory::Mute),
            "ban" | "bans" => Ok(RestrictionCategory::Ban),
            other => Err(DomainError::UnknownCategory(other.to_string())),
        }
    }
}

/// Composite `(subject, scope)` key, persisted as `"<subject>,<scope>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestrictionKey {
    pub subject_id: SubjectId,
    pub scope_id: ScopeId,
}

impl RestrictionKey {
    #[must_use]
    pub fn new(subject_id: SubjectId, scope_id: ScopeId) -> Self {
        Self {
            subject_id,
            scope_id,
        }
    }
}

impl fmt::Display for RestrictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.subject_id, self.scope_id)
    }
}

impl FromStr for RestrictionKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((subject, scope)) = s.split_once(',') else {
            return Err(DomainError::InvalidRestrictionKey(format!(
                "Expected format 'subject,scope', got '{s}'"
            )));
        };

        let subject_id = subject.trim().parse::<u64>().map_err(|e| {
            DomainError::InvalidRestrictionKey(format!("Invalid subject id '{subject}': {e}"))
        })?;

        let scope_id = scope.trim().parse::<u64>().map_err(|e| {
            DomainError::InvalidRestrictionKey(format!("Invalid scope id '{scope}': {e}"))
        })?;

        Ok(RestrictionKey::new(SubjectId(subject_id), ScopeId(scope_id)))
    }
}

/// Millisecond resolution is what the durable format carries.
#[must_use]
pub fn expiry_to_millis(instant: OffsetDateTime) -> i64 {
    instant.unix_timestamp_nanos().div_euclid(NANOS_PER_MILLI) as i64
}

pub fn expiry_from_millis(millis: i64) -> DomainResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
        .map_err(|e| DomainError::InvalidExpiry(format!("{millis}: {e}")))
}

pub fn parse_expiry(raw: &str) -> DomainResult<OffsetDateTime> {
    let millis = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| DomainError::InvalidExpiry(format!("'{raw}': {e}")))?;
    expiry_from_millis(millis)
}

#[must_use]
pub fn format_expiry(instant: OffsetDateTime) -> String {
    expiry_to_millis(instant).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestrictionEntry {
    pub key: RestrictionKey,
    pub expires_at: OffsetDateTime,
}

impl RestrictionEntry {
    #[must_use]
    pub fn new(key: RestrictionKey, expires_at: OffsetDateTime) -> Self {
        Self { key, expires_at }
    }

    pub fn from_persisted(raw_key: &str, raw_expiry: &str) -> DomainResult<Self> {
        Ok(Self {
            key: raw_key.parse()?,
            expires_at: parse_expiry(raw_expiry)?,
        })
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.key.subject_id
    }

    #[must_use]
    pub fn scope_id(&self) -> ScopeId {
        self.key.scope_id
    }

    /// Expiry is inclusive: an entry expiring exactly at `now` is expired.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
        if self.is_expired_at(now) {
            Duration::ZERO
        } else {
            self.expires_at - now
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionState {
    Unrestricted,
    RestrictedActive { expires_at: OffsetDateTime },
    RestrictedExpired { expires_at: OffsetDateTime },
}

impl RestrictionState {
    #[must_use]
    pub fn derive(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> Self {
        match expires_at {
            None => RestrictionState::Unrestricted,
            Some(expires_at) if expires_at <= now => {
                RestrictionState::RestrictedExpired { expires_at }
            }
            Some(expires_at) => RestrictionState::RestrictedActive { expires_at },
        }
    }

    #[must_use]
    pub fn is_restricted(&self) -> bool {
        !matches!(self, RestrictionState::Unrestricted)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RestrictionState::Unrestricted => "unrestricted",
            RestrictionState::RestrictedActive { .. } => "restricted-active",
            RestrictionState::RestrictedExpired { .. } => "restricted-expired",
        }
    }
}
