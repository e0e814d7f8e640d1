use serde::Serialize;
use serde_with::{DisplayFromStr, serde_as};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use domain::restriction::{RestrictionCategory, RestrictionEntry, RestrictionState, expiry_to_millis};
use warden_application::ports::incoming::restrictions::RestrictionStatus;

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
            data: None,
        }
    }

    #[must_use]
    pub fn success_with_data(data: Option<T>) -> Self {
        Self {
            ok: true,
            error: None,
            data,
        }
    }
}

fn format_datetime(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Snowflake ids are rendered as strings so JavaScript clients keep every digit.
#[serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct RestrictionResponse {
    pub category: RestrictionCategory,
    #[serde_as(as = "DisplayFromStr")]
    pub subject_id: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub scope_id: u64,
    pub expires_at: String,
    pub expires_at_ms: i64,
}

impl RestrictionResponse {
    pub fn new(category: RestrictionCategory, entry: &RestrictionEntry) -> Self {
        Self {
            category,
            subject_id: entry.subject_id().get(),
            scope_id: entry.scope_id().get(),
            expires_at: format_datetime(entry.expires_at),
            expires_at_ms: expiry_to_millis(entry.expires_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestrictionStatusResponse {
    pub category: RestrictionCategory,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl From<RestrictionStatus> for RestrictionStatusResponse {
    fn from(status: RestrictionStatus) -> Self {
        let expires_at = match status.state {
            RestrictionState::Unrestricted => None,
            RestrictionState::RestrictedActive { expires_at }
            | RestrictionState::RestrictedExpired { expires_at } => Some(format_datetime(expires_at)),
        };
        Self {
            category: status.category,
            state: status.state.as_str(),
            expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub environment: String,
    pub active_mutes: usize,
    pub active_bans: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use domain::restriction::{RestrictionKey, ScopeId, SubjectId};
    use time::macros::datetime;

    #[test]
    fn restriction_response_renders_ids_as_strings() {
        let entry = RestrictionEntry::new(
            RestrictionKey::new(SubjectId(80_351_110_224_678_912), ScopeId(7)),
            datetime!(2024-05-01 12:30:00 UTC),
        );

        let json = serde_json::to_value(RestrictionResponse::new(RestrictionCategory::Mute, &entry)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "category": "mute",
                "subject_id": "80351110224678912",
                "scope_id": "7",
                "expires_at": "2024-05-01T12:30:00Z",
                "expires_at_ms": 1_714_566_600_000_i64
            })
        );
    }

    #[test]
    fn unrestricted_status_has_no_expiry() {
        let json = serde_json::to_value(RestrictionStatusResponse::from(RestrictionStatus {
            category: RestrictionCategory::Ban,
            state: RestrictionState::Unrestricted,
        }))
        .unwrap();

        assert_eq!(json, serde_json::json!({"category": "ban", "state": "unrestricted"}));
    }
}
