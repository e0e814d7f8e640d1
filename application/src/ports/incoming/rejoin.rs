use domain::{events::MemberRejoinedEvent, restriction::RestrictionCategory};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinDecision {
    NoEntry,
    Reapplied { expires_at: OffsetDateTime },
    Lifted,
    /// The external call failed; the entry is left for the scheduler or the
    /// next rejoin.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejoinOutcome {
    pub category: RestrictionCategory,
    pub decision: RejoinDecision,
}

#[async_trait::async_trait]
pub trait RejoinUseCase: Send + Sync {
    async fn handle_member_rejoin(&self, event: MemberRejoinedEvent) -> Vec<RejoinOutcome>;
}
