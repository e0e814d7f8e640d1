use crate::error::AppResult;
use domain::events::MemberRejoinedEvent;
use std::sync::Arc;

pub trait RejoinEventsPort: Send + Sync {
    fn publish_member_rejoined(&self, event: MemberRejoinedEvent) -> AppResult<()>;
}

pub type DynRejoinEventsPort = Arc<dyn RejoinEventsPort>;
