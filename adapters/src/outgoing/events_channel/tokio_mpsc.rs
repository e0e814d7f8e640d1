use tokio::sync::mpsc::{Sender, error::TrySendError};
use tracing::warn;

use domain::events::MemberRejoinedEvent;
use warden_application::{
    error::{AppError, AppResult},
    ports::outgoing::events::RejoinEventsPort,
};

/// Feeds the single rejoin listener. A full queue is reported to the caller
/// rather than dropping the event.
pub struct TokioMpscRejoinEvents {
    tx: Sender<MemberRejoinedEvent>,
}

impl TokioMpscRejoinEvents {
    pub fn new(tx: Sender<MemberRejoinedEvent>) -> Self {
        Self { tx }
    }
}

impl RejoinEventsPort for TokioMpscRejoinEvents {
    fn publish_member_rejoined(&self, event: MemberRejoinedEvent) -> AppResult<()> {
        self.tx.try_send(event).map_err(|e| {
            warn!(key = %event.key(), "Failed to publish member rejoin event: {}", e);
            let message = match e {
                TrySendError::Full(_) => "Rejoin feed is full, retry later".to_string(),
                TrySendError::Closed(_) => "No rejoin listener is running".to_string(),
            };
            AppError::EventFeedError { message }
        })
    }
}
