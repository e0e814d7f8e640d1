use std::sync::Arc;
use tokio::sync::{mpsc::Receiver, watch};
use tracing::{debug, info, warn};

use domain::events::MemberRejoinedEvent;
use warden_application::ports::incoming::rejoin::{RejoinDecision, RejoinUseCase};

/// Drives the rejoin guard from the rejoin feed until shutdown or until
/// every publisher is gone. Events are handled one at a time in arrival order.
pub async fn run_rejoin_listener(
    mut events: Receiver<MemberRejoinedEvent>,
    guard: Arc<dyn RejoinUseCase>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Rejoin listener started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            received = events.recv() => received,
        };

        let Some(event) = received else {
            info!("Rejoin feed closed");
            break;
        };
        handle_event(guard.as_ref(), event).await;
    }

    info!("Rejoin listener stopped");
}

async fn handle_event(guard: &dyn RejoinUseCase, event: MemberRejoinedEvent) {
    let outcomes = guard.handle_member_rejoin(event).await;
    for outcome in outcomes {
        match outcome.decision {
            RejoinDecision::NoEntry => {}
            RejoinDecision::Deferred => warn!(
                category = %outcome.category,
                key = %event.key(),
                "Rejoin enforcement deferred"
            ),
            decision => debug!(
                category = %outcome.category,
                key = %event.key(),
                ?decision,
                "Rejoin handled"
            ),
        }
    }
}
