use std::sync::Arc;

use warden_application::{
    infrastructure_config::Config,
    ports::{incoming::restrictions::RestrictionUseCase, outgoing::events::DynRejoinEventsPort},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub restriction_use_case: Arc<dyn RestrictionUseCase>,
    pub rejoin_events: DynRejoinEventsPort,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        restriction_use_case: Arc<dyn RestrictionUseCase>,
        rejoin_events: DynRejoinEventsPort,
    ) -> Self {
        Self {
            config,
            restriction_use_case,
            rejoin_events,
        }
    }
}
