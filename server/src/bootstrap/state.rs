use deadpool_redis::{Config as RedisPoolConfig, Pool as RedisPool, Runtime};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use domain::events::MemberRejoinedEvent;
use warden_adapters::outgoing::{
    clock::system_clock::SystemClock,
    events_channel::tokio_mpsc::TokioMpscRejoinEvents,
    file_json::restriction_store_file::JsonFileRestrictionPersistence,
    moderation_http::client::DiscordRestClient,
    redis_deadpool::restriction_store_redis::RedisRestrictionPersistence,
};
use warden_adapters::shared::app_state::AppState as AdaptersAppState;
use warden_application::error::AppError;
use warden_application::infrastructure_config::{Config, PersistenceBackend};
use warden_application::ports::incoming::rejoin::RejoinUseCase;
use warden_application::ports::outgoing::{
    clock::DynClockPort, events::DynRejoinEventsPort,
    restriction_persistence::DynRestrictionPersistencePort,
};
use warden_application::restrictions::{
    executor::ActionExecutor, rejoin_guard::RejoinGuard, scheduler::ExpiryScheduler,
    service::RestrictionService, store::RestrictionStores,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub stores: RestrictionStores,
    pub restriction_service: Arc<RestrictionService>,
    pub rejoin_guard: Arc<RejoinGuard>,
    pub schedulers: Vec<Arc<ExpiryScheduler>>,
    rejoin_feed: Option<mpsc::Receiver<MemberRejoinedEvent>>,
    rejoin_events: DynRejoinEventsPort,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let clock: DynClockPort = Arc::new(SystemClock);

        let persistence = Self::create_persistence(&config).await?;
        let stores = RestrictionStores::load(&persistence, &clock).await?;

        let executor = Self::create_executor(&config)?;
        let schedulers = stores
            .all()
            .into_iter()
            .map(|store| {
                Arc::new(ExpiryScheduler::new(
                    store,
                    Arc::clone(&executor),
                    Arc::clone(&clock),
                    config.scheduler_settings(),
                ))
            })
            .collect();

        let (rejoin_tx, rejoin_feed) = mpsc::channel(config.scheduler.rejoin_feed_capacity);
        let rejoin_events: DynRejoinEventsPort = Arc::new(TokioMpscRejoinEvents::new(rejoin_tx));

        let rejoin_guard = Arc::new(RejoinGuard::new(
            stores.all(),
            Arc::clone(&executor),
            Arc::clone(&clock),
        ));
        let restriction_service = Arc::new(RestrictionService::new(
            stores.clone(),
            executor,
            clock,
        ));

        Ok(Self {
            config,
            stores,
            restriction_service,
            rejoin_guard,
            schedulers,
            rejoin_feed: Some(rejoin_feed),
            rejoin_events,
        })
    }

    async fn create_persistence(config: &Config) -> Result<DynRestrictionPersistencePort, AppError> {
        match config.persistence.backend {
            PersistenceBackend::File => {
                let persistence =
                    JsonFileRestrictionPersistence::new(config.persistence.data_dir.clone())
                        .await?;
                Ok(Arc::new(persistence))
            }
            PersistenceBackend::Redis => {
                let redis_pool = Self::create_redis_pool(config)?;
                info!(redis_url = %config.redis.redacted_url(), "Using Redis restriction persistence");
                Ok(Arc::new(RedisRestrictionPersistence::new(
                    redis_pool,
                    &config.environment.env,
                )))
            }
        }
    }

    fn create_redis_pool(config: &Config) -> Result<RedisPool, AppError> {
        RedisPoolConfig::from_url(&config.redis.redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to create Redis pool: {e}"),
            })
    }

    /// One HTTP client serves as both the moderation API and the directory.
    fn create_executor(config: &Config) -> Result<Arc<ActionExecutor>, AppError> {
        let client = Arc::new(DiscordRestClient::new(&config.moderation_api)?);
        Ok(Arc::new(ActionExecutor::new(
            Arc::clone(&client) as _,
            client,
        )))
    }

    /// The feed has a single consumer, so this hands it out once.
    pub fn take_rejoin_feed(&mut self) -> Option<mpsc::Receiver<MemberRejoinedEvent>> {
        self.rejoin_feed.take()
    }

    pub fn rejoin_use_case(&self) -> Arc<dyn RejoinUseCase> {
        Arc::clone(&self.rejoin_guard) as _
    }

    pub fn to_adapters_state(&self) -> AdaptersAppState {
        AdaptersAppState::new(
            Arc::clone(&self.config),
            Arc::clone(&self.restriction_service) as _,
            Arc::clone(&self.rejoin_events),
        )
    }
}
