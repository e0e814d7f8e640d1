use tracing::info;
use warden_application::infrastructure_config::{
    Config, PersistenceBackend, PersistenceConfig, SchedulerConfig,
};

pub fn print_startup_info(config: &Config) {
    info!("⚙️  Configuration:");
    info!("  🌍 Environment: {}", config.environment.env);
    print_scheduler_configuration(&config.scheduler);
    print_persistence_configuration(config, &config.persistence);
    info!(
        "  🔨 Moderation API: {} (mute role '{}', timeout {}s)",
        config.moderation_api.base_url,
        config.moderation_api.mute_role_name,
        config.moderation_api.request_timeout_secs
    );

    if config.server.api_token.is_some() {
        info!("  🔐 API token: REQUIRED");
    } else {
        info!("  🔐 API token: DISABLED");
    }
}

fn print_scheduler_configuration(scheduler: &SchedulerConfig) {
    info!(
        "  ⏱️  Expiry sweep: every {}s, up to {} lifts in flight, jitter {}ms",
        scheduler.interval_secs, scheduler.max_concurrency, scheduler.max_jitter_ms
    );
    match scheduler.max_resolution_failures {
        Some(limit) => info!("  🧹 Unresolvable entries dropped after {} sweeps", limit),
        None => info!("  🧹 Unresolvable entries retried forever"),
    }
}

fn print_persistence_configuration(config: &Config, persistence: &PersistenceConfig) {
    match persistence.backend {
        PersistenceBackend::File => info!(
            "  🗄️  Persistence: JSON files in {}",
            persistence.data_dir.display()
        ),
        PersistenceBackend::Redis => info!(
            "  🗄️  Persistence: Redis at {}",
            config.redis.redacted_url()
        ),
    }
}
