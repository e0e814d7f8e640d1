use serde_json::Value;
use std::{collections::HashMap, error::Error, io::stdout};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use warden_application::infrastructure_config::{Config, LogFormat};

const SERVICE_NAME: &str = "warden";

/// HTTP client and TLS crates that flood debug output on every moderation call.
const QUIET_DEPENDENCIES: [&str; 5] = ["hyper", "hyper_util", "h2", "reqwest", "rustls"];

pub fn setup_logging(config: &Config) -> Result<(), Box<dyn Error>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.logging.level))?,
    };

    match config.logging.format {
        LogFormat::Json => {
            let formatting_layer = BunyanFormattingLayer::with_default_fields(
                SERVICE_NAME.to_string(),
                stdout,
                default_fields(config),
            );

            tracing_subscriber::registry()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(formatting_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let format = fmt::format().with_target(true).compact();

            let mut subscriber = tracing_subscriber::fmt()
                .event_format(format)
                .with_env_filter(env_filter);

            if config.logging.include_location {
                subscriber = subscriber.with_file(true).with_line_number(true);
            }

            subscriber.try_init().map_err(|e| -> Box<dyn Error> { e })?;
        }
    }

    Ok(())
}

/// The configured level for everything, capped at `warn` for noisy dependencies.
fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(
        QUIET_DEPENDENCIES
            .iter()
            .map(|target| format!("{target}=warn")),
    );
    directives.join(",")
}

/// Attached to every JSON line so logs from several deployments stay separable.
fn default_fields(config: &Config) -> HashMap<String, Value> {
    HashMap::from([
        (
            "environment".to_string(),
            Value::String(config.environment.env.clone()),
        ),
        (
            "version".to_string(),
            Value::String(env!("CARGO_PKG_VERSION").to_string()),
        ),
    ])
}
