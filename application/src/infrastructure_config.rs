use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::error::{AppError, AppResult};
use crate::restrictions::scheduler::SchedulerSettings;

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub persistence: PersistenceConfig,
    pub redis: RedisConfig,
    pub moderation_api: ModerationApiConfig,
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    /// Bearer token guarding the HTTP surface. `None` leaves it open.
    pub api_token: Option<SecretString>,
}

impl Serialize for ServerConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ServerConfig", 4)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("port", &self.port)?;
        state.serialize_field("cors_origin", &self.cors_origin)?;
        state.serialize_field("api_token", &self.api_token.as_ref().map(|_| REDACTED))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ServerConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ServerConfigHelper {
            host: String,
            port: u16,
            #[serde(default)]
            cors_origin: Option<String>,
            #[serde(default)]
            api_token: Option<String>,
        }

        let helper = ServerConfigHelper::deserialize(deserializer)?;
        Ok(ServerConfig {
            host: helper.host,
            port: helper.port,
            cors_origin: helper.cors_origin,
            api_token: helper
                .api_token
                .filter(|token| !token.is_empty() && token != REDACTED)
                .map(SecretString::from),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    pub max_concurrency: usize,
    pub max_jitter_ms: u64,
    /// Consecutive resolution failures after which an entry is dropped.
    /// Unset retries forever.
    #[serde(default)]
    pub max_resolution_failures: Option<u32>,
    pub rejoin_feed_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceBackend {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "redis")]
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub redis_url: String,
}

impl RedisConfig {
    #[must_use]
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.redis_url) {
            Ok(mut url) => {
                if url.password().is_some() {
                    url.set_password(Some("***")).ok();
                }
                url.to_string()
            }
            Err(_) => "[INVALID_URL]".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModerationApiConfig {
    pub base_url: String,
    pub bot_token: SecretString,
    pub mute_role_name: String,
    pub request_timeout_secs: u64,
}

impl Serialize for ModerationApiConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ModerationApiConfig", 4)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("bot_token", REDACTED)?;
        state.serialize_field("mute_role_name", &self.mute_role_name)?;
        state.serialize_field("request_timeout_secs", &self.request_timeout_secs)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ModerationApiConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ModerationApiConfigHelper {
            base_url: String,
            bot_token: String,
            mute_role_name: String,
            request_timeout_secs: u64,
        }

        let helper = ModerationApiConfigHelper::deserialize(deserializer)?;
        Ok(ModerationApiConfig {
            base_url: helper.base_url,
            bot_token: if helper.bot_token == REDACTED {
                SecretString::from("")
            } else {
                SecretString::from(helper.bot_token)
            },
            mute_role_name: helper.mute_role_name,
            request_timeout_secs: helper.request_timeout_secs,
        })
    }
}

impl ModerationApiConfig {
    #[must_use]
    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "pretty")]
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                cors_origin: None,
                api_token: None,
            },
            scheduler: SchedulerConfig {
                interval_secs: 60,
                max_concurrency: 8,
                max_jitter_ms: 500,
                max_resolution_failures: None,
                rejoin_feed_capacity: 256,
            },
            persistence: PersistenceConfig {
                backend: PersistenceBackend::File,
                data_dir: PathBuf::from("data"),
            },
            redis: RedisConfig {
                redis_url: "redis://localhost:6379".to_string(),
            },
            moderation_api: ModerationApiConfig {
                base_url: "https://discord.com/api/v10".to_string(),
                bot_token: SecretString::from(""),
                mute_role_name: "Muted".to_string(),
                request_timeout_secs: 10,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: false,
            },
            environment: EnvironmentConfig {
                env: "development".to_string(),
            },
        }
    }
}

impl Config {
    pub fn validate(&self) -> AppResult<()> {
        if self.scheduler.interval_secs == 0 {
            return Err(AppError::ConfigError {
                message: "scheduler interval_secs must be greater than 0".to_string(),
            });
        }

        if self.scheduler.max_concurrency == 0 {
            return Err(AppError::ConfigError {
                message: "scheduler max_concurrency must be greater than 0".to_string(),
            });
        }

        if self.scheduler.max_jitter_ms >= self.scheduler.interval_secs.saturating_mul(1000) {
            return Err(AppError::ConfigError {
                message: "scheduler max_jitter_ms must be shorter than the interval".to_string(),
            });
        }

        if self.scheduler.max_resolution_failures == Some(0) {
            return Err(AppError::ConfigError {
                message: "max_resolution_failures must be at least 1 when set".to_string(),
            });
        }

        if self.scheduler.rejoin_feed_capacity == 0 {
            return Err(AppError::ConfigError {
                message: "rejoin_feed_capacity must be greater than 0".to_string(),
            });
        }

        match self.persistence.backend {
            PersistenceBackend::File if self.persistence.data_dir.as_os_str().is_empty() => {
                return Err(AppError::ConfigError {
                    message: "data_dir cannot be empty for the file backend".to_string(),
                });
            }
            PersistenceBackend::Redis if self.redis.redis_url.is_empty() => {
                return Err(AppError::ConfigError {
                    message: "redis_url cannot be empty for the redis backend".to_string(),
                });
            }
            _ => {}
        }

        if url::Url::parse(&self.moderation_api.base_url).is_err() {
            return Err(AppError::ConfigError {
                message: format!(
                    "moderation_api base_url '{}' is not a valid URL",
                    self.moderation_api.base_url
                ),
            });
        }

        if self.moderation_api.bot_token().trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "moderation_api bot_token cannot be empty".to_string(),
            });
        }

        if self.moderation_api.mute_role_name.trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "moderation_api mute_role_name cannot be empty".to_string(),
            });
        }

        if self.moderation_api.request_timeout_secs == 0 {
            return Err(AppError::ConfigError {
                message: "moderation_api request_timeout_secs must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            max_concurrency: self.scheduler.max_concurrency,
            max_jitter: Duration::from_millis(self.scheduler.max_jitter_ms),
            max_resolution_failures: self.scheduler.max_resolution_failures,
        }
    }
}
