use deadpool_redis::{Connection as RedisConnection, Pool as RedisPool, redis::AsyncCommands};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use domain::restriction::RestrictionCategory;
use warden_application::{
    error::{AppError, AppResult},
    ports::outgoing::restriction_persistence::{PersistedRecord, RestrictionPersistencePort},
};

use super::keys::RedisKeyBuilder;

const CONNECTION_TIMEOUT: Duration = Duration::from_millis(1000);

/// Keeps each category in one Redis hash. Every command is acknowledged by
/// the server before the call returns.
pub struct RedisRestrictionPersistence {
    redis_pool: RedisPool,
    redis_keys: RedisKeyBuilder,
}

impl RedisRestrictionPersistence {
    pub fn new(redis_pool: RedisPool, namespace_env: &str) -> Self {
        Self {
            redis_pool,
            redis_keys: RedisKeyBuilder::new(namespace_env),
        }
    }

    async fn get_redis_connection(&self) -> AppResult<RedisConnection> {
        match timeout(CONNECTION_TIMEOUT, self.redis_pool.get()).await {
            Ok(conn) => conn.map_err(|e| AppError::PersistenceError {
                message: format!("Failed to get Redis connection: {}", e),
            }),
            Err(_) => Err(AppError::PersistenceError {
                message: "Redis connection timeout".to_string(),
            }),
        }
    }
}

/// Invalid UTF-8 becomes U+FFFD, which the store then rejects per record
/// instead of the whole hash failing to load.
fn decode_fields(fields: Vec<(Vec<u8>, Vec<u8>)>) -> Vec<PersistedRecord> {
    fields
        .into_iter()
        .map(|(key, value)| {
            PersistedRecord::new(
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            )
        })
        .collect()
}

#[async_trait::async_trait]
impl RestrictionPersistencePort for RedisRestrictionPersistence {
    async fn load_all(&self, category: RestrictionCategory) -> AppResult<Vec<PersistedRecord>> {
        let mut conn = self.get_redis_connection().await?;
        let hash_key = self.redis_keys.restriction_hash(category);

        let fields: Vec<(Vec<u8>, Vec<u8>)> = conn
            .hgetall(&hash_key)
            .await
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to read {}: {}", hash_key, e),
            })?;

        debug!(hash = %hash_key, records = fields.len(), "Loaded restriction hash");
        Ok(decode_fields(fields))
    }

    async fn persist(
        &self,
        category: RestrictionCategory,
        record: &PersistedRecord,
    ) -> AppResult<()> {
        let mut conn = self.get_redis_connection().await?;
        let hash_key = self.redis_keys.restriction_hash(category);

        let _: () = conn
            .hset(&hash_key, &record.key, &record.value)
            .await
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to write {} in {}: {}", record.key, hash_key, e),
            })?;
        Ok(())
    }

    async fn erase(&self, category: RestrictionCategory, key: &str) -> AppResult<()> {
        let mut conn = self.get_redis_connection().await?;
        let hash_key = self.redis_keys.restriction_hash(category);

        let removed: u64 = conn
            .hdel(&hash_key, key)
            .await
            .map_err(|e| AppError::PersistenceError {
                message: format!("Failed to delete {} from {}: {}", key, hash_key, e),
            })?;

        debug!(hash = %hash_key, key, removed, "Erased restriction field");
        Ok(())
    }
}
