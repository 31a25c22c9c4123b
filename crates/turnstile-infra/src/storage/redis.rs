//! Redis attempt store.
//!
//! Each key maps to a hash with two fields: `version` (integer, bumped on
//! every write) and `log` (the attempt log as JSON).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use turnstile_core::domain::{AttemptLog, AttemptRecord};
use turnstile_core::ports::{AttemptStore, StoreError};

const VERSION_FIELD: &str = "version";
const LOG_FIELD: &str = "log";

/// Writes the log only when the stored version matches ARGV[1].
/// An empty ARGV[1] means the key must not exist. Returns the new version,
/// or 0 on mismatch.
const COMPARE_AND_SET_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'version')
local expected = ARGV[1]
if expected == '' then
  if current then return 0 end
elseif current ~= expected then
  return 0
end
local next_version = (tonumber(current) or 0) + 1
redis.call('HSET', KEYS[1], 'version', next_version, 'log', ARGV[2])
return next_version
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Namespace prepended to every limiter key
    pub key_prefix: String,
    /// Whether to fall back to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            key_prefix: "turnstile".to_string(),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            key_prefix: std::env::var("TURNSTILE_KEY_PREFIX")
                .unwrap_or_else(|_| "turnstile".to_string()),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis-backed attempt store.
///
/// Uses a connection manager for automatic reconnection. Conditional writes
/// run as a Lua script so the version check and the write are atomic.
pub struct RedisAttemptStore {
    conn: ConnectionManager,
    config: RedisConfig,
    compare_and_set: Script,
}

impl RedisAttemptStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, prefix = %config.key_prefix, "Connected to Redis attempt store");

        Ok(Self {
            conn,
            config,
            compare_and_set: Script::new(COMPARE_AND_SET_SCRIPT),
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisConfig::from_env()).await
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    fn encode(log: &AttemptLog) -> Result<String, StoreError> {
        serde_json::to_string(log).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(
        key: &str,
        mut fields: HashMap<String, String>,
    ) -> Result<Option<AttemptRecord>, StoreError> {
        if fields.is_empty() {
            return Ok(None);
        }

        let version = fields
            .get(VERSION_FIELD)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                StoreError::Serialization(format!("missing or invalid version for key {key}"))
            })?;
        let raw_log = fields.remove(LOG_FIELD).ok_or_else(|| {
            StoreError::Serialization(format!("missing log for key {key}"))
        })?;
        let log = serde_json::from_str(&raw_log)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Some(AttemptRecord {
            key: key.to_string(),
            log,
            version,
        }))
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn
            .hgetall(self.make_key(key))
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;
        Self::decode(key, fields)
    }

    async fn set(&self, key: &str, log: &AttemptLog) -> Result<u64, StoreError> {
        let redis_key = self.make_key(key);
        let payload = Self::encode(log)?;
        let mut conn = self.conn.clone();

        let (version,): (u64,) = redis::pipe()
            .atomic()
            .hincr(&redis_key, VERSION_FIELD, 1)
            .hset(&redis_key, LOG_FIELD, payload)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Ok(version)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        log: &AttemptLog,
        expected_version: Option<u64>,
    ) -> Result<Option<u64>, StoreError> {
        let payload = Self::encode(log)?;
        let expected = expected_version.map(|v| v.to_string()).unwrap_or_default();
        let mut conn = self.conn.clone();

        let version: u64 = self
            .compare_and_set
            .key(self.make_key(key))
            .arg(expected)
            .arg(payload)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        if version == 0 {
            tracing::debug!(key = %key, ?expected_version, "Version mismatch");
            return Ok(None);
        }
        Ok(Some(version))
    }

    async fn delete(&self, key: &str) -> Result<Option<AttemptRecord>, StoreError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();

        let (fields,): (HashMap<String, String>,) = redis::pipe()
            .atomic()
            .hgetall(&redis_key)
            .del(&redis_key)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Operation(e.to_string()))?;

        Self::decode(key, fields)
    }
}
