//! Redis integration service implementation
//!
//! All Redis access of the application goes through this service: JSON
//! values with a TTL (login locks), counters with a fixed window (failed
//! logins), `SET NX EX` locks for the beat schedule and the list primitives
//! behind the task queue.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::settings::Settings;
use crate::utils::errors::Result;

/// Connection attempts made when the shared manager is first created
const CONNECT_RETRIES: usize = 2;

/// Redis service shared by the API, worker and beat
#[derive(Clone)]
pub struct RedisService {
    client: Client,
    /// Created on first use so the service can be built without a reachable server
    manager: Arc<OnceCell<ConnectionManager>>,
    prefix: String,
    default_ttl: u64,
}

impl std::fmt::Debug for RedisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisService")
            .field("prefix", &self.prefix)
            .field("connected", &self.manager.initialized())
            .finish()
    }
}

impl RedisService {
    /// Parse the URL; no connection is opened yet
    pub fn new(settings: Settings) -> Result<Self> {
        let client = Client::open(settings.redis.url.as_str())?;

        Ok(Self {
            client,
            manager: Arc::new(OnceCell::new()),
            prefix: settings.redis.prefix,
            default_ttl: settings.redis.ttl_seconds,
        })
    }

    /// Clone of the shared, self-reconnecting connection
    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .manager
            .get_or_try_init(|| self.client.get_connection_manager_with_backoff(2, 100, CONNECT_RETRIES))
            .await?;
        Ok(manager.clone())
    }

    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Store a JSON value; `None` uses the configured default TTL
    pub async fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize,
    {
        let mut conn = self.connection().await?;
        let full_key = self.key(key);
        let ttl = ttl_seconds.unwrap_or(self.default_ttl);

        let _: () = conn.set_ex(&full_key, serde_json::to_string(value)?, ttl).await?;
        debug!(key = %full_key, ttl, "Value stored");
        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.key(key)).await?;

        Ok(match raw {
            Some(data) => Some(serde_json::from_str(&data)?),
            None => None,
        })
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let deleted: i64 = conn.del(self.key(key)).await?;
        Ok(deleted > 0)
    }

    /// Increment a counter; the expiry is set by the first increment so the window is fixed
    pub async fn increment_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64> {
        let mut conn = self.connection().await?;
        let full_key = self.key(key);

        let value: i64 = conn.incr(&full_key, 1).await?;
        if value == 1 {
            let _: bool = conn.expire(&full_key, ttl_seconds as i64).await?;
        }

        debug!(key = %full_key, value, ttl = ttl_seconds, "Counter incremented");
        Ok(value)
    }

    /// Take a lock with `SET NX EX`; false when someone else holds it
    pub async fn try_lock(&self, name: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.connection().await?;
        let full_key = self.key(&format!("lock:{}", name));

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(chrono::Utc::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        debug!(key = %full_key, acquired = acquired.is_some(), "Lock attempt");
        Ok(acquired.is_some())
    }

    /// Push a raw payload on the head of a list
    pub async fn push(&self, list: &str, payload: &str) -> Result<i64> {
        let mut conn = self.connection().await?;
        let length: i64 = conn.lpush(self.key(list), payload).await?;
        Ok(length)
    }

    /// Blocking pop from the tail of a list; `None` after `timeout_seconds`
    ///
    /// Runs on its own connection: a BRPOP on the shared manager would stall
    /// every other command until it returns.
    pub async fn pop_blocking(&self, list: &str, timeout_seconds: u64) -> Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(self.key(list))
            .arg(timeout_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(popped.map(|(_, payload)| payload))
    }

    pub async fn list_length(&self, list: &str) -> Result<i64> {
        let mut conn = self.connection().await?;
        let length: i64 = conn.llen(self.key(list)).await?;
        Ok(length)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                return Ok(false);
            }
        };

        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(response) => Ok(response == "PONG"),
            Err(e) => {
                warn!(error = %e, "Redis health check failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> RedisService {
        let mut settings = Settings::default();
        settings.redis.url = "redis://127.0.0.1:1/".to_string();
        RedisService::new(settings).unwrap()
    }

    #[test]
    fn test_keys_are_prefixed() {
        let mut settings = Settings::default();
        settings.redis.prefix = "test:".to_string();
        let service = RedisService::new(settings).unwrap();
        assert_eq!(service.key("lock:beat"), "test:lock:beat");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut settings = Settings::default();
        settings.redis.url = "not a url".to_string();
        assert!(RedisService::new(settings).is_err());
    }

    #[test]
    fn test_clones_share_one_connection() {
        let service = RedisService::new(Settings::default()).unwrap();
        let clone = service.clone();
        assert!(Arc::ptr_eq(&service.manager, &clone.manager));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_not_cached() {
        let service = unreachable();
        assert!(!service.health_check().await.unwrap());
        assert!(service.delete("k").await.is_err());
        // a failed connect leaves the cell empty so a later call tries again
        assert!(!service.manager.initialized());
    }
}
