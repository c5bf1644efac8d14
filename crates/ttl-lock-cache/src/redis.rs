//! Redis-backed cache client.

use std::fmt;
use std::time::Duration;

use fred::error::RedisErrorKind;
use fred::prelude::*;
use fred::types::CustomCommand;
use tracing::{debug, instrument};

use ttl_lock_core::error::{LockError, LockResult};

use crate::client::CacheClient;

/// Replaces the value iff it still equals ARGV[1]. ARGV[3] is a TTL in
/// milliseconds, `0` for none.
const COMPARE_AND_SWAP_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        if ARGV[3] == '0' then
            redis.call('set', KEYS[1], ARGV[2])
        else
            redis.call('set', KEYS[1], ARGV[2], 'PX', ARGV[3])
        end
        return 1
    end
    return 0
"#;

/// Deletes the key iff it still equals ARGV[1].
const COMPARE_AND_DELETE_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('del', KEYS[1])
    end
    return 0
"#;

/// A [`CacheClient`] talking to a single Redis server.
#[derive(Clone)]
pub struct RedisCache {
    client: RedisClient,
}

impl RedisCache {
    /// Connects to the server at `url` (`redis://host:port/db`).
    pub async fn new(url: &str) -> LockResult<Self> {
        let config = RedisConfig::from_url(url)
            .map_err(|e| LockError::InvalidArgument(format!("invalid Redis URL: {e}")))?;

        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client
            .wait_for_connect()
            .await
            .map_err(|e| map_redis_error("connect", e))?;
        debug!("connected to redis");

        Ok(Self { client })
    }

    /// Wraps an already connected client.
    pub fn from_client(client: RedisClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    async fn eval(
        &self,
        script: &'static str,
        key: &str,
        args: Vec<RedisValue>,
    ) -> LockResult<i64> {
        let mut command: Vec<RedisValue> = vec![script.into(), 1_i64.into(), key.into()];
        command.extend(args);

        let cmd = CustomCommand::new_static("EVAL", None, false);
        self.client
            .custom(cmd, command)
            .await
            .map_err(|e| map_redis_error("EVAL", e))
    }
}

impl CacheClient for RedisCache {
    #[instrument(level = "trace", skip(self), fields(backend = "redis"))]
    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        self.client
            .get(key)
            .await
            .map_err(|e| map_redis_error("GET", e))
    }

    #[instrument(level = "trace", skip(self, value), fields(backend = "redis"))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> LockResult<()> {
        let _: Option<String> = self
            .client
            .set(key, value, expiration(ttl), None, false)
            .await
            .map_err(|e| map_redis_error("SET", e))?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self, value), fields(backend = "redis"))]
    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> LockResult<bool> {
        // SET NX answers nil when the key already exists.
        let result: Option<String> = self
            .client
            .set(key, value, expiration(ttl), Some(SetOptions::NX), false)
            .await
            .map_err(|e| map_redis_error("SET NX", e))?;
        Ok(result.is_some())
    }

    #[instrument(level = "trace", skip(self, expected, value), fields(backend = "redis"))]
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> LockResult<bool> {
        let ttl_ms = ttl.map_or(0, ttl_millis);
        let swapped = self
            .eval(
                COMPARE_AND_SWAP_LUA,
                key,
                vec![expected.into(), value.into(), ttl_ms.into()],
            )
            .await?;
        Ok(swapped == 1)
    }

    #[instrument(level = "trace", skip(self), fields(backend = "redis"))]
    async fn delete(&self, key: &str) -> LockResult<bool> {
        let removed: i64 = self
            .client
            .del(key)
            .await
            .map_err(|e| map_redis_error("DEL", e))?;
        Ok(removed > 0)
    }

    #[instrument(level = "trace", skip(self, expected), fields(backend = "redis"))]
    async fn compare_and_delete(&self, key: &str, expected: &str) -> LockResult<bool> {
        let removed = self
            .eval(COMPARE_AND_DELETE_LUA, key, vec![expected.into()])
            .await?;
        Ok(removed == 1)
    }
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("connected", &self.client.is_connected())
            .finish()
    }
}

/// PX needs at least one millisecond.
fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX).max(1)
}

fn expiration(ttl: Option<Duration>) -> Option<Expiration> {
    ttl.map(|ttl| Expiration::PX(ttl_millis(ttl)))
}

fn map_redis_error(command: &str, e: RedisError) -> LockError {
    let message = format!("Redis {command} failed: {e}");
    match e.kind() {
        RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => {
            LockError::unavailable(message)
        }
        _ => LockError::backend(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_at_least_one_millisecond() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(3)), 3000);
        assert_eq!(ttl_millis(Duration::MAX), i64::MAX);
    }

    #[test]
    fn connection_errors_are_unavailability() {
        let e = RedisError::new(RedisErrorKind::IO, "connection reset");
        assert!(matches!(
            map_redis_error("GET", e),
            LockError::BackendUnavailable(_)
        ));
        let e = RedisError::new(RedisErrorKind::Parse, "bad reply");
        assert!(matches!(map_redis_error("GET", e), LockError::Backend(_)));
    }
}
