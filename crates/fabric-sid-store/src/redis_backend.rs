//! Redis counter/map backend.
//!
//! The counter is a plain string key driven by `INCR`; the switch mapping is
//! a hash written with `HSETNX` so that two replicas racing on the same
//! switch settle on one value. Raising the counter past the reserved range is
//! a Lua script, which Redis runs atomically.

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info, instrument};

use crate::backend::CounterMapBackend;
use crate::error::{SidStoreError, SidStoreResult};

/// Key of the shared SID counter.
pub const SID_COUNTER_KEY: &str = "fabric-adapter-sid-counter";

/// Key of the hash mapping switch IDs to SIDs.
pub const SID_MAP_KEY: &str = "fabric-adapter-sid-map";

const RESERVE_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local floor = tonumber(ARGV[1])
if current < floor then
    redis.call('SET', KEYS[1], floor)
    current = floor
end
return current
"#;

/// Counter and map stored on a Redis server.
pub struct RedisBackend {
    connection: Mutex<Option<ConnectionManager>>,
    counter_key: String,
    map_key: String,
}

impl RedisBackend {
    /// Connects to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`).
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> SidStoreResult<Self> {
        debug!("Connecting to Redis SID backend");
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis SID backend");

        Ok(Self {
            connection: Mutex::new(Some(connection)),
            counter_key: SID_COUNTER_KEY.to_string(),
            map_key: SID_MAP_KEY.to_string(),
        })
    }

    /// Uses different key names, e.g. to isolate test runs.
    pub fn with_keys(mut self, counter_key: impl Into<String>, map_key: impl Into<String>) -> Self {
        self.counter_key = counter_key.into();
        self.map_key = map_key.into();
        self
    }

    fn conn(&self) -> SidStoreResult<ConnectionManager> {
        self.connection.lock().clone().ok_or(SidStoreError::Closed)
    }
}

#[async_trait]
impl CounterMapBackend for RedisBackend {
    async fn reserve_below(&self, floor: i64) -> SidStoreResult<i64> {
        let mut conn = self.conn()?;
        let value: i64 = Script::new(RESERVE_SCRIPT)
            .key(&self.counter_key)
            .arg(floor)
            .invoke_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn increment(&self) -> SidStoreResult<i64> {
        let mut conn = self.conn()?;
        let value: i64 = conn.incr(&self.counter_key, 1).await?;
        Ok(value)
    }

    async fn map_get(&self, key: &str) -> SidStoreResult<Option<String>> {
        let mut conn = self.conn()?;
        let value: Option<String> = conn.hget(&self.map_key, key).await?;
        Ok(value)
    }

    async fn map_put_if_absent(&self, key: &str, value: &str) -> SidStoreResult<bool> {
        let mut conn = self.conn()?;
        let created: bool = conn.hset_nx(&self.map_key, key, value).await?;
        Ok(created)
    }

    async fn close(&self) -> SidStoreResult<()> {
        // Dropping the last manager clone closes the multiplexed connection.
        self.connection.lock().take();
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
