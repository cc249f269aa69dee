use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use crate::error::Result;
use crate::queue::ListStore;
use crate::utils::retry::BackoffPolicy;

/// Redis-backed list store. LPUSH at the head, RPOP at the tail, so FIFO
/// order is preserved and concurrent consumers rely on Redis's atomic pop.
pub struct RedisListStore {
    conn: MultiplexedConnection,
}

impl RedisListStore {
    /// Connect and verify the connection with a PING. A failure here is
    /// fatal to the caller; there is no degraded mode.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        info!("Connected to Redis queue store");
        Ok(RedisListStore { conn })
    }

    /// Connect with bounded retries, for binaries that may start before the
    /// queue host is up. Exhausting the policy is still fatal.
    pub async fn connect_with_retry(url: &str, backoff: &BackoffPolicy) -> Result<Self> {
        backoff
            .retry("redis connect", || Self::connect(url))
            .await
    }
}

#[async_trait]
impl ListStore for RedisListStore {
    async fn push_head(&self, list: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(list, payload).await?;
        Ok(())
    }

    async fn pop_tail(&self, list: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.rpop(list, None).await?;
        Ok(payload)
    }

    async fn len(&self, list: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(list).await?)
    }

    async fn range(&self, list: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(list, 0, -1).await?)
    }

    async fn delete(&self, list: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(list).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}
