// Redis store backend
//
// One multiplexed connection per process, cloned per command. Commands are
// sent exactly once; only the initial connect is attempted more than once.

use super::KeyValueStore;
use crate::error::StoreError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_BACKOFF_STEP: Duration = Duration::from_millis(200);

pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Parse `url` and connect, making at most `max_attempts` attempts.
    pub async fn connect(url: &str, max_attempts: u32) -> Result<Self> {
        let client = redis::Client::open(url).context("Redis URI can't be parsed")?;

        info!(
            server = %format!("redis://:*****@{}", client.get_connection_info().addr),
            max_attempts,
            "Connecting to redis"
        );

        let mut attempt = 1;
        loop {
            match client.get_multiplexed_tokio_connection().await {
                Ok(conn) => {
                    info!(attempt, "Connected to redis");
                    return Ok(Self { conn });
                }
                Err(e) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Redis connection attempt failed");
                    tokio::time::sleep(CONNECT_BACKOFF_STEP * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to connect to redis after {} attempts", attempt)
                    });
                }
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count: usize = conn.scard(key).await?;
        Ok(count)
    }

    async fn random_member(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let member: Option<String> = conn.srandmember(key).await?;
        Ok(member)
    }

    async fn add_member(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: usize = conn.sadd(key, member).await?;
        Ok(added == 1)
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize, StoreError> {
        // SADD without members is a syntax error
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let added: usize = conn.sadd(key, members).await?;
        Ok(added)
    }

    async fn delete_key(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let deleted: usize = conn.del(key).await?;
        Ok(deleted)
    }

    async fn increment_field(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.hincr(key, field, delta).await?;
        Ok(value)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("QUIT").query_async(&mut conn).await?;
        Ok(())
    }
}
