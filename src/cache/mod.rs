use redis::{aio::MultiplexedConnection, Client};
use tracing::info;

use crate::config::CacheConfig;

pub mod movies;
pub mod seats;

/// Read-through cache in front of the store. The store stays authoritative:
/// nothing that decides seat availability reads from here.
#[derive(Clone)]
pub struct CacheService {
    conn: MultiplexedConnection,
    ttl: CacheConfig,
}

impl CacheService {
    pub async fn connect(redis_url: &str, ttl: CacheConfig) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connected");
        Ok(Self { conn, ttl })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}
