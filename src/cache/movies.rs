use redis::AsyncCommands;
use tracing::debug;

use crate::cache::CacheService;

const NOW_SHOWING_KEY: &str = "movies:now-showing";

impl CacheService {
    /// Serialized response of the "movies with upcoming shows" listing.
    pub async fn get_now_showing(&self) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn();
        conn.get(NOW_SHOWING_KEY).await
    }

    pub async fn cache_now_showing(&self, json: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn();
        conn.set_ex(NOW_SHOWING_KEY, json, self.ttl.movies_ttl_seconds).await
    }

    /// Called whenever shows or movies are added or removed.
    pub async fn invalidate_now_showing(&self) {
        let mut conn = self.conn();
        let _: Result<(), _> = conn.del(NOW_SHOWING_KEY).await;
        debug!("Invalidated now-showing cache");
    }
}
