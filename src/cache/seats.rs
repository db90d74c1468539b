use redis::{AsyncCommands, Script};
use tracing::debug;

use crate::cache::CacheService;

// Occupancy only grows, so a snapshot with fewer seats than the cached one
// is older and must not replace it.
const STORE_IF_NOT_OLDER: &str = r#"
local current = tonumber(redis.call('HGET', KEYS[1], 'count') or '-1')
if tonumber(ARGV[1]) < current then
    return 0
end
redis.call('HSET', KEYS[1], 'count', ARGV[1], 'seats', ARGV[2])
redis.call('EXPIRE', KEYS[1], ARGV[3])
return 1
"#;

fn seats_key(show_id: i64) -> String {
    format!("seats:{}", show_id)
}

/// Hash fields written for one occupancy snapshot: seat count and label list.
fn snapshot(seats: &[String]) -> Result<(usize, String), redis::RedisError> {
    let data = serde_json::to_string(seats).map_err(|_| {
        redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
    })?;
    Ok((seats.len(), data))
}

impl CacheService {
    /// Occupied seat labels of a show, if cached.
    pub async fn get_occupied_seats(&self, show_id: i64) -> Result<Option<Vec<String>>, redis::RedisError> {
        let mut conn = self.conn();
        let data: Option<String> = conn.hget(seats_key(show_id), "seats").await?;
        Ok(data.and_then(|json| serde_json::from_str(&json).ok()))
    }

    /// Stores a snapshot unless the cache already holds a larger one.
    /// Returns whether the snapshot was written.
    pub async fn cache_occupied_seats(&self, show_id: i64, seats: &[String]) -> Result<bool, redis::RedisError> {
        let (count, data) = snapshot(seats)?;
        let mut conn = self.conn();
        let written: i32 = Script::new(STORE_IF_NOT_OLDER)
            .key(seats_key(show_id))
            .arg(count)
            .arg(data)
            .arg(self.ttl.seats_ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        if written == 0 {
            debug!("Kept newer seats cache for show {}", show_id);
        }
        Ok(written == 1)
    }

    pub async fn invalidate_seats(&self, show_id: i64) {
        let mut conn = self.conn();
        let _: Result<(), _> = conn.del(seats_key(show_id)).await;
        debug!("Invalidated seats cache for show {}", show_id);
    }
}
