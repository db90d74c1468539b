use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

// Root configuration, one section per concern
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
    pub admin: AdminConfig,
    pub cache: CacheConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// No url means the in-memory store is used
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

// No url means caching is disabled
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_seats_per_booking: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// User ids that receive the admin role when their profile is first created.
    pub bootstrap_admins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub seats_ttl_seconds: u64,
    pub movies_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            app: AppConfig {
                host: get("HOST", "0.0.0.0"),
                port: parse(&lookup, "PORT", 5000)?,
                environment: get("ENVIRONMENT", "development"),
                rust_log: get("RUST_LOG", "showtime=debug,tower_http=debug"),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
                pool_size: parse(&lookup, "DB_POOL_SIZE", 20)?,
            },
            redis: RedisConfig {
                url: lookup("REDIS_URL").filter(|v| !v.is_empty()),
            },
            jwt: JwtConfig {
                secret: lookup("JWT_SECRET")
                    .filter(|v| !v.is_empty())
                    .ok_or(ConfigError::Missing("JWT_SECRET"))?,
                leeway_seconds: parse(&lookup, "JWT_LEEWAY_SECONDS", 30)?,
            },
            booking: BookingConfig {
                max_seats_per_booking: parse(&lookup, "BOOKING_MAX_SEATS", 5)?,
            },
            admin: AdminConfig {
                bootstrap_admins: list(lookup("BOOTSTRAP_ADMINS")),
            },
            cache: CacheConfig {
                seats_ttl_seconds: parse(&lookup, "CACHE_SEATS_TTL_SECONDS", 300)?,
                movies_ttl_seconds: parse(&lookup, "CACHE_MOVIES_TTL_SECONDS", 3600)?,
            },
            cors: CorsConfig {
                allowed_origins: list(
                    lookup("CORS_ORIGINS").or_else(|| Some("http://localhost:5173".to_string())),
                ),
            },
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.app.port, 5000);
        assert!(config.database.url.is_none());
        assert!(config.redis.url.is_none());
        assert_eq!(config.booking.max_seats_per_booking, 5);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
        assert!(!config.app.is_production());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_number_is_reported_with_its_name() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "x"), ("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "PORT has an invalid value \"eighty\"");
    }

    #[test]
    fn bootstrap_admins_are_split_and_trimmed() {
        let config = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "x"),
            ("BOOTSTRAP_ADMINS", " user_1, ,user_2 "),
        ]))
        .unwrap();
        assert_eq!(config.admin.bootstrap_admins, vec!["user_1", "user_2"]);
    }
}
