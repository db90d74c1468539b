pub mod cache;
pub mod config;
pub mod controllers;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::cache::CacheService;
use crate::config::{Config, CorsConfig};
use crate::middleware::TokenVerifier;
use crate::services::Reservations;
use crate::store::{MemoryStore, PgStore, Store};

// Shared state for the whole application
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Option<CacheService>,
    pub reservations: Reservations,
    pub tokens: TokenVerifier,
    pub config: Config,
}

impl AppState {
    /// Connects the backends named in `config`. Without `DATABASE_URL` the
    /// in-memory store is used; without `REDIS_URL` nothing is cached.
    pub async fn new(config: Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let store: Arc<dyn Store> = match &config.database.url {
            Some(url) => {
                let pg = PgStore::connect(url, config.database.pool_size).await?;
                pg.run_migrations().await?;
                Arc::new(pg)
            }
            None => {
                warn!("DATABASE_URL not set, using the in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let cache = match &config.redis.url {
            Some(url) => Some(CacheService::connect(url, config.cache.clone()).await?),
            None => {
                info!("REDIS_URL not set, caching disabled");
                None
            }
        };

        Ok(Self::with_store(store, cache, config))
    }

    pub fn with_store(store: Arc<dyn Store>, cache: Option<CacheService>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            reservations: Reservations::new(store.clone(), &config.booking),
            tokens: TokenVerifier::new(&config.jwt),
            store,
            cache,
            config,
        })
    }
}

/// The full HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/", get(|| async { "Showtime API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
