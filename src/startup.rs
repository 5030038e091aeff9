use crate::config::Config;
use crate::db::{
    DbPool, InMemoryTopicStore, PgTopicStore, SharedTopicStore, get_pool_stats, init_db,
};
use crate::topics;
use crate::voting::{EngineSettings, LifecycleManager};
use axum::{
    Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE, HeaderName},
    },
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, warn};

use crate::identity::{USER_ID_HEADER, USER_REGION_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LifecycleManager>,
    pub past_topics_limit: usize,
}

impl AppState {
    /// Connects to Postgres when `DATABASE_URL` is set, otherwise keeps
    /// topics in memory.
    pub async fn new(config: &Config) -> Result<Self, sqlx::Error> {
        let store: SharedTopicStore = match &config.database_url {
            Some(url) => {
                let pool = init_db(url, config.db_max_connections).await?;
                spawn_health_check(pool.clone());
                Arc::new(PgTopicStore::new(pool))
            }
            None => {
                warn!("DATABASE_URL is not set; topics are kept in memory and lost on restart");
                Arc::new(InMemoryTopicStore::new())
            }
        };

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: SharedTopicStore, config: &Config) -> Self {
        AppState {
            manager: Arc::new(LifecycleManager::new(store, EngineSettings::from(config))),
            past_topics_limit: config.past_topics_limit,
        }
    }
}

fn spawn_health_check(pool: DbPool) {
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            match pool.acquire().await {
                Ok(conn) => {
                    drop(conn);
                    debug!("{}", get_pool_stats(&pool));
                }
                Err(e) => {
                    error!("Database connection health check failed: {}", e);
                }
            }
        }
    });
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/topics", post(topics::create_topic))
        .route("/topics/active", get(topics::list_active_topics))
        .route("/topics/past", get(topics::list_past_topics))
        .route("/topics/review", get(topics::review_queue))
        .route("/topics/:topic_id", get(topics::get_topic))
        .route("/topics/:topic_id/votes", post(topics::cast_vote))
        .route("/topics/:topic_id/disposition", post(topics::dispose_topic))
        .route("/topics/:topic_id/complete", post(topics::complete_topic))
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    CONTENT_TYPE,
                    ACCEPT,
                    HeaderName::from_static(USER_ID_HEADER),
                    HeaderName::from_static(USER_REGION_HEADER),
                ]),
        )
        .fallback(handler_404)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
