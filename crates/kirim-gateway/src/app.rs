use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono_tz::Tz;

use kirim_channels::Messenger;
use kirim_core::config::KirimConfig;
use kirim_scheduler::TickDriver;
use kirim_store::Store;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: KirimConfig,
    pub store: Store,
    pub messenger: Arc<dyn Messenger>,
    pub driver: Arc<TickDriver>,
    pub tz: Tz,
}

impl AppState {
    pub fn new(
        config: KirimConfig,
        store: Store,
        messenger: Arc<dyn Messenger>,
        driver: Arc<TickDriver>,
        tz: Tz,
    ) -> Self {
        Self {
            config,
            store,
            messenger,
            driver,
            tz,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/categories",
            get(crate::http::categories::list).post(crate::http::categories::create),
        )
        .route(
            "/api/categories/{id}",
            delete(crate::http::categories::remove),
        )
        .route(
            "/api/posts",
            get(crate::http::posts::list).post(crate::http::posts::create),
        )
        .route(
            "/api/posts/{id}",
            get(crate::http::posts::fetch)
                .put(crate::http::posts::update)
                .delete(crate::http::posts::remove),
        )
        .route(
            "/api/schedules",
            get(crate::http::schedules::list).post(crate::http::schedules::create),
        )
        .route(
            "/api/schedules/{id}",
            get(crate::http::schedules::fetch)
                .put(crate::http::schedules::update)
                .delete(crate::http::schedules::remove),
        )
        .route("/api/jobs", get(crate::http::jobs::list))
        .route("/api/jobs/send-now", post(crate::http::jobs::send_now))
        .route(
            "/api/config",
            get(crate::http::destination::fetch).put(crate::http::destination::set),
        )
        .route("/api/scheduler/run", post(crate::http::scheduler::run_once))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}
