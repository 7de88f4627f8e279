use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use cupcakes_storage::{CupcakeRepository, Database};
use metrics_exporter_prometheus::PrometheusHandle;
use tera::Tera;
use tower_http::services::ServeDir;

use crate::{api, pages, telemetry};

const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");

/// Shared request state; the database handle lives from startup to shutdown.
#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    templates: Arc<Tera>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, templates: Tera) -> Self {
        Self {
            metrics,
            storage,
            templates: Arc::new(templates),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn templates(&self) -> &Tera {
        &self.templates
    }

    pub fn cupcakes(&self) -> CupcakeRepository {
        self.storage.cupcakes()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/api/cupcakes", get(api::list).post(api::create))
        .route(
            "/api/cupcakes/:id",
            get(api::show).patch(api::update).delete(api::remove),
        )
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    let metrics = telemetry::init_metrics().expect("metrics init");
    let database = Database::connect("sqlite::memory:?cache=shared")
        .await
        .expect("connect");
    database.run_migrations().await.expect("migrations");
    let templates = pages::load_templates().expect("templates load");
    AppState::new(metrics, database, templates)
}
