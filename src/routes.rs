//! Route definitions and router setup
//!
//! Configures all page-data routes, the `/api` resource routes, and the
//! middleware stack. The route table mirrors the dashboard surface: pages
//! for projects, snapshots, models, deployments, notebooks, the console
//! and the uploader, plus REST resources for each entity.

mod console;
mod deployments;
mod models;
mod notebooks;
mod projects;
mod root;
mod snapshots;
mod uploader;

use crate::auth::auth_middleware;
use crate::config::Settings;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware_stack = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Routes reachable without a session: health check and the cookie
    // issuance endpoint itself
    let open_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/set-auth-cookie/",
            get(root::set_auth_cookie_get).post(root::set_auth_cookie_post),
        );

    // Everything else requires a session when auth is configured
    let dashboard_routes = Router::new()
        // Dashboard index
        .route("/", get(root::index))
        // Project pages
        .route("/projects/", get(projects::index))
        .route("/projects/new", post(projects::create))
        .route("/projects/{pk}", get(projects::detail))
        // Snapshot pages (the static segment must not be captured by {id})
        .route("/snapshots/", get(snapshots::index))
        .route("/snapshots/analysis", get(snapshots::analysis))
        .route("/snapshots/{id}", get(snapshots::detail))
        // Model pages
        .route("/models/", get(models::index))
        .route("/models/{pk}", get(models::detail))
        // Deployment pages
        .route("/deployments/", get(deployments::index))
        .route("/deployments/{id}", get(deployments::detail))
        // Uploader flow
        .route("/uploader/", get(uploader::index).post(uploader::upload))
        .route("/uploader/uploaded/{pk}/", get(uploader::uploaded))
        // SQL console
        .route("/console/", get(console::index))
        .route("/console/run/", post(console::run_sql))
        // Notebooks and cells
        .route("/notebooks/", get(notebooks::index))
        .route("/notebooks/create/", post(notebooks::create))
        .route("/notebooks/{pk}/", get(notebooks::detail))
        .route("/notebooks/{pk}/rename/", post(notebooks::rename))
        .route("/notebooks/{pk}/reset/", post(notebooks::reset))
        .route("/notebooks/{pk}/cell/add/", post(notebooks::add_cell))
        .route(
            "/notebooks/{notebook_pk}/cell/{cell_pk}/",
            get(notebooks::cell),
        )
        .route(
            "/notebooks/{notebook_pk}/cell/{cell_pk}/edit/",
            post(notebooks::edit_cell),
        )
        .route(
            "/notebooks/{notebook_pk}/cell/{cell_pk}/remove/",
            post(notebooks::remove_cell),
        )
        .route(
            "/notebooks/{notebook_pk}/cell/{cell_pk}/play/",
            post(notebooks::play_cell),
        )
        // REST resources
        .route(
            "/api/projects/",
            get(projects::index).post(projects::create),
        )
        .route(
            "/api/projects/{pk}",
            get(projects::get_one)
                .put(projects::update)
                .delete(projects::remove),
        )
        .route(
            "/api/snapshots/",
            get(snapshots::index).post(snapshots::create),
        )
        .route(
            "/api/snapshots/{id}",
            get(snapshots::get_one).delete(snapshots::remove),
        )
        .route("/api/models/", get(models::index))
        .route(
            "/api/models/{pk}",
            get(models::get_one).delete(models::remove),
        )
        .route(
            "/api/deployments/",
            get(deployments::index).post(deployments::create),
        )
        .route("/api/deployments/{id}", get(deployments::get_one))
        .route("/api/tables/", get(console::list_tables))
        .route("/api/tables/{name}", get(console::table_detail))
        .route("/api/requests/", get(root::list_requests))
        .route(
            "/api/requests/{pk}",
            get(root::get_request).delete(root::remove_request),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    open_routes
        .merge(dashboard_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            root::request_log_middleware,
        ))
        .layer(middleware_stack)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .max_age(Duration::from_secs(3600))
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::state::AppState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Router over a pool that is never connected to; only routes whose
    /// extractors reject before touching the database are exercised.
    fn test_router() -> Router {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.host = Some("localhost".to_string());
        cfg.port = Some(5432);
        cfg.user = Some("postgres".to_string());
        cfg.dbname = Some("unused".to_string());
        let pool = cfg
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .unwrap();

        let settings = Settings {
            server: Default::default(),
            database: Default::default(),
            cors: Default::default(),
            auth: Default::default(),
        };
        let state = Arc::new(AppState::new(pool, settings.auth.clone()));
        create_router(state, &settings)
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        test_router().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        assert_eq!(status_of("GET", "/nope").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("GET", "/projects/7/extra").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_integer_pk_is_404() {
        assert_eq!(status_of("GET", "/models/latest").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of("GET", "/deployments/abc").await, StatusCode::NOT_FOUND);
        assert_eq!(
            status_of("GET", "/notebooks/1/cell/xyz/").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of("GET", "/notebooks/xyz/cell/1/").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn snapshot_analysis_is_not_captured_as_id() {
        // Missing the required ?id= query, so the handler rejects with 400
        // instead of the router treating "analysis" as a snapshot id (404).
        assert_eq!(
            status_of("GET", "/snapshots/analysis").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn wrong_method_is_405() {
        assert_eq!(
            status_of("DELETE", "/console/run/").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            status_of("GET", "/projects/new").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            status_of("PUT", "/notebooks/1/rename/").await,
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn health_is_open() {
        assert_eq!(status_of("GET", "/health").await, StatusCode::OK);
    }
}
