//! MLBoard API - ML Workflow Dashboard
//!
//! A dashboard backend over an ML workflow store: projects, snapshots,
//! models and deployments, plus SQL notebooks, an ad-hoc console and a
//! CSV uploader. Training itself happens elsewhere; this service records
//! and serves the workflow state from PostgreSQL.

mod auth;
mod config;
mod db;
mod error;
mod models;
mod routes;
mod sql;
mod state;

use crate::config::{DatabaseConfig, Settings};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting MLBoard - ML Workflow Dashboard...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.auth.dashboard_token.is_none() {
        warn!("⚠️  DASHBOARD_AUTH_TOKEN not set, dashboard is open (development mode)");
    }

    // Initialize database pool - REQUIRED (no fallback to in-memory)
    let state = match init_database_pool(&settings.database).await {
        Ok(pool) => {
            info!("✅ Database pool created successfully");

            // Create dashboard tables if they don't exist
            if let Err(e) = db::bootstrap_schema(&pool).await {
                warn!("⚠️  Warning creating tables: {}", e);
            }

            Arc::new(AppState::new(pool, settings.auth.clone()))
        }
        Err(e) => {
            error!("❌ FATAL: Failed to initialize database pool: {}", e);
            error!("DATABASE_URL must be set in .env and database must be accessible");
            anyhow::bail!("Cannot start server without database connection");
        }
    };

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 Dashboard Endpoints:");
    info!("   GET  /                         - Dashboard overview");
    info!("   GET  /projects/                - List projects");
    info!("   POST /projects/new             - Create project");
    info!("   GET  /snapshots/               - List snapshots");
    info!("   GET  /snapshots/analysis       - Snapshot column analysis");
    info!("   GET  /models/                  - List models");
    info!("   GET  /deployments/             - List deployments");
    info!("   GET  /notebooks/               - List notebooks");
    info!("   POST /console/run/             - Run ad-hoc SQL");
    info!("   POST /uploader/                - Upload a CSV file");
    info!("   GET  /set-auth-cookie/         - Exchange token for session cookie");
    info!("");
    info!("   REST resources under /api: projects, snapshots, models,");
    info!("   deployments, tables, requests");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mlboard_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Initialize database pool from the loaded settings
async fn init_database_pool(database: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod};

    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.dbname = Some(database.database.clone());
    cfg.pool = Some(PoolConfig::new(database.max_pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    // Create pool with TLS support if the DSN requires it
    let pool = if database.tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(deadpool_postgres::Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    // Test the connection
    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;

    // Simple test query to verify connection works
    let _row = client
        .query_one("SELECT 1 as ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!("✅ Database connection successful (TLS: {})", database.tls);
    Ok(pool)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
