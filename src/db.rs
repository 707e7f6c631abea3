//! Database schema bootstrap and catalog queries
//!
//! The dashboard's own tables are created at startup if missing, the same
//! way a fresh deployment comes up with no migration step.

use crate::error::AppError;
use deadpool_postgres::Pool;
use tracing::info;

/// List all user tables (pg_catalog, excluding system schemas)
pub const LIST_TABLES: &str = r#"
    SELECT
        n.nspname AS schema,
        c.relname AS name,
        pg_catalog.pg_get_userbyid(c.relowner) AS owner,
        c.reltuples::bigint AS row_estimate
    FROM pg_catalog.pg_class c
        LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r','p','v','m')
        AND n.nspname <> 'pg_catalog'
        AND n.nspname !~ '^pg_toast'
        AND n.nspname <> 'information_schema'
        AND pg_catalog.pg_table_is_visible(c.oid)
    ORDER BY schema, name
"#;

/// Get column name/type information for a table in the public schema
pub const GET_COLUMNS: &str = r#"
    SELECT
        c.column_name,
        c.data_type,
        c.is_nullable = 'YES' AS nullable,
        c.ordinal_position
    FROM information_schema.columns c
    WHERE c.table_schema = 'public'
        AND c.table_name = $1
    ORDER BY c.ordinal_position
"#;

/// Check whether a relation is visible on the search path
pub const RELATION_EXISTS: &str = "SELECT to_regclass($1) IS NOT NULL AS found";

/// Create dashboard tables if they don't exist
pub async fn bootstrap_schema(pool: &Pool) -> Result<(), AppError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS projects (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                task VARCHAR(32) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id BIGSERIAL PRIMARY KEY,
                relation_name VARCHAR(255) NOT NULL,
                y_column_name VARCHAR(255) NOT NULL,
                test_size REAL NOT NULL DEFAULT 0.25,
                test_sampling VARCHAR(32) NOT NULL DEFAULT 'random',
                status VARCHAR(32) NOT NULL DEFAULT 'created',
                columns JSONB,
                analysis JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS models (
                id BIGSERIAL PRIMARY KEY,
                project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                snapshot_id BIGINT NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
                algorithm VARCHAR(64) NOT NULL,
                hyperparams JSONB,
                status VARCHAR(32) NOT NULL DEFAULT 'created',
                metrics JSONB,
                search VARCHAR(32),
                search_params JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS deployments (
                id BIGSERIAL PRIMARY KEY,
                project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                model_id BIGINT NOT NULL REFERENCES models(id) ON DELETE CASCADE,
                strategy VARCHAR(32) NOT NULL DEFAULT 'most_recent',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS notebooks (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS notebook_cells (
                id BIGSERIAL PRIMARY KEY,
                notebook_id BIGINT NOT NULL REFERENCES notebooks(id) ON DELETE CASCADE,
                cell_type VARCHAR(16) NOT NULL,
                contents TEXT NOT NULL DEFAULT '',
                rendering JSONB,
                execution_time_ms BIGINT,
                cell_number INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                deleted_at TIMESTAMPTZ
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS uploaded_files (
                id BIGSERIAL PRIMARY KEY,
                table_name VARCHAR(255) NOT NULL DEFAULT '',
                file_name VARCHAR(255) NOT NULL,
                columns JSONB NOT NULL,
                row_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS request_log (
                id BIGSERIAL PRIMARY KEY,
                method VARCHAR(10) NOT NULL,
                path VARCHAR(1024) NOT NULL,
                status SMALLINT NOT NULL,
                elapsed_ms BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await?;

    // Indexes for the common list queries
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_models_project_id ON models(project_id)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_models_snapshot_id ON models(snapshot_id)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_deployments_project_id ON deployments(project_id)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_notebook_cells_notebook_id
             ON notebook_cells(notebook_id, cell_number)",
            &[],
        )
        .await;
    let _ = client
        .execute(
            "CREATE INDEX IF NOT EXISTS idx_request_log_created_at ON request_log(created_at)",
            &[],
        )
        .await;

    info!("Dashboard tables initialized");
    Ok(())
}

/// Check whether a relation exists and is visible
pub async fn relation_exists(
    client: &deadpool_postgres::Client,
    relation: &str,
) -> Result<bool, AppError> {
    let row = client.query_one(RELATION_EXISTS, &[&relation]).await?;
    Ok(row.get("found"))
}
