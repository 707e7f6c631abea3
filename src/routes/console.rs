//! SQL console route handlers
//!
//! The console page lists the queryable tables; `run_sql` executes
//! whatever the user typed, with a statement timeout as the only guard.

use crate::db;
use crate::error::{ApiResult, AppError};
use crate::models::{
    ColumnInfo, RunSqlRequest, SuccessResponse, TableDetail, TableInfo, TableListResponse,
};
use crate::sql::{self, SqlResult};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info};

/// Console page data: tables available to query
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<TableListResponse>>> {
    list_tables(State(state)).await
}

/// Execute ad-hoc SQL from the console
pub async fn run_sql(
    State(state): State<SharedState>,
    Json(payload): Json<RunSqlRequest>,
) -> ApiResult<Json<SuccessResponse<SqlResult>>> {
    let sql = payload.sql.trim();
    if sql.is_empty() {
        return Err(AppError::BadRequest("No SQL to execute".to_string()));
    }

    debug!("Console executing {} bytes of SQL", sql.len());

    let client = state.db_pool.get().await?;
    let result = sql::run_sql(&client, sql).await?;

    info!(
        "Console query returned {} rows in {}ms",
        result.rows.len(),
        result.elapsed_ms
    );

    Ok(Json(SuccessResponse::with_data(
        "Query executed successfully.",
        result,
    )))
}

/// List all user tables (REST resource, read-only)
pub async fn list_tables(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<TableListResponse>>> {
    let client = state.db_pool.get().await?;

    let rows = client.query(db::LIST_TABLES, &[]).await?;
    let tables: Vec<TableInfo> = rows.iter().map(TableInfo::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} tables found.", tables.len()),
        TableListResponse { tables },
    )))
}

/// Column metadata for one table (REST resource, read-only)
pub async fn table_detail(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SuccessResponse<TableDetail>>> {
    sql::validate_identifier(&name)?;

    let client = state.db_pool.get().await?;

    let rows = client.query(db::GET_COLUMNS, &[&name]).await?;
    if rows.is_empty() {
        return Err(AppError::NotFound(format!("Table '{}' not found", name)));
    }

    let columns: Vec<ColumnInfo> = rows.iter().map(ColumnInfo::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        "Table retrieved successfully.",
        TableDetail { name, columns },
    )))
}
