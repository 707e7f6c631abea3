//! Snapshot route handlers
//!
//! Snapshots capture a training relation: at capture time the relation is
//! verified, its columns recorded, and per-column statistics computed with
//! SQL aggregates. The page endpoints serve the stored results.

use crate::db;
use crate::error::{validation_error, ApiResult, AppError, Pk};
use crate::models::{
    AnalysisQuery, CreateSnapshotRequest, MessageResponse, Model, Snapshot, SuccessResponse,
};
use crate::sql::{self, SqlResult};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Json,
};
use deadpool_postgres::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use validator::Validate;

const SNAPSHOT_COLUMNS: &str = "id, relation_name, y_column_name, test_size, test_sampling, \
     status, columns, analysis, created_at, updated_at";

/// Column types the analysis computes statistics for
const NUMERIC_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "bigint",
    "real",
    "double precision",
    "numeric",
    "decimal",
];

/// Snapshot page data: the snapshot, models trained on it, and a sample
/// of the captured relation (when it still exists)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDetail {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub models: Vec<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<SqlResult>,
}

/// List all snapshots
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Snapshot>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots ORDER BY created_at DESC"),
            &[],
        )
        .await?;

    let snapshots: Vec<Snapshot> = rows.iter().map(Snapshot::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} snapshots found.", snapshots.len()),
        snapshots,
    )))
}

/// Snapshot page data
pub async fn detail(
    State(state): State<SharedState>,
    Pk(id): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<SnapshotDetail>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = $1"),
            &[&id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Snapshot {} not found", id)))?;

    let snapshot = Snapshot::from_row(&row);

    let model_rows = client
        .query(
            "SELECT id, project_id, snapshot_id, algorithm, hyperparams, status,
                    metrics, search, search_params, created_at, updated_at
             FROM models
             WHERE snapshot_id = $1
             ORDER BY created_at DESC",
            &[&id],
        )
        .await?;
    let models: Vec<Model> = model_rows.iter().map(Model::from_row).collect();

    // The captured relation may have been dropped since; the page still
    // renders without the sample grid
    let sample = match sql::validate_relation_name(&snapshot.relation_name) {
        Ok(()) => sql::run_sql(
            &client,
            &format!("SELECT * FROM {} LIMIT 10", snapshot.relation_name),
        )
        .await
        .ok(),
        Err(_) => None,
    };

    Ok(Json(SuccessResponse::with_data(
        "Snapshot retrieved successfully.",
        SnapshotDetail {
            snapshot,
            models,
            sample,
        },
    )))
}

/// Per-column analysis for a snapshot (`?id=&column=`)
pub async fn analysis(
    State(state): State<SharedState>,
    Query(query): Query<AnalysisQuery>,
) -> ApiResult<Json<SuccessResponse<Value>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            "SELECT analysis FROM snapshots WHERE id = $1",
            &[&query.id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Snapshot {} not found", query.id)))?;

    let analysis: Option<Value> = row.get("analysis");
    let analysis = analysis
        .ok_or_else(|| AppError::NotFound(format!("Snapshot {} has no analysis", query.id)))?;

    let data = match &query.column {
        Some(column) => analysis
            .get("columns")
            .and_then(|c| c.get(column))
            .cloned()
            .ok_or_else(|| {
                AppError::NotFound(format!("No analysis for column '{}'", column))
            })?,
        None => analysis,
    };

    Ok(Json(SuccessResponse::with_data("Snapshot analysis.", data)))
}

/// Capture a snapshot of a relation
pub async fn create(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSnapshotRequest>,
) -> ApiResult<Json<SuccessResponse<Snapshot>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;
    sql::validate_relation_name(&payload.relation_name)?;
    sql::validate_identifier(&payload.y_column_name)?;

    debug!("Capturing snapshot of {}", payload.relation_name);

    let client = state.db_pool.get().await?;

    if !db::relation_exists(&client, &payload.relation_name).await? {
        return Err(AppError::NotFound(format!(
            "Relation '{}' does not exist",
            payload.relation_name
        )));
    }

    let columns = relation_columns(&client, &payload.relation_name).await?;
    if !columns
        .iter()
        .any(|c| c["name"].as_str() == Some(payload.y_column_name.as_str()))
    {
        return Err(AppError::Validation(format!(
            "Column '{}' does not exist on '{}'",
            payload.y_column_name, payload.relation_name
        )));
    }

    let analysis = analyze_relation(&client, &payload.relation_name, &columns).await?;

    let row = client
        .query_one(
            &format!(
                "INSERT INTO snapshots
                     (relation_name, y_column_name, test_size, test_sampling,
                      status, columns, analysis)
                 VALUES ($1, $2, $3, $4, 'created', $5, $6)
                 RETURNING {SNAPSHOT_COLUMNS}"
            ),
            &[
                &payload.relation_name,
                &payload.y_column_name,
                &payload.test_size,
                &payload.test_sampling.as_str(),
                &Value::Array(columns),
                &analysis,
            ],
        )
        .await?;

    let snapshot = Snapshot::from_row(&row);

    info!(
        "Snapshot captured: {} (id: {}, {} samples)",
        snapshot.relation_name,
        snapshot.id,
        snapshot.sample_count().unwrap_or(0)
    );

    Ok(Json(SuccessResponse::with_data(
        "Snapshot captured successfully.",
        snapshot,
    )))
}

/// Get a single snapshot (REST resource)
pub async fn get_one(
    State(state): State<SharedState>,
    Pk(id): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<Snapshot>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = $1"),
            &[&id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Snapshot {} not found", id)))?;

    Ok(Json(SuccessResponse::with_data(
        "Snapshot retrieved successfully.",
        Snapshot::from_row(&row),
    )))
}

/// Delete a snapshot (cascades to models trained on it)
pub async fn remove(
    State(state): State<SharedState>,
    Pk(id): Pk<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let client = state.db_pool.get().await?;

    let rows_affected = client
        .execute("DELETE FROM snapshots WHERE id = $1", &[&id])
        .await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Snapshot {} not found", id)));
    }

    info!("Snapshot deleted: {}", id);

    Ok(Json(MessageResponse::new(format!(
        "Snapshot {} deleted successfully.",
        id
    ))))
}

/// Column metadata for a (possibly schema-qualified) relation, as JSON
/// objects `{name, type, nullable}` in ordinal order
async fn relation_columns(client: &Client, relation: &str) -> Result<Vec<Value>, AppError> {
    let (schema, table) = match relation.split_once('.') {
        Some((schema, table)) => (schema.to_string(), table.to_string()),
        None => ("public".to_string(), relation.to_string()),
    };

    let rows = client
        .query(
            "SELECT column_name, data_type, is_nullable = 'YES' AS nullable
             FROM information_schema.columns
             WHERE table_schema = $1 AND table_name = $2
             ORDER BY ordinal_position",
            &[&schema, &table],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            json!({
                "name": row.get::<_, String>("column_name"),
                "type": row.get::<_, String>("data_type"),
                "nullable": row.get::<_, bool>("nullable"),
            })
        })
        .collect())
}

/// Compute per-column statistics for the numeric columns of a relation.
///
/// One aggregate query per numeric column: count, min, max, mean, stddev
/// and quartiles, everything cast to double precision.
async fn analyze_relation(
    client: &Client,
    relation: &str,
    columns: &[Value],
) -> Result<Value, AppError> {
    let total: i64 = client
        .query_one(&format!("SELECT count(*) FROM {}", relation), &[])
        .await?
        .get(0);

    let mut column_stats = serde_json::Map::new();

    for column in columns {
        let name = match column["name"].as_str() {
            Some(name) => name,
            None => continue,
        };
        let data_type = column["type"].as_str().unwrap_or_default();
        if !NUMERIC_TYPES.contains(&data_type) {
            continue;
        }

        let quoted = sql::quote_identifier(name);
        let stats_sql = format!(
            "SELECT
                count({quoted})::bigint AS count,
                min({quoted})::double precision AS min,
                max({quoted})::double precision AS max,
                avg({quoted})::double precision AS mean,
                stddev({quoted})::double precision AS stddev,
                percentile_cont(0.25) WITHIN GROUP (ORDER BY {quoted})::double precision AS p25,
                percentile_cont(0.5) WITHIN GROUP (ORDER BY {quoted})::double precision AS median,
                percentile_cont(0.75) WITHIN GROUP (ORDER BY {quoted})::double precision AS p75
             FROM {relation}"
        );

        let row = match client.query_one(&stats_sql, &[]).await {
            Ok(row) => row,
            Err(e) => {
                // A column of a numeric domain type can still fail to
                // aggregate; skip it rather than failing the capture
                warn!("Skipping analysis of column '{}': {}", name, e);
                continue;
            }
        };

        let count: i64 = row.get("count");
        column_stats.insert(
            name.to_string(),
            json!({
                "count": count,
                "nulls": total - count,
                "min": row.get::<_, Option<f64>>("min"),
                "max": row.get::<_, Option<f64>>("max"),
                "mean": row.get::<_, Option<f64>>("mean"),
                "stddev": row.get::<_, Option<f64>>("stddev"),
                "p25": row.get::<_, Option<f64>>("p25"),
                "median": row.get::<_, Option<f64>>("median"),
                "p75": row.get::<_, Option<f64>>("p75"),
            }),
        );
    }

    Ok(json!({
        "samples": total,
        "columns": Value::Object(column_stats),
    }))
}
