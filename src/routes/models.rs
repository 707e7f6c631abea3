//! Model route handlers
//!
//! Models are written by the training pipeline; the dashboard lists them,
//! shows their metrics, and allows pruning.

use crate::error::{ApiResult, AppError, Pk};
use crate::models::{MessageResponse, Model, Snapshot, SuccessResponse};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

const MODEL_COLUMNS: &str = "id, project_id, snapshot_id, algorithm, hyperparams, status, \
     metrics, search, search_params, created_at, updated_at";

/// Model page data: the model with the snapshot it trained on
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDetail {
    #[serde(flatten)]
    pub model: Model,
    pub snapshot: Snapshot,
}

/// List all models
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Model>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            &format!("SELECT {MODEL_COLUMNS} FROM models ORDER BY created_at DESC"),
            &[],
        )
        .await?;

    let models: Vec<Model> = rows.iter().map(Model::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} models found.", models.len()),
        models,
    )))
}

/// Model page data
pub async fn detail(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<ModelDetail>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = $1"),
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", pk)))?;

    let model = Model::from_row(&row);

    let snapshot_row = client
        .query_opt(
            "SELECT id, relation_name, y_column_name, test_size, test_sampling,
                    status, columns, analysis, created_at, updated_at
             FROM snapshots WHERE id = $1",
            &[&model.snapshot_id],
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Snapshot {} not found", model.snapshot_id))
        })?;

    Ok(Json(SuccessResponse::with_data(
        "Model retrieved successfully.",
        ModelDetail {
            model,
            snapshot: Snapshot::from_row(&snapshot_row),
        },
    )))
}

/// Get a single model (REST resource)
pub async fn get_one(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<Model>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = $1"),
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", pk)))?;

    Ok(Json(SuccessResponse::with_data(
        "Model retrieved successfully.",
        Model::from_row(&row),
    )))
}

/// Delete a model
pub async fn remove(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let client = state.db_pool.get().await?;

    let rows_affected = client
        .execute("DELETE FROM models WHERE id = $1", &[&pk])
        .await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Model {} not found", pk)));
    }

    info!("Model deleted: {}", pk);

    Ok(Json(MessageResponse::new(format!(
        "Model {} deleted successfully.",
        pk
    ))))
}
