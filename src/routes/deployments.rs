//! Deployment route handlers
//!
//! A deployment promotes a trained model to serve its project. Creating
//! one records which model now answers predictions and under which
//! strategy it was chosen.

use crate::error::{ApiResult, AppError, Pk};
use crate::models::{
    CreateDeploymentRequest, Deployment, Model, Project, Strategy, SuccessResponse, Task,
};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, info};

const DEPLOYMENT_COLUMNS: &str = "id, project_id, model_id, strategy, created_at";

/// Deployment page data: the deployment with its model and project
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetail {
    #[serde(flatten)]
    pub deployment: Deployment,
    pub model: Model,
    pub project: Project,
}

/// List all deployments
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Deployment>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            &format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments ORDER BY created_at DESC"),
            &[],
        )
        .await?;

    let deployments: Vec<Deployment> = rows.iter().map(Deployment::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} deployments found.", deployments.len()),
        deployments,
    )))
}

/// Deployment page data
pub async fn detail(
    State(state): State<SharedState>,
    Pk(id): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<DeploymentDetail>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE id = $1"),
            &[&id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deployment {} not found", id)))?;

    let deployment = Deployment::from_row(&row);

    let model_row = client
        .query_opt(
            "SELECT id, project_id, snapshot_id, algorithm, hyperparams, status,
                    metrics, search, search_params, created_at, updated_at
             FROM models WHERE id = $1",
            &[&deployment.model_id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", deployment.model_id)))?;

    let project_row = client
        .query_opt(
            "SELECT id, name, task, created_at, updated_at FROM projects WHERE id = $1",
            &[&deployment.project_id],
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Project {} not found", deployment.project_id))
        })?;

    Ok(Json(SuccessResponse::with_data(
        "Deployment retrieved successfully.",
        DeploymentDetail {
            deployment,
            model: Model::from_row(&model_row),
            project: Project::from_row(&project_row),
        },
    )))
}

/// Get a single deployment (REST resource)
pub async fn get_one(
    State(state): State<SharedState>,
    Pk(id): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<Deployment>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE id = $1"),
            &[&id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deployment {} not found", id)))?;

    Ok(Json(SuccessResponse::with_data(
        "Deployment retrieved successfully.",
        Deployment::from_row(&row),
    )))
}

/// Deploy a model.
///
/// With `modelId` the model is deployed directly; otherwise the strategy
/// selects one within the given project: `best_score` by the task's key
/// metric, `most_recent` by training time, `rollback` to the previously
/// deployed model.
pub async fn create(
    State(state): State<SharedState>,
    Json(payload): Json<CreateDeploymentRequest>,
) -> ApiResult<Json<SuccessResponse<Deployment>>> {
    let client = state.db_pool.get().await?;

    let model = match payload.model_id {
        Some(model_id) => fetch_deployable_model(&client, model_id).await?,
        None => {
            let project_id = payload.project_id.ok_or_else(|| {
                AppError::BadRequest("Either modelId or projectId is required".to_string())
            })?;
            select_model(&client, project_id, payload.strategy).await?
        }
    };

    debug!("Deploying model {} ({})", model.id, payload.strategy.as_str());

    let row = client
        .query_one(
            &format!(
                "INSERT INTO deployments (project_id, model_id, strategy)
                 VALUES ($1, $2, $3)
                 RETURNING {DEPLOYMENT_COLUMNS}"
            ),
            &[&model.project_id, &model.id, &payload.strategy.as_str()],
        )
        .await?;

    let deployment = Deployment::from_row(&row);

    info!(
        "Model {} deployed to project {} (deployment id: {})",
        deployment.model_id, deployment.project_id, deployment.id
    );

    Ok(Json(SuccessResponse::with_data(
        "Model deployed successfully.",
        deployment,
    )))
}

const MODEL_COLUMNS: &str = "id, project_id, snapshot_id, algorithm, hyperparams, status, \
     metrics, search, search_params, created_at, updated_at";

/// Fetch a model by id and check it finished training
async fn fetch_deployable_model(
    client: &deadpool_postgres::Client,
    model_id: i64,
) -> Result<Model, AppError> {
    let row = client
        .query_opt(
            &format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = $1"),
            &[&model_id],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", model_id)))?;

    let model = Model::from_row(&row);
    if model.status != "successful" {
        return Err(AppError::Conflict(format!(
            "Model {} cannot be deployed (status: {})",
            model.id, model.status
        )));
    }
    Ok(model)
}

/// Pick a model within a project according to the deployment strategy
async fn select_model(
    client: &deadpool_postgres::Client,
    project_id: i64,
    strategy: Strategy,
) -> Result<Model, AppError> {
    match strategy {
        Strategy::Rollback => {
            // Model behind the deployment before the current one
            let row = client
                .query_opt(
                    &format!(
                        "SELECT {MODEL_COLUMNS} FROM models
                         WHERE id = (
                             SELECT model_id FROM deployments
                             WHERE project_id = $1
                             ORDER BY created_at DESC
                             OFFSET 1 LIMIT 1
                         )"
                    ),
                    &[&project_id],
                )
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!(
                        "Project {} has no previous deployment to roll back to",
                        project_id
                    ))
                })?;
            Ok(Model::from_row(&row))
        }
        Strategy::MostRecent => {
            let row = client
                .query_opt(
                    &format!(
                        "SELECT {MODEL_COLUMNS} FROM models
                         WHERE project_id = $1 AND status = 'successful'
                         ORDER BY created_at DESC
                         LIMIT 1"
                    ),
                    &[&project_id],
                )
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Project {} has no successful models",
                        project_id
                    ))
                })?;
            Ok(Model::from_row(&row))
        }
        Strategy::BestScore | Strategy::NewScore => {
            let project_row = client
                .query_opt(
                    "SELECT id, name, task, created_at, updated_at FROM projects WHERE id = $1",
                    &[&project_id],
                )
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Project {} not found", project_id))
                })?;
            let project = Project::from_row(&project_row);
            let task = Task::parse(&project.task).ok_or_else(|| {
                AppError::Internal(format!("Project {} has unknown task '{}'", project.id, project.task))
            })?;

            let rows = client
                .query(
                    &format!(
                        "SELECT {MODEL_COLUMNS} FROM models
                         WHERE project_id = $1 AND status = 'successful'"
                    ),
                    &[&project_id],
                )
                .await?;

            rows.iter()
                .map(Model::from_row)
                .filter(|m| m.metric(task.key_metric()).is_some())
                .max_by(|a, b| {
                    let a = a.metric(task.key_metric()).unwrap_or(f64::NEG_INFINITY);
                    let b = b.metric(task.key_metric()).unwrap_or(f64::NEG_INFINITY);
                    a.total_cmp(&b)
                })
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Project {} has no scored models for metric '{}'",
                        project_id,
                        task.key_metric()
                    ))
                })
        }
        Strategy::Specific => Err(AppError::BadRequest(
            "Strategy 'specific' requires modelId".to_string(),
        )),
    }
}
