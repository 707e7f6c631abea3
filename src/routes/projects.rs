//! Project route handlers
//!
//! CRUD over projects, plus the project page data (the project with its
//! trained models and the currently deployed one).

use crate::error::{validation_error, ApiResult, AppError, Pk};
use crate::models::{
    CreateProjectRequest, MessageResponse, Model, Project, SuccessResponse, UpdateProjectRequest,
};
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, info};
use validator::Validate;

const PROJECT_COLUMNS: &str = "id, name, task, created_at, updated_at";

/// Project page data: the project, its models, and the deployed model
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub models: Vec<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_model: Option<Model>,
}

/// List all projects
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Project>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            &format!(
                "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"
            ),
            &[],
        )
        .await?;

    let projects: Vec<Project> = rows.iter().map(Project::from_row).collect();

    debug!("Found {} projects", projects.len());

    Ok(Json(SuccessResponse::with_data(
        format!("{} projects found.", projects.len()),
        projects,
    )))
}

/// Create a new project
pub async fn create(
    State(state): State<SharedState>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<Json<SuccessResponse<Project>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    debug!("Creating project: {}", payload.name);

    let client = state.db_pool.get().await?;

    let row = client
        .query_one(
            &format!(
                "INSERT INTO projects (name, task)
                 VALUES ($1, $2)
                 RETURNING {PROJECT_COLUMNS}"
            ),
            &[&payload.name, &payload.task.as_str()],
        )
        .await?;

    let project = Project::from_row(&row);

    info!("Project created: {} (id: {})", project.name, project.id);

    Ok(Json(SuccessResponse::with_data(
        "Project created successfully.",
        project,
    )))
}

/// Project page data
pub async fn detail(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<ProjectDetail>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"),
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", pk)))?;

    let project = Project::from_row(&row);

    let model_rows = client
        .query(
            "SELECT id, project_id, snapshot_id, algorithm, hyperparams, status,
                    metrics, search, search_params, created_at, updated_at
             FROM models
             WHERE project_id = $1
             ORDER BY created_at DESC",
            &[&pk],
        )
        .await?;
    let models: Vec<Model> = model_rows.iter().map(Model::from_row).collect();

    // The model behind the most recent deployment of this project
    let deployed_model = client
        .query_opt(
            "SELECT m.id, m.project_id, m.snapshot_id, m.algorithm, m.hyperparams,
                    m.status, m.metrics, m.search, m.search_params,
                    m.created_at, m.updated_at
             FROM deployments d
             JOIN models m ON m.id = d.model_id
             WHERE d.project_id = $1
             ORDER BY d.created_at DESC
             LIMIT 1",
            &[&pk],
        )
        .await?
        .map(|row| Model::from_row(&row));

    Ok(Json(SuccessResponse::with_data(
        "Project retrieved successfully.",
        ProjectDetail {
            project,
            models,
            deployed_model,
        },
    )))
}

/// Get a single project (REST resource)
pub async fn get_one(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<Project>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"),
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", pk)))?;

    Ok(Json(SuccessResponse::with_data(
        "Project retrieved successfully.",
        Project::from_row(&row),
    )))
}

/// Update a project
pub async fn update(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
    Json(payload): Json<UpdateProjectRequest>,
) -> ApiResult<Json<SuccessResponse<Project>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    debug!("Updating project: {}", pk);

    let client = state.db_pool.get().await?;

    let task = payload.task.map(|t| t.as_str());
    let row = client
        .query_opt(
            &format!(
                "UPDATE projects
                 SET name = COALESCE($1, name),
                     task = COALESCE($2, task),
                     updated_at = now()
                 WHERE id = $3
                 RETURNING {PROJECT_COLUMNS}"
            ),
            &[&payload.name, &task, &pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", pk)))?;

    let project = Project::from_row(&row);

    info!("Project updated: {} (id: {})", project.name, project.id);

    Ok(Json(SuccessResponse::with_data(
        "Project updated successfully.",
        project,
    )))
}

/// Delete a project (cascades to its models and deployments)
pub async fn remove(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<MessageResponse>> {
    debug!("Deleting project: {}", pk);

    let client = state.db_pool.get().await?;

    let rows_affected = client
        .execute("DELETE FROM projects WHERE id = $1", &[&pk])
        .await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Project {} not found", pk)));
    }

    info!("Project deleted: {}", pk);

    Ok(Json(MessageResponse::new(format!(
        "Project {} deleted successfully.",
        pk
    ))))
}
