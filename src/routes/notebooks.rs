//! Notebook and cell route handlers
//!
//! A notebook is an ordered list of executable cells. Cells are
//! soft-deleted and versioned: edit bumps the version and clears the
//! rendering, remove stamps `deleted_at`, reset clears every rendering.

use crate::error::{validation_error, ApiResult, AppError, Pk};
use crate::models::{
    AddCellRequest, CellType, CreateNotebookRequest, EditCellRequest, MessageResponse, Notebook,
    NotebookCell, NotebookDetail, RenameNotebookRequest, SuccessResponse,
};
use crate::sql;
use crate::state::SharedState;
use axum::{extract::State, Json};
use deadpool_postgres::Client;
use serde_json::{json, Value};
use tracing::{debug, info};
use validator::Validate;

const CELL_COLUMNS: &str = "id, notebook_id, cell_type, contents, rendering, \
     execution_time_ms, cell_number, version, deleted_at";

/// List all notebooks
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<Notebook>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            "SELECT id, name, created_at, updated_at FROM notebooks ORDER BY updated_at DESC",
            &[],
        )
        .await?;

    let notebooks: Vec<Notebook> = rows.iter().map(Notebook::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} notebooks found.", notebooks.len()),
        notebooks,
    )))
}

/// Create a notebook
pub async fn create(
    State(state): State<SharedState>,
    Json(payload): Json<CreateNotebookRequest>,
) -> ApiResult<Json<SuccessResponse<Notebook>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let client = state.db_pool.get().await?;

    let row = client
        .query_one(
            "INSERT INTO notebooks (name)
             VALUES ($1)
             RETURNING id, name, created_at, updated_at",
            &[&payload.name],
        )
        .await?;

    let notebook = Notebook::from_row(&row);

    info!("Notebook created: {} (id: {})", notebook.name, notebook.id);

    Ok(Json(SuccessResponse::with_data(
        "Notebook created successfully.",
        notebook,
    )))
}

/// Notebook page data: the notebook with its live cells in order
pub async fn detail(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<NotebookDetail>>> {
    let client = state.db_pool.get().await?;

    let notebook = fetch_notebook(&client, pk).await?;

    let cell_rows = client
        .query(
            &format!(
                "SELECT {CELL_COLUMNS}
                 FROM notebook_cells
                 WHERE notebook_id = $1 AND deleted_at IS NULL
                 ORDER BY cell_number"
            ),
            &[&pk],
        )
        .await?;

    let cells: Vec<NotebookCell> = cell_rows.iter().map(NotebookCell::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        "Notebook retrieved successfully.",
        NotebookDetail { notebook, cells },
    )))
}

/// Rename a notebook
pub async fn rename(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
    Json(payload): Json<RenameNotebookRequest>,
) -> ApiResult<Json<SuccessResponse<Notebook>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            "UPDATE notebooks
             SET name = $1, updated_at = now()
             WHERE id = $2
             RETURNING id, name, created_at, updated_at",
            &[&payload.name, &pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notebook {} not found", pk)))?;

    let notebook = Notebook::from_row(&row);

    info!("Notebook renamed: {} (id: {})", notebook.name, notebook.id);

    Ok(Json(SuccessResponse::with_data(
        "Notebook renamed successfully.",
        notebook,
    )))
}

/// Clear the renderings of every live cell
pub async fn reset(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let client = state.db_pool.get().await?;

    fetch_notebook(&client, pk).await?;

    let cleared = client
        .execute(
            "UPDATE notebook_cells
             SET rendering = NULL, execution_time_ms = NULL
             WHERE notebook_id = $1 AND deleted_at IS NULL",
            &[&pk],
        )
        .await?;

    debug!("Notebook {} reset, {} cells cleared", pk, cleared);

    Ok(Json(MessageResponse::new(format!(
        "Notebook reset, {} cells cleared.",
        cleared
    ))))
}

/// Append a cell to a notebook
pub async fn add_cell(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
    Json(payload): Json<AddCellRequest>,
) -> ApiResult<Json<SuccessResponse<NotebookCell>>> {
    let client = state.db_pool.get().await?;

    fetch_notebook(&client, pk).await?;

    // Numbering includes deleted cells, so a removed cell's slot is
    // never reused
    let row = client
        .query_one(
            &format!(
                "INSERT INTO notebook_cells (notebook_id, cell_type, contents, cell_number)
                 SELECT $1, $2, $3, COALESCE(max(cell_number), 0) + 1
                 FROM notebook_cells WHERE notebook_id = $1
                 RETURNING {CELL_COLUMNS}"
            ),
            &[&pk, &payload.cell_type.as_str(), &payload.contents],
        )
        .await?;

    let cell = NotebookCell::from_row(&row);

    debug!(
        "Cell {} added to notebook {} as #{}",
        cell.id, pk, cell.cell_number
    );

    Ok(Json(SuccessResponse::with_data(
        "Cell added successfully.",
        cell,
    )))
}

/// Get one cell, scoped to its notebook
pub async fn cell(
    State(state): State<SharedState>,
    Pk((notebook_pk, cell_pk)): Pk<(i64, i64)>,
) -> ApiResult<Json<SuccessResponse<NotebookCell>>> {
    let client = state.db_pool.get().await?;
    let cell = fetch_cell(&client, notebook_pk, cell_pk).await?;

    Ok(Json(SuccessResponse::with_data(
        "Cell retrieved successfully.",
        cell,
    )))
}

/// Update a cell's contents; bumps the version and clears the rendering
pub async fn edit_cell(
    State(state): State<SharedState>,
    Pk((notebook_pk, cell_pk)): Pk<(i64, i64)>,
    Json(payload): Json<EditCellRequest>,
) -> ApiResult<Json<SuccessResponse<NotebookCell>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!(
                "UPDATE notebook_cells
                 SET contents = $1,
                     version = version + 1,
                     rendering = NULL,
                     execution_time_ms = NULL
                 WHERE id = $2 AND notebook_id = $3 AND deleted_at IS NULL
                 RETURNING {CELL_COLUMNS}"
            ),
            &[&payload.contents, &cell_pk, &notebook_pk],
        )
        .await?
        .ok_or_else(|| cell_not_found(notebook_pk, cell_pk))?;

    let cell = NotebookCell::from_row(&row);

    debug!("Cell {} edited (version {})", cell.id, cell.version);

    Ok(Json(SuccessResponse::with_data(
        "Cell updated successfully.",
        cell,
    )))
}

/// Soft-delete a cell
pub async fn remove_cell(
    State(state): State<SharedState>,
    Pk((notebook_pk, cell_pk)): Pk<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    let client = state.db_pool.get().await?;

    let rows_affected = client
        .execute(
            "UPDATE notebook_cells
             SET deleted_at = now()
             WHERE id = $1 AND notebook_id = $2 AND deleted_at IS NULL",
            &[&cell_pk, &notebook_pk],
        )
        .await?;

    if rows_affected == 0 {
        return Err(cell_not_found(notebook_pk, cell_pk));
    }

    info!("Cell {} removed from notebook {}", cell_pk, notebook_pk);

    Ok(Json(MessageResponse::new(format!(
        "Cell {} removed successfully.",
        cell_pk
    ))))
}

/// Execute a cell and store its rendering.
///
/// SQL cells run through the console executor; a failing statement is
/// rendered as an error in the cell, not surfaced as an HTTP failure.
/// Markdown cells render client-side, so their rendering is the source.
pub async fn play_cell(
    State(state): State<SharedState>,
    Pk((notebook_pk, cell_pk)): Pk<(i64, i64)>,
) -> ApiResult<Json<SuccessResponse<NotebookCell>>> {
    let client = state.db_pool.get().await?;

    let cell = fetch_cell(&client, notebook_pk, cell_pk).await?;

    let cell_type = CellType::parse(&cell.cell_type)
        .ok_or_else(|| AppError::Internal(format!("Unknown cell type '{}'", cell.cell_type)))?;

    let (rendering, execution_time_ms): (Value, Option<i64>) = match cell_type {
        CellType::Sql => match sql::run_sql(&client, &cell.contents).await {
            Ok(result) => {
                let elapsed = result.elapsed_ms as i64;
                (json!({"type": "sql", "result": result}), Some(elapsed))
            }
            Err(e) => (json!({"type": "error", "message": e.to_string()}), None),
        },
        CellType::Markdown => (json!({"type": "markdown", "source": cell.contents}), None),
    };

    let row = client
        .query_opt(
            &format!(
                "UPDATE notebook_cells
                 SET rendering = $1, execution_time_ms = $2
                 WHERE id = $3 AND notebook_id = $4 AND deleted_at IS NULL
                 RETURNING {CELL_COLUMNS}"
            ),
            &[&rendering, &execution_time_ms, &cell_pk, &notebook_pk],
        )
        .await?
        .ok_or_else(|| cell_not_found(notebook_pk, cell_pk))?;

    let cell = NotebookCell::from_row(&row);

    debug!("Cell {} played in notebook {}", cell_pk, notebook_pk);

    Ok(Json(SuccessResponse::with_data(
        "Cell executed successfully.",
        cell,
    )))
}

async fn fetch_notebook(client: &Client, pk: i64) -> Result<Notebook, AppError> {
    let row = client
        .query_opt(
            "SELECT id, name, created_at, updated_at FROM notebooks WHERE id = $1",
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notebook {} not found", pk)))?;

    Ok(Notebook::from_row(&row))
}

async fn fetch_cell(
    client: &Client,
    notebook_pk: i64,
    cell_pk: i64,
) -> Result<NotebookCell, AppError> {
    let row = client
        .query_opt(
            &format!(
                "SELECT {CELL_COLUMNS}
                 FROM notebook_cells
                 WHERE id = $1 AND notebook_id = $2 AND deleted_at IS NULL"
            ),
            &[&cell_pk, &notebook_pk],
        )
        .await?
        .ok_or_else(|| cell_not_found(notebook_pk, cell_pk))?;

    Ok(NotebookCell::from_row(&row))
}

fn cell_not_found(notebook_pk: i64, cell_pk: i64) -> AppError {
    AppError::NotFound(format!(
        "Cell {} not found in notebook {}",
        cell_pk, notebook_pk
    ))
}
