//! Notebook and cell models
//!
//! A notebook is a saved console session: an ordered list of executable
//! cells. Cells are soft-deleted and versioned so edits never lose the
//! executed history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::Row;
use validator::Validate;

/// What a cell contains and how `play` treats it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Sql,
    Markdown,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Sql => "sql",
            CellType::Markdown => "markdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sql" => Some(CellType::Sql),
            "markdown" => Some(CellType::Markdown),
            _ => None,
        }
    }
}

/// A saved console session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// One executable unit of a notebook
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookCell {
    pub id: i64,
    pub notebook_id: i64,
    pub cell_type: String,
    pub contents: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendering: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,
    pub cell_number: i32,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NotebookCell {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            notebook_id: row.get("notebook_id"),
            cell_type: row.get("cell_type"),
            contents: row.get("contents"),
            rendering: row.get("rendering"),
            execution_time_ms: row.get("execution_time_ms"),
            cell_number: row.get("cell_number"),
            version: row.get("version"),
            deleted_at: row.get("deleted_at"),
        }
    }
}

/// Notebook with its live cells, as the notebook page consumes it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookDetail {
    #[serde(flatten)]
    pub notebook: Notebook,
    pub cells: Vec<NotebookCell>,
}

/// Request to create a notebook
#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotebookRequest {
    #[validate(length(min = 1, max = 255, message = "Notebook name is required"))]
    pub name: String,
}

/// Request to rename a notebook
#[derive(Debug, Deserialize, Validate)]
pub struct RenameNotebookRequest {
    #[validate(length(min = 1, max = 255, message = "Notebook name is required"))]
    pub name: String,
}

/// Request to append a cell to a notebook
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCellRequest {
    pub cell_type: CellType,
    #[serde(default)]
    pub contents: String,
}

/// Request to edit a cell's contents
#[derive(Debug, Deserialize)]
pub struct EditCellRequest {
    pub contents: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_type_round_trips_through_text() {
        for cell_type in [CellType::Sql, CellType::Markdown] {
            assert_eq!(CellType::parse(cell_type.as_str()), Some(cell_type));
        }
        assert_eq!(CellType::parse("python"), None);
    }

    #[test]
    fn add_cell_contents_default_empty() {
        let req: AddCellRequest = serde_json::from_str(r#"{"cellType":"sql"}"#).unwrap();
        assert_eq!(req.cell_type, CellType::Sql);
        assert_eq!(req.contents, "");
    }
}
