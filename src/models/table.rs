//! Table catalog models

use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// A table visible in the connected database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub owner: String,
    /// Planner's row estimate; -1 when the table was never analyzed
    pub row_estimate: i64,
}

impl TableInfo {
    pub fn from_row(row: &Row) -> Self {
        Self {
            schema: row.get("schema"),
            name: row.get("name"),
            owner: row.get("owner"),
            row_estimate: row.get("row_estimate"),
        }
    }
}

/// Column metadata for one table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub position: i32,
}

impl ColumnInfo {
    pub fn from_row(row: &Row) -> Self {
        Self {
            name: row.get("column_name"),
            data_type: row.get("data_type"),
            nullable: row.get("nullable"),
            position: row.get("ordinal_position"),
        }
    }
}

/// Table with its columns, as the detail endpoint returns it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDetail {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Response containing the table catalog
#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub tables: Vec<TableInfo>,
}

/// Request to run SQL in the console
#[derive(Debug, Deserialize)]
pub struct RunSqlRequest {
    pub sql: String,
}
