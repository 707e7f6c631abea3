//! Uploaded file records

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_postgres::Row;

/// A CSV upload materialized as a `data_<id>` table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: i64,
    pub table_name: String,
    pub file_name: String,
    /// Sanitized column names, in file order
    pub columns: Value,
    pub row_count: i64,
    pub created_at: DateTime<Utc>,
}

impl UploadedFile {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            table_name: row.get("table_name"),
            file_name: row.get("file_name"),
            columns: row.get("columns"),
            row_count: row.get("row_count"),
            created_at: row.get("created_at"),
        }
    }
}

/// Upload record plus a sample of the materialized table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPreview {
    #[serde(flatten)]
    pub upload: UploadedFile,
    pub sample: crate::sql::SqlResult,
}
