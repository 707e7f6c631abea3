//! Request log records

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;

/// One logged dashboard request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: i64,
    pub method: String,
    pub path: String,
    pub status: i16,
    pub elapsed_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            method: row.get("method"),
            path: row.get("path"),
            status: row.get("status"),
            elapsed_ms: row.get("elapsed_ms"),
            created_at: row.get("created_at"),
        }
    }
}
