//! Snapshot models and DTOs
//!
//! A snapshot captures a training relation at a point in time: which
//! relation, which label column, the train/test split, and per-column
//! statistics computed at capture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_postgres::Row;
use validator::Validate;

/// How the test set is drawn from the relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSampling {
    Random,
    First,
    Last,
}

impl TestSampling {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestSampling::Random => "random",
            TestSampling::First => "first",
            TestSampling::Last => "last",
        }
    }
}

/// A captured training relation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub relation_name: String,
    pub y_column_name: String,
    pub test_size: f32,
    pub test_sampling: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            relation_name: row.get("relation_name"),
            y_column_name: row.get("y_column_name"),
            test_size: row.get("test_size"),
            test_sampling: row.get("test_sampling"),
            status: row.get("status"),
            columns: row.get("columns"),
            analysis: row.get("analysis"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Number of training rows implied by the analysis, if recorded
    pub fn sample_count(&self) -> Option<i64> {
        self.analysis
            .as_ref()
            .and_then(|a| a.get("samples"))
            .and_then(Value::as_i64)
    }
}

/// Request to capture a snapshot of a relation
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    #[validate(length(min = 1, max = 255, message = "Relation name is required"))]
    pub relation_name: String,
    #[validate(length(min = 1, max = 255, message = "Label column is required"))]
    pub y_column_name: String,
    #[serde(default = "default_test_size")]
    #[validate(range(min = 0.0, max = 0.9, message = "Test size must be within [0, 0.9]"))]
    pub test_size: f32,
    #[serde(default = "default_test_sampling")]
    pub test_sampling: TestSampling,
}

fn default_test_size() -> f32 {
    0.25
}

fn default_test_sampling() -> TestSampling {
    TestSampling::Random
}

/// Query parameters for the snapshot analysis endpoint
#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub id: i64,
    /// Restrict the response to a single column's statistics
    pub column: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with_analysis(analysis: Value) -> Snapshot {
        Snapshot {
            id: 1,
            relation_name: "diamonds".to_string(),
            y_column_name: "price".to_string(),
            test_size: 0.25,
            test_sampling: "random".to_string(),
            status: "created".to_string(),
            columns: None,
            analysis: Some(analysis),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sample_count_reads_analysis() {
        let snapshot = snapshot_with_analysis(json!({"samples": 53940}));
        assert_eq!(snapshot.sample_count(), Some(53940));
    }

    #[test]
    fn sample_count_missing_is_none() {
        let snapshot = snapshot_with_analysis(json!({}));
        assert_eq!(snapshot.sample_count(), None);
    }

    #[test]
    fn create_request_defaults() {
        let req: CreateSnapshotRequest =
            serde_json::from_str(r#"{"relationName":"diamonds","yColumnName":"price"}"#).unwrap();
        assert_eq!(req.test_size, 0.25);
        assert_eq!(req.test_sampling, TestSampling::Random);
    }
}
