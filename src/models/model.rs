//! Trained model records

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_postgres::Row;

/// A trained model: algorithm, hyperparameters and evaluation metrics,
/// tied to the project it was trained for and the snapshot it trained on
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: i64,
    pub project_id: i64,
    pub snapshot_id: i64,
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparams: Option<Value>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_params: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            project_id: row.get("project_id"),
            snapshot_id: row.get("snapshot_id"),
            algorithm: row.get("algorithm"),
            hyperparams: row.get("hyperparams"),
            status: row.get("status"),
            metrics: row.get("metrics"),
            search: row.get("search"),
            search_params: row.get("search_params"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Value of a named metric, if the model recorded it
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .as_ref()
            .and_then(|m| m.get(name))
            .and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metric_lookup() {
        let model = Model {
            id: 1,
            project_id: 1,
            snapshot_id: 1,
            algorithm: "xgboost".to_string(),
            hyperparams: None,
            status: "successful".to_string(),
            metrics: Some(json!({"r2": 0.92, "mean_squared_error": 104.5})),
            search: None,
            search_params: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(model.metric("r2"), Some(0.92));
        assert_eq!(model.metric("f1"), None);
    }
}
