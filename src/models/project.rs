//! Project models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use validator::Validate;

/// Supervised learning task a project trains for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Regression,
    Classification,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Regression => "regression",
            Task::Classification => "classification",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "regression" => Some(Task::Regression),
            "classification" => Some(Task::Classification),
            _ => None,
        }
    }

    /// Metric used to rank this task's models (higher is better)
    pub fn key_metric(&self) -> &'static str {
        match self {
            Task::Regression => "r2",
            Task::Classification => "f1",
        }
    }
}

/// A machine learning project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub task: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            task: row.get("task"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// Request to create a new project
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Project name is required"))]
    pub name: String,
    pub task: Task,
}

/// Request to update a project
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Project name is required"))]
    pub name: Option<String>,
    pub task: Option<Task>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_text() {
        for task in [Task::Regression, Task::Classification] {
            assert_eq!(Task::parse(task.as_str()), Some(task));
        }
        assert_eq!(Task::parse("clustering"), None);
    }

    #[test]
    fn key_metric_matches_task() {
        assert_eq!(Task::Regression.key_metric(), "r2");
        assert_eq!(Task::Classification.key_metric(), "f1");
    }

    #[test]
    fn task_deserializes_snake_case() {
        let req: CreateProjectRequest =
            serde_json::from_str(r#"{"name":"churn","task":"classification"}"#).unwrap();
        assert_eq!(req.task, Task::Classification);
    }
}
