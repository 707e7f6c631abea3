//! Deployment models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

/// How a model was chosen for deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NewScore,
    BestScore,
    MostRecent,
    Rollback,
    Specific,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NewScore => "new_score",
            Strategy::BestScore => "best_score",
            Strategy::MostRecent => "most_recent",
            Strategy::Rollback => "rollback",
            Strategy::Specific => "specific",
        }
    }
}

/// A model promoted to serve a project's predictions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: i64,
    pub project_id: i64,
    pub model_id: i64,
    pub strategy: String,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn from_row(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            project_id: row.get("project_id"),
            model_id: row.get("model_id"),
            strategy: row.get("strategy"),
            created_at: row.get("created_at"),
        }
    }
}

/// Request to deploy a model.
///
/// Either names the model outright (`specific`, the default), or names a
/// project and lets the strategy pick: `best_score`, `most_recent`, or
/// `rollback` to the previously deployed model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub model_id: Option<i64>,
    pub project_id: Option<i64>,
    #[serde(default = "default_strategy")]
    pub strategy: Strategy,
}

fn default_strategy() -> Strategy {
    Strategy::Specific
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Strategy::BestScore).unwrap(),
            "\"best_score\""
        );
        assert_eq!(Strategy::MostRecent.as_str(), "most_recent");
    }

    #[test]
    fn deploy_request_defaults_to_specific() {
        let req: CreateDeploymentRequest = serde_json::from_str(r#"{"modelId":3}"#).unwrap();
        assert_eq!(req.strategy, Strategy::Specific);
        assert_eq!(req.model_id, Some(3));
        assert_eq!(req.project_id, None);
    }

    #[test]
    fn deploy_request_by_project_strategy() {
        let req: CreateDeploymentRequest =
            serde_json::from_str(r#"{"projectId":2,"strategy":"best_score"}"#).unwrap();
        assert_eq!(req.strategy, Strategy::BestScore);
        assert_eq!(req.model_id, None);
    }
}
