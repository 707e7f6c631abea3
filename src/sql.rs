//! Ad-hoc SQL execution and identifier handling
//!
//! The console and notebook cells run user-supplied SQL. Queries go through
//! the simple-query protocol so every value comes back as text without
//! per-type decoding, which is what a generic result grid needs.

use crate::error::AppError;
use deadpool_postgres::Client;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::time::Instant;
use tokio_postgres::SimpleQueryMessage;

/// Upper bound for a single console/cell statement, in milliseconds.
const STATEMENT_TIMEOUT_MS: u64 = 30_000;

/// PostgreSQL identifiers must start with a letter or underscore and
/// contain only letters, digits, underscores, and dollar signs.
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_$]*$").unwrap());

/// Validate a PostgreSQL identifier (table or column name)
pub fn validate_identifier(name: &str) -> Result<(), AppError> {
    if name.len() > 63 {
        return Err(AppError::Validation(format!(
            "Identifier '{}' exceeds 63 characters",
            name
        )));
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(AppError::Validation(format!(
            "Invalid identifier '{}'. Must start with a letter or underscore and contain only letters, digits, underscores.",
            name
        )));
    }
    Ok(())
}

/// Validate a possibly schema-qualified relation name (e.g. `public.diamonds`)
pub fn validate_relation_name(name: &str) -> Result<(), AppError> {
    let mut parts = name.splitn(3, '.');
    let first = parts.next().unwrap_or_default();
    validate_identifier(first)?;
    if let Some(second) = parts.next() {
        validate_identifier(second)?;
    }
    if parts.next().is_some() {
        return Err(AppError::Validation(format!(
            "Invalid relation name '{}'",
            name
        )));
    }
    Ok(())
}

/// Quote an already-validated identifier for interpolation into DDL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Result of an ad-hoc SQL execution, as the console grid consumes it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlResult {
    pub columns: Vec<String>,
    /// Row values as text; NULL stays null
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows affected by the last non-SELECT statement, if any
    pub rows_affected: Option<u64>,
    pub elapsed_ms: u64,
}

/// Execute user SQL over the simple-query protocol.
///
/// A statement timeout is set for the session first so a runaway query
/// cannot hold the pooled connection forever.
pub async fn run_sql(client: &Client, sql: &str) -> Result<SqlResult, AppError> {
    client
        .batch_execute(&format!("SET statement_timeout = {}", STATEMENT_TIMEOUT_MS))
        .await?;

    let started = Instant::now();
    let messages = client.simple_query(sql).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    // Best effort; the pool recycles sessions so don't leave the timeout set
    let _ = client.batch_execute("RESET statement_timeout").await;

    let messages = messages?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    let mut rows_affected = None;

    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if columns.is_empty() {
                    columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                }
                let values = (0..row.len())
                    .map(|i| row.get(i).map(|v| v.to_string()))
                    .collect();
                rows.push(values);
            }
            SimpleQueryMessage::RowDescription(description) => {
                begin_result_set(
                    &mut columns,
                    &mut rows,
                    description.iter().map(|c| c.name().to_string()).collect(),
                );
            }
            SimpleQueryMessage::CommandComplete(count) => {
                rows_affected = Some(count);
            }
            _ => {}
        }
    }

    Ok(SqlResult {
        columns,
        rows,
        rows_affected,
        elapsed_ms,
    })
}

/// Start a new result set. For a multi-statement input the grid shows the
/// last set only, so rows accumulated under the previous headers are dropped.
fn begin_result_set(
    columns: &mut Vec<String>,
    rows: &mut Vec<Vec<Option<String>>>,
    names: Vec<String>,
) {
    *columns = names;
    rows.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        assert!(validate_identifier("diamonds").is_ok());
        assert!(validate_identifier("_tmp").is_ok());
        assert!(validate_identifier("data_42").is_ok());
        assert!(validate_identifier("price_usd$").is_ok());
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("42data").is_err());
        assert!(validate_identifier("drop table").is_err());
        assert!(validate_identifier("name;--").is_err());
        assert!(validate_identifier(&"x".repeat(64)).is_err());
    }

    #[test]
    fn relation_names_allow_one_schema_qualifier() {
        assert!(validate_relation_name("diamonds").is_ok());
        assert!(validate_relation_name("public.diamonds").is_ok());
        assert!(validate_relation_name("a.b.c").is_err());
        assert!(validate_relation_name("public.").is_err());
    }

    #[test]
    fn quoting_wraps_in_double_quotes() {
        assert_eq!(quote_identifier("data_7"), "\"data_7\"");
    }

    #[test]
    fn new_result_set_drops_previous_rows() {
        let mut columns = vec!["id".to_string()];
        let mut rows = vec![vec![Some("1".to_string())], vec![Some("2".to_string())]];

        begin_result_set(
            &mut columns,
            &mut rows,
            vec!["name".to_string(), "task".to_string()],
        );

        assert_eq!(columns, vec!["name".to_string(), "task".to_string()]);
        assert!(rows.is_empty());
    }
}
