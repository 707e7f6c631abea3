//! CSV uploader route handlers
//!
//! An upload materializes a CSV file as a `data_<id>` table: the header
//! row becomes sanitized column names, every column is TEXT, and the rows
//! are batch-inserted. The uploaded page serves the record plus a sample
//! of the new table.

use crate::error::{ApiResult, AppError, Pk};
use crate::models::{SuccessResponse, UploadedFile, UploadedPreview};
use crate::sql;
use crate::state::SharedState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::json;
use tokio_postgres::types::ToSql;
use tracing::{debug, info};

/// Rows per INSERT statement; keeps the parameter count well under the
/// protocol's 65535 limit even for wide files
const INSERT_BATCH_ROWS: usize = 500;

const UPLOAD_COLUMNS: &str = "id, table_name, file_name, columns, row_count, created_at";

/// List all uploads
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<UploadedFile>>>> {
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            &format!("SELECT {UPLOAD_COLUMNS} FROM uploaded_files ORDER BY created_at DESC"),
            &[],
        )
        .await?;

    let uploads: Vec<UploadedFile> = rows.iter().map(UploadedFile::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} uploads found.", uploads.len()),
        uploads,
    )))
}

/// Upload a CSV file and materialize it as a table
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SuccessResponse<UploadedFile>>> {
    // First field with a filename is the upload
    let mut file_name = None;
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.file_name().is_none() {
            continue;
        }
        file_name = Some(field.file_name().unwrap_or("upload.csv").to_string());
        data = Some(
            field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
        );
        break;
    }

    let file_name = file_name.ok_or_else(|| {
        AppError::BadRequest("No file in upload; send a multipart file field".to_string())
    })?;
    let data = data.unwrap_or_default();
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
    }

    debug!("Processing upload '{}' ({} bytes)", file_name, data.len());

    let (columns, records) = parse_csv(&data)?;

    let mut client = state.db_pool.get().await?;
    let tx = client
        .transaction()
        .await
        .map_err(AppError::Database)?;

    // Reserve the record first; its id names the table
    let row = tx
        .query_one(
            "INSERT INTO uploaded_files (file_name, columns, row_count)
             VALUES ($1, $2, $3)
             RETURNING id",
            &[
                &file_name,
                &json!(columns),
                &(records.len() as i64),
            ],
        )
        .await?;
    let id: i64 = row.get("id");
    let table_name = format!("data_{}", id);

    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", sql::quote_identifier(c)))
        .collect();
    tx.execute(
        &format!(
            "CREATE TABLE {} ({})",
            sql::quote_identifier(&table_name),
            column_defs.join(", ")
        ),
        &[],
    )
    .await?;

    insert_records(&tx, &table_name, &columns, &records).await?;

    let row = tx
        .query_one(
            &format!(
                "UPDATE uploaded_files SET table_name = $1 WHERE id = $2
                 RETURNING {UPLOAD_COLUMNS}"
            ),
            &[&table_name, &id],
        )
        .await?;

    tx.commit().await.map_err(AppError::Database)?;

    let upload = UploadedFile::from_row(&row);

    info!(
        "Upload '{}' materialized as {} ({} rows, {} columns)",
        upload.file_name,
        upload.table_name,
        upload.row_count,
        columns.len()
    );

    Ok(Json(SuccessResponse::with_data(
        "File uploaded successfully.",
        upload,
    )))
}

/// Upload record plus a sample of its table
pub async fn uploaded(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<UploadedPreview>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            &format!("SELECT {UPLOAD_COLUMNS} FROM uploaded_files WHERE id = $1"),
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", pk)))?;

    let upload = UploadedFile::from_row(&row);

    let sample = sql::run_sql(
        &client,
        &format!(
            "SELECT * FROM {} LIMIT 10",
            sql::quote_identifier(&upload.table_name)
        ),
    )
    .await?;

    Ok(Json(SuccessResponse::with_data(
        "Upload retrieved successfully.",
        UploadedPreview { upload, sample },
    )))
}

/// Parse CSV bytes into sanitized column names and text records
fn parse_csv(data: &[u8]) -> Result<(Vec<String>, Vec<Vec<String>>), AppError> {
    let mut reader = csv::Reader::from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Invalid CSV header: {}", e)))?;
    if headers.is_empty() {
        return Err(AppError::BadRequest("CSV file has no columns".to_string()));
    }

    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let mut name = sanitize_column(header, i);
        // Distinct headers can sanitize to the same name; suffix until unique
        // so the CREATE TABLE below does not hit a duplicate column
        let mut n = 1;
        while columns.contains(&name) {
            n += 1;
            let suffix = format!("_{}", n);
            let mut base = sanitize_column(header, i);
            base.truncate(63 - suffix.len());
            name = format!("{}{}", base, suffix);
        }
        columns.push(name);
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::BadRequest(format!("Invalid CSV row: {}", e)))?;
        records.push(record.iter().map(|v| v.to_string()).collect());
    }

    Ok((columns, records))
}

/// Turn a CSV header into a valid PostgreSQL column name.
///
/// Lower-cases, maps anything outside `[a-z0-9_]` to `_`, prefixes a
/// leading digit, and falls back to `column_<i>` for blank headers.
fn sanitize_column(raw: &str, index: usize) -> String {
    let mut name: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '_') {
        name = format!("column_{}", index);
    } else if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name = format!("_{}", name);
    }

    name.truncate(63);
    name
}

/// Batch-insert text records into the materialized table
async fn insert_records(
    tx: &deadpool_postgres::Transaction<'_>,
    table_name: &str,
    columns: &[String],
    records: &[Vec<String>],
) -> Result<(), AppError> {
    let quoted_columns: Vec<String> = columns.iter().map(|c| sql::quote_identifier(c)).collect();
    let width = columns.len();

    for chunk in records.chunks(INSERT_BATCH_ROWS) {
        let mut placeholders = Vec::with_capacity(chunk.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * width);

        for (r, record) in chunk.iter().enumerate() {
            if record.len() != width {
                return Err(AppError::BadRequest(format!(
                    "CSV row has {} values, expected {}",
                    record.len(),
                    width
                )));
            }
            let row_params: Vec<String> = (0..width)
                .map(|c| format!("${}", r * width + c + 1))
                .collect();
            placeholders.push(format!("({})", row_params.join(", ")));
            for value in record {
                params.push(value);
            }
        }

        tx.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES {}",
                sql::quote_identifier(table_name),
                quoted_columns.join(", "),
                placeholders.join(", ")
            ),
            &params,
        )
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_lowercases_and_replaces() {
        assert_eq!(sanitize_column("Price (USD)", 0), "price__usd_");
        assert_eq!(sanitize_column("carat", 1), "carat");
        assert_eq!(sanitize_column("  Depth %  ", 2), "depth__");
    }

    #[test]
    fn sanitize_handles_degenerate_headers() {
        assert_eq!(sanitize_column("", 3), "column_3");
        assert_eq!(sanitize_column("___", 4), "column_4");
        assert_eq!(sanitize_column("2024_sales", 5), "_2024_sales");
    }

    #[test]
    fn parse_csv_extracts_columns_and_rows() {
        let data = b"Name,Age\nalice,30\nbob,41\n";
        let (columns, records) = parse_csv(data).unwrap();
        assert_eq!(columns, vec!["name".to_string(), "age".to_string()]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], vec!["alice".to_string(), "30".to_string()]);
    }

    #[test]
    fn parse_csv_suffixes_colliding_headers() {
        let data = b"Price (USD),Price [USD],price_(usd)\n1,2,3\n";
        let (columns, _) = parse_csv(data).unwrap();
        assert_eq!(
            columns,
            vec![
                "price__usd_".to_string(),
                "price__usd__2".to_string(),
                "price__usd__3".to_string(),
            ]
        );
    }

    #[test]
    fn parse_csv_rejects_ragged_rows() {
        let data = b"a,b\n1,2,3\n";
        assert!(parse_csv(data).is_err());
    }
}
