//! Dashboard index, auth cookie issuance, and the request log

use crate::auth::create_session_token;
use crate::error::{ApiResult, AppError, Pk};
use crate::models::{Deployment, MessageResponse, RequestRecord, SuccessResponse};
use crate::state::SharedState;
use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Dashboard overview: entity counts and the latest deployment
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub project_count: i64,
    pub snapshot_count: i64,
    pub model_count: i64,
    pub deployment_count: i64,
    pub notebook_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_deployment: Option<Deployment>,
}

/// Dashboard index page data
pub async fn index(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<DashboardOverview>>> {
    let client = state.db_pool.get().await?;

    let counts = client
        .query_one(
            "SELECT
                (SELECT count(*) FROM projects) AS projects,
                (SELECT count(*) FROM snapshots) AS snapshots,
                (SELECT count(*) FROM models) AS models,
                (SELECT count(*) FROM deployments) AS deployments,
                (SELECT count(*) FROM notebooks) AS notebooks",
            &[],
        )
        .await?;

    let latest_deployment = client
        .query_opt(
            "SELECT id, project_id, model_id, strategy, created_at
             FROM deployments
             ORDER BY created_at DESC
             LIMIT 1",
            &[],
        )
        .await?
        .map(|row| Deployment::from_row(&row));

    let overview = DashboardOverview {
        project_count: counts.get("projects"),
        snapshot_count: counts.get("snapshots"),
        model_count: counts.get("models"),
        deployment_count: counts.get("deployments"),
        notebook_count: counts.get("notebooks"),
        latest_deployment,
    };

    Ok(Json(SuccessResponse::with_data("Dashboard overview.", overview)))
}

// ── Auth cookie ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthTokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthTokenRequest {
    pub token: String,
}

/// GET /set-auth-cookie/?token=...
pub async fn set_auth_cookie_get(
    State(state): State<SharedState>,
    jar: CookieJar,
    Query(query): Query<AuthTokenQuery>,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    let token = query
        .token
        .ok_or_else(|| AppError::BadRequest("Missing token parameter".to_string()))?;
    issue_cookie(&state, jar, &token)
}

/// POST /set-auth-cookie/
pub async fn set_auth_cookie_post(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(payload): Json<AuthTokenRequest>,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    issue_cookie(&state, jar, &payload.token)
}

/// Exchange the shared dashboard token for a signed session cookie
fn issue_cookie(
    state: &SharedState,
    jar: CookieJar,
    presented: &str,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    let expected = match &state.auth.dashboard_token {
        Some(token) => token,
        None => {
            return Ok((
                jar,
                Json(MessageResponse::new(
                    "Authentication is disabled; no cookie is required.",
                )),
            ))
        }
    };

    if presented != expected {
        warn!("Rejected auth cookie request with wrong token");
        return Err(AppError::Unauthorized("Invalid dashboard token".to_string()));
    }

    let session = create_session_token(&state.auth.jwt_secret, state.auth.session_hours)?;

    let cookie = Cookie::build((state.auth.cookie_name.clone(), session))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    info!("Issued dashboard session cookie");

    Ok((
        jar.add(cookie),
        Json(MessageResponse::new("Auth cookie set.")),
    ))
}

// ── Request log ──────────────────────────────────────────────────────

/// Record method, path, status and elapsed time for every dashboard
/// request. Logging is fire-and-forget; a storage failure never fails
/// the request. The log's own endpoints and the health check are skipped
/// so reading the log does not grow it.
pub async fn request_log_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    if path != "/health" && !path.starts_with("/api/requests") {
        let status = response.status().as_u16() as i16;
        let elapsed_ms = started.elapsed().as_millis() as i64;
        let pool = state.db_pool.clone();
        tokio::spawn(async move {
            let client = match pool.get().await {
                Ok(client) => client,
                Err(e) => {
                    debug!("Request log skipped, no connection: {}", e);
                    return;
                }
            };
            if let Err(e) = client
                .execute(
                    "INSERT INTO request_log (method, path, status, elapsed_ms)
                     VALUES ($1, $2, $3, $4)",
                    &[&method, &path, &status, &elapsed_ms],
                )
                .await
            {
                debug!("Failed to record request: {}", e);
            }
        });
    }

    response
}

#[derive(Debug, Deserialize)]
pub struct RequestListQuery {
    pub limit: Option<i64>,
}

/// List logged requests, most recent first
pub async fn list_requests(
    State(state): State<SharedState>,
    Query(query): Query<RequestListQuery>,
) -> ApiResult<Json<SuccessResponse<Vec<RequestRecord>>>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let client = state.db_pool.get().await?;

    let rows = client
        .query(
            "SELECT id, method, path, status, elapsed_ms, created_at
             FROM request_log
             ORDER BY created_at DESC
             LIMIT $1",
            &[&limit],
        )
        .await?;

    let requests: Vec<RequestRecord> = rows.iter().map(RequestRecord::from_row).collect();

    Ok(Json(SuccessResponse::with_data(
        format!("{} requests found.", requests.len()),
        requests,
    )))
}

/// Get one logged request
pub async fn get_request(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<SuccessResponse<RequestRecord>>> {
    let client = state.db_pool.get().await?;

    let row = client
        .query_opt(
            "SELECT id, method, path, status, elapsed_ms, created_at
             FROM request_log WHERE id = $1",
            &[&pk],
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Request {} not found", pk)))?;

    Ok(Json(SuccessResponse::with_data(
        "Request retrieved successfully.",
        RequestRecord::from_row(&row),
    )))
}

/// Delete one logged request (pruning)
pub async fn remove_request(
    State(state): State<SharedState>,
    Pk(pk): Pk<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let client = state.db_pool.get().await?;

    let rows_affected = client
        .execute("DELETE FROM request_log WHERE id = $1", &[&pk])
        .await?;

    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("Request {} not found", pk)));
    }

    Ok(Json(MessageResponse::new(format!(
        "Request {} deleted successfully.",
        pk
    ))))
}
