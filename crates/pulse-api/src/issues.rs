use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use pulse_db::format_ts;
use pulse_db::models::IssueRow;
use pulse_types::api::{Claims, NewIssue, UpdateIssue};
use pulse_types::events::GatewayEvent;
use pulse_types::models::Issue;

use crate::auth::{AppState, current_user};
use crate::error::{ApiError, blocking};

const ISSUE_TITLE_MAX: usize = 200;
const MAX_ISSUES: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct IssueListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

fn clean_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ApiError::validation("issue_title", "Issue title is required"));
    }
    if title.chars().count() > ISSUE_TITLE_MAX {
        return Err(ApiError::validation("issue_title", "Issue title must be at most 200 characters"));
    }
    Ok(title.to_string())
}

pub async fn list_issues(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<IssueListQuery>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    let owner = current_user(&state, &claims).await?;
    let limit = query.limit.min(MAX_ISSUES);

    let db = state.clone();
    let rows = blocking(move || db.db.list_issues(&owner.username, limit)).await?;
    Ok(Json(rows.into_iter().map(IssueRow::into_issue).collect()))
}

pub async fn create_issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewIssue>,
) -> Result<impl IntoResponse, ApiError> {
    let issue_title = clean_title(&req.issue_title)?;
    let owner = current_user(&state, &claims).await?;

    let row = IssueRow {
        id: Uuid::new_v4().to_string(),
        username: owner.username,
        issue_title,
        created_at: format_ts(Utc::now()),
    };
    let db = state.clone();
    let insert = row.clone();
    blocking(move || db.db.insert_issue(&insert)).await?;

    let issue = row.into_issue();
    state.dispatcher.broadcast(GatewayEvent::IssueCreate {
        owner_id: claims.sub,
        issue: issue.clone(),
    });

    Ok((StatusCode::CREATED, Json(issue)))
}

pub async fn update_issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateIssue>,
) -> Result<Json<Issue>, ApiError> {
    let issue_title = clean_title(&req.issue_title)?;
    let owner = current_user(&state, &claims).await?;

    let db = state.clone();
    let row = blocking(move || db.db.update_issue_title(&owner.username, &id.to_string(), &issue_title))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_issue()))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let owner = current_user(&state, &claims).await?;

    let db = state.clone();
    let deleted = blocking(move || db.db.delete_issue(&owner.username, &id.to_string())).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
