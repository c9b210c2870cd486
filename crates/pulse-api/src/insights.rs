use axum::{Extension, Json, extract::Query, extract::State};
use chrono::{FixedOffset, Utc};
use serde::Deserialize;

use pulse_db::feedbacks::MAX_PAGE_SIZE;
use pulse_db::models::{FeedbackRow, IssueRow};
use pulse_insights::aggregate::{DashboardOverview, overview};
use pulse_types::api::Claims;
use pulse_types::query::{Column, FeedbackQuery};

use crate::auth::{AppState, current_user};
use crate::error::{ApiError, blocking};

const ISSUE_WINDOW: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    /// Minutes east of UTC for day and hour bucketing.
    #[serde(default)]
    pub tz_offset_minutes: i32,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    MAX_PAGE_SIZE
}

/// The overview charts computed over the caller's newest `limit` rows.
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<OverviewQuery>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let tz = query
        .tz_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ApiError::validation("tz_offset_minutes", "Offset must be within ±24 hours"))?;

    let owner = current_user(&state, &claims).await?;
    let descriptor = FeedbackQuery::new()
        .order_by(Column::ReceivedAt, false)
        .range(0, query.limit.min(MAX_PAGE_SIZE));

    let db = state.clone();
    let (feedback, issues) = blocking(move || {
        let (rows, _) = db.db.query_feedbacks(&owner.id, &descriptor)?;
        let issues = db.db.list_issues(&owner.username, ISSUE_WINDOW)?;
        Ok((rows, issues))
    })
    .await?;

    let feedback: Vec<_> = feedback.into_iter().map(FeedbackRow::into_feedback).collect();
    let issues: Vec<_> = issues.into_iter().map(IssueRow::into_issue).collect();

    Ok(Json(overview(&feedback, &issues, &tz, Utc::now())))
}
