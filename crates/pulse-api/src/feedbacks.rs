use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use pulse_db::format_ts;
use pulse_db::models::FeedbackRow;
use pulse_insights::validation::validate_email;
use pulse_types::api::{Claims, FeedbackPage, NewFeedback};
use pulse_types::events::GatewayEvent;
use pulse_types::models::Feedback;
use pulse_types::query::FeedbackQuery;

use crate::auth::{AppState, current_user};
use crate::error::{ApiError, blocking};

pub async fn create_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewFeedback>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_email = req.sender_email.trim().to_string();
    validate_email(&sender_email)
        .map_err(|_| ApiError::validation("sender_email", "Enter a valid sender email"))?;
    if let Some(rating) = req.average_rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(ApiError::validation("average_rating", "Rating must be between 0 and 5"));
        }
    }

    let owner = current_user(&state, &claims).await?;
    let row = FeedbackRow {
        id: Uuid::new_v4().to_string(),
        user_id: owner.id,
        username: owner.username,
        sender_email,
        sender_name: req.sender_name,
        subject: req.subject,
        raw_json: serde_json::to_string(&req.raw_json).map_err(anyhow::Error::from)?,
        average_rating: req.average_rating,
        summary: req.summary,
        processed_at: None,
        received_at: format_ts(req.received_at.unwrap_or_else(Utc::now)),
    };

    let db = state.clone();
    let insert = row.clone();
    blocking(move || db.db.insert_feedback(&insert)).await?;

    let feedback = row.into_feedback();
    state.dispatcher.broadcast(GatewayEvent::FeedbackCreate {
        owner_id: claims.sub,
        feedback: feedback.clone(),
    });

    Ok((StatusCode::CREATED, Json(feedback)))
}

/// Filtered, sorted, paged read. Owner scoping is added here, never taken
/// from the descriptor.
pub async fn query_feedbacks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(query): Json<FeedbackQuery>,
) -> Result<Json<FeedbackPage>, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let (rows, count) = blocking(move || db.db.query_feedbacks(&owner, &query)).await?;

    debug!("{} read {} feedback rows", claims.username, rows.len());

    Ok(Json(FeedbackPage {
        rows: rows.into_iter().map(FeedbackRow::into_feedback).collect(),
        count,
    }))
}

pub async fn mark_processed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Feedback>, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let row = blocking(move || db.db.mark_processed(&owner, &id.to_string(), Utc::now()))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_feedback()))
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let db = state.clone();
    let owner = claims.sub.to_string();
    let deleted = blocking(move || db.db.delete_feedback(&owner, &id.to_string())).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
