use axum::{Json, extract::State};

use pulse_db::models::UserRow;
use pulse_types::api::TeamRoster;

use crate::auth::AppState;
use crate::error::{ApiError, blocking};

/// Every account on the server, oldest first. No credentials leave the DB layer.
pub async fn roster(State(state): State<AppState>) -> Result<Json<TeamRoster>, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_users()).await?;
    Ok(Json(TeamRoster {
        members: rows.into_iter().map(UserRow::into_user).collect(),
    }))
}
