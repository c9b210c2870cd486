use axum::{Extension, Json, extract::State};
use chrono::Utc;
use tracing::info;

use pulse_insights::validation::{validate_email, validate_username};
use pulse_types::api::{Claims, UpdateProfile};
use pulse_types::models::User;

use crate::auth::{AppState, current_user};
use crate::error::{ApiError, blocking};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(current_user(&state, &claims).await?.into_user()))
}

/// Change username and/or email. A rename carries over to the caller's
/// feedback and issue rows.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfile>,
) -> Result<Json<User>, ApiError> {
    let username = req.username.map(|u| u.trim().to_string());
    let email = req.email.map(|e| e.trim().to_string());
    if let Some(username) = &username {
        validate_username(username)?;
    }
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let current = current_user(&state, &claims).await?;

    let db = state.clone();
    let id = current.id.clone();
    let (name, mail) = (username.clone(), email.clone());
    let (name_taken, email_taken) = blocking(move || {
        let name_taken = match &name {
            Some(n) => db.db.get_user_by_username(n)?.is_some_and(|u| u.id != id),
            None => false,
        };
        let email_taken = match &mail {
            Some(m) => db.db.get_user_by_email(m)?.is_some_and(|u| u.id != id),
            None => false,
        };
        Ok((name_taken, email_taken))
    })
    .await?;
    if name_taken {
        return Err(ApiError::conflict("username", "Username is already taken"));
    }
    if email_taken {
        return Err(ApiError::conflict("email", "An account with this email already exists"));
    }

    let db = state.clone();
    let id = current.id.clone();
    let row = blocking(move || db.db.update_profile(&id, username.as_deref(), email.as_deref(), Utc::now()))
        .await
        .map_err(ApiError::user_conflict)?
        .ok_or(ApiError::Unauthorized)?;

    if row.username != current.username {
        info!("{} renamed to {}", current.username, row.username);
    }
    Ok(Json(row.into_user()))
}
