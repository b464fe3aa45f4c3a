use axum::{Json, extract::State};
use serde::Deserialize;
use validator::Validate;

use livecast_db::models::User;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpsertUserRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(max = 80))]
    pub name: String,
}

/// Creates or refreshes the account behind a verified credential.
pub async fn upsert_user(
    State(state): State<AppState>,
    Json(body): Json<UpsertUserRequest>,
) -> Result<Json<User>, ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let identity = state.auth.verify(&body.token).await?;
    let name = if body.name.is_empty() {
        identity.name
    } else {
        body.name
    };

    let user = state.users.upsert(&identity.uid, &name).await?;
    Ok(Json(user))
}
