use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use validator::Validate;

use livecast_services::dao::{SessionsStore, StreamsPage};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub p: u64,
    #[serde(default)]
    pub limit: u64,
}

/// Public directory of live streams, newest first.
pub async fn list_streams(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<StreamsPage>, ApiError> {
    let page = state.sessions.get_all(params.p, params.limit).await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStreamRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    pub image_filename: Option<String>,
}

/// Updates the caller's stream card (title + cover image).
pub async fn update_stream(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<UpdateStreamRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if state
        .sessions
        .find_by_user_id(&user.user_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound("No session for user".to_string()));
    }

    state
        .sessions
        .update_stream_info(&user.user_id, &body.title, body.image_filename.as_deref())
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
