use axum::extract::State;
use prometheus::{Encoder, TextEncoder};

use crate::error::ApiError;
use crate::state::AppState;

/// Prometheus exposition of everything registered at boot.
pub async fn exposition(State(state): State<AppState>) -> Result<String, ApiError> {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buf)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| ApiError::Internal(e.to_string()))
}
