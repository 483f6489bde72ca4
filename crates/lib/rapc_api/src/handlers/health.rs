//! Health endpoint.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /api/health`: reports the version and storage connectivity.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (storage, db_connected) = match &state.pool {
        Some(pool) => (
            "postgres",
            sqlx::query("SELECT 1").execute(pool).await.is_ok(),
        ),
        None => ("memory", false),
    };

    Json(HealthResponse {
        version: rapc_core::version().to_string(),
        storage: storage.to_string(),
        db_connected,
    })
}
