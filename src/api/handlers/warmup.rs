use axum::{
    extract::{RawQuery, State},
    Json,
};

use super::{parse_query, AppState};
use crate::api::middleware::AppError;
use crate::models::WarmupResponse;
use crate::services::WarmupService;

/// Build schemas and open sessions ahead of the first translation
pub async fn warmup(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<WarmupResponse>, AppError> {
    let requested = parse_query(query.as_deref())
        .remove("db")
        .filter(|db| !db.trim().is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(
                "Missing required parameter 'db' (comma-separated list allowed)".to_string(),
            )
        })?;

    let names = WarmupService::parse_names(&requested);
    let report = state.warmup.warmup(&names).await;

    Ok(Json(report.into_response(requested)))
}
