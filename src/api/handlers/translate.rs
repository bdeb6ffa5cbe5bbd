use axum::{
    extract::{RawQuery, State},
    Json,
};

use super::{parse_query, AppState};
use crate::api::middleware::AppError;
use crate::models::TranslateResponse;

/// Translate a SQL query for one database
pub async fn translate(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<TranslateResponse>, AppError> {
    let mut params = parse_query(query.as_deref());
    let db = params.remove("db").filter(|db| !db.is_empty());
    let sql = params.remove("sql");

    let (Some(db), Some(sql)) = (db, sql) else {
        return Err(AppError::BadRequest(
            "Missing required parameters 'db' and 'sql'".to_string(),
        ));
    };

    let translation = state
        .translation
        .translate(&sql, &db)
        .await
        .map_err(|e| AppError::gateway(db.clone(), sql.clone(), e))?;

    Ok(Json(TranslateResponse {
        mongo: translation.query_text().to_string(),
        db,
        sql,
    }))
}
