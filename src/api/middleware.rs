use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::GatewayError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Only GET is supported")]
    MethodNotAllowed,

    #[error("Not found")]
    NotFound,

    /// A translate request that failed after its parameters were accepted
    #[error("{source}")]
    Gateway {
        db: String,
        sql: String,
        #[source]
        source: GatewayError,
    },
}

impl AppError {
    pub fn gateway(db: impl Into<String>, sql: impl Into<String>, source: GatewayError) -> Self {
        AppError::Gateway {
            db: db.into(),
            sql: sql.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Gateway {
                source: GatewayError::InvalidDatabaseName(_),
                ..
            } => StatusCode::BAD_REQUEST,
            AppError::Gateway { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Gateway { db, sql, source } => {
                tracing::error!("Request for {} failed: {}", db, source);
                json!({
                    "db": db,
                    "sql": sql,
                    "kind": source.kind(),
                    "error": source.to_string(),
                })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Method fallback for the GET-only routes
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Fallback for unknown paths
pub async fn not_found() -> AppError {
    AppError::NotFound
}
