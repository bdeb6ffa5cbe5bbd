use thiserror::Error;

use crate::models::{FailureKind, ResourceFailure};

/// Failures raised while serving a translate or warmup request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Invalid database name '{0}'")]
    InvalidDatabaseName(String),

    #[error("Schema build failed: {0}")]
    SchemaBuild(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Translation failed: {0}")]
    Translation(String),
}

impl GatewayError {
    /// Stable identifier used in error responses
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidDatabaseName(_) => "invalid_database_name",
            GatewayError::SchemaBuild(_) => "schema_build",
            GatewayError::Connection(_) => "connection",
            GatewayError::Translation(_) => "translation",
        }
    }
}

impl From<&ResourceFailure> for GatewayError {
    fn from(failure: &ResourceFailure) -> Self {
        match failure.kind {
            FailureKind::SchemaBuild => GatewayError::SchemaBuild(failure.reason.clone()),
            FailureKind::Connection => GatewayError::Connection(failure.reason.clone()),
        }
    }
}
