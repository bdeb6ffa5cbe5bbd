// Translation engine abstraction
pub mod remote;
pub mod stub;

pub use remote::RemoteEngine;
pub use stub::StubEngine;

use std::path::Path;
use thiserror::Error;

use crate::models::{SessionHandle, SessionMode, Translation};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid engine URL: {0}")]
    InvalidUrl(String),

    #[error("Engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Engine returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("{0}")]
    Rejected(String),
}

/// Capability interface of the external SQL translation engine.
///
/// A `Build` session generates the schema artifact at `schema_path` and
/// persists it when closed. A `Query` session reads that artifact and serves
/// translations for as long as it stays open. Opening both for the same
/// database at once is not supported by the engine.
#[async_trait::async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn open_session(
        &self,
        database: &str,
        schema_path: &Path,
        mode: SessionMode,
    ) -> Result<SessionHandle, EngineError>;

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError>;

    async fn translate(
        &self,
        sql: &str,
        session: &SessionHandle,
    ) -> Result<Translation, EngineError>;
}
