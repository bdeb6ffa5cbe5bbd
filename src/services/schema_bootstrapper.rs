use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SchemaConfig;
use crate::models::{ResourceFailure, SessionHandle, SessionMode};
use crate::services::engine::TranslationEngine;
use crate::services::GatewayError;

/// Where schema artifacts live: `<dir>/<prefix><name>.<extension>`
#[derive(Debug, Clone)]
pub struct SchemaLayout {
    dir: PathBuf,
    file_prefix: String,
    file_extension: String,
}

impl SchemaLayout {
    pub fn new(
        dir: impl Into<PathBuf>,
        file_prefix: impl Into<String>,
        file_extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            file_prefix: file_prefix.into(),
            file_extension: file_extension.into(),
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(
            config.dir.clone(),
            config.file_prefix.clone(),
            config.file_extension.clone(),
        )
    }

    /// Artifact path for `name`. Names that could escape the schema directory are rejected.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, GatewayError> {
        if name.trim().is_empty()
            || name.contains(['/', '\\', '\0'])
            || name.contains("..")
        {
            return Err(GatewayError::InvalidDatabaseName(name.to_string()));
        }

        let file_name = if self.file_extension.is_empty() {
            format!("{}{}", self.file_prefix, name)
        } else {
            format!("{}{}.{}", self.file_prefix, name, self.file_extension)
        };

        Ok(self.dir.join(file_name))
    }
}

/// Makes sure a database's schema artifact exists and opens its long-lived session
pub struct SchemaBootstrapper {
    engine: Arc<dyn TranslationEngine>,
    layout: SchemaLayout,
}

impl SchemaBootstrapper {
    pub fn new(engine: Arc<dyn TranslationEngine>, layout: SchemaLayout) -> Self {
        Self { engine, layout }
    }

    pub fn engine(&self) -> &Arc<dyn TranslationEngine> {
        &self.engine
    }

    pub fn layout(&self) -> &SchemaLayout {
        &self.layout
    }

    /// Build the schema artifact for `name` unless it is already on disk.
    ///
    /// The build session is closed before this returns; the engine only
    /// persists the artifact on close.
    pub async fn ensure_schema(&self, name: &str) -> Result<PathBuf, GatewayError> {
        let path = self.layout.artifact_path(name)?;

        let exists = tokio::fs::try_exists(&path).await.map_err(|e| {
            GatewayError::SchemaBuild(format!(
                "Failed to check schema artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        if exists {
            tracing::debug!("Reusing schema artifact for {}: {}", name, path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    GatewayError::SchemaBuild(format!(
                        "Failed to create schema directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        tracing::info!("Building schema for {} at {}", name, path.display());

        let session = self
            .engine
            .open_session(name, &path, SessionMode::Build)
            .await
            .map_err(|e| {
                tracing::error!("Schema build session failed for {}: {}", name, e);
                GatewayError::SchemaBuild(e.to_string())
            })?;

        self.engine.close_session(&session).await.map_err(|e| {
            tracing::error!("Failed to flush schema for {}: {}", name, e);
            GatewayError::SchemaBuild(format!("Failed to persist schema: {}", e))
        })?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::warn!(
                "Schema build for {} finished but {} is not visible locally",
                name,
                path.display()
            );
        }

        tracing::info!("Schema build finished for {}", name);
        Ok(path)
    }

    /// Open the session used for translations; the schema must already be in place
    pub async fn connect(&self, name: &str, schema_path: &Path) -> Result<SessionHandle, GatewayError> {
        tracing::info!("Opening translation session for {}", name);
        self.engine
            .open_session(name, schema_path, SessionMode::Query)
            .await
            .map_err(|e| {
                tracing::error!("Connection failed for {}: {}", name, e);
                GatewayError::Connection(e.to_string())
            })
    }

    /// Schema build followed by connect, strictly in that order
    pub async fn bootstrap(&self, name: &str) -> Result<SessionHandle, ResourceFailure> {
        let path = self.ensure_schema(name).await.map_err(|e| match e {
            GatewayError::SchemaBuild(reason) => ResourceFailure::schema_build(reason),
            other => ResourceFailure::schema_build(other.to_string()),
        })?;

        self.connect(name, &path).await.map_err(|e| match e {
            GatewayError::Connection(reason) => ResourceFailure::connection(reason),
            other => ResourceFailure::connection(other.to_string()),
        })
    }
}
