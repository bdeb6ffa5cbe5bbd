use std::sync::Arc;

use crate::models::Translation;
use crate::services::engine::TranslationEngine;
use crate::services::{GatewayError, ResourceCache};

pub struct TranslationService {
    cache: Arc<ResourceCache>,
    engine: Arc<dyn TranslationEngine>,
}

impl TranslationService {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        let engine = cache.bootstrapper().engine().clone();
        Self { cache, engine }
    }

    /// Translate `sql` against `database`, bootstrapping the database on first use.
    ///
    /// An empty query in the result is a valid outcome: the engine could not
    /// map the SQL onto a single native query and only produced a plan.
    pub async fn translate(&self, sql: &str, database: &str) -> Result<Translation, GatewayError> {
        let resource = self.cache.get_or_create(database).await?;

        if let Some(failure) = resource.failure() {
            return Err(GatewayError::from(failure));
        }

        let session = resource.session.as_ref().ok_or_else(|| {
            GatewayError::Connection(format!("No open session for database '{}'", database))
        })?;

        tracing::info!("Translating SQL query for {}: {}", database, sql);

        let translation = self
            .engine
            .translate(sql, session)
            .await
            .map_err(|e| {
                tracing::warn!("Translation failed for {}: {}", database, e);
                GatewayError::Translation(e.to_string())
            })?;

        match translation.query.as_deref() {
            Some(query) if !query.is_empty() => {
                tracing::info!("Translated query: {}", query);
            }
            _ => {
                tracing::info!(
                    "SQL query cannot be expressed as a single native query. Logical plan:\n{}",
                    translation.plan.as_deref().unwrap_or("<none>")
                );
            }
        }

        Ok(translation)
    }
}
