pub mod translate;
pub mod warmup;

use std::collections::HashMap;
use std::sync::Arc;

use crate::services::{
    FailurePolicy, LifecycleManager, ResourceCache, SchemaBootstrapper, SchemaLayout,
    TranslationEngine, TranslationService, WarmupService,
};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResourceCache>,
    pub translation: Arc<TranslationService>,
    pub warmup: Arc<WarmupService>,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn TranslationEngine>,
        layout: SchemaLayout,
        policy: FailurePolicy,
    ) -> Self {
        let bootstrapper = Arc::new(SchemaBootstrapper::new(engine, layout));
        let cache = Arc::new(ResourceCache::new(bootstrapper, policy));

        Self {
            translation: Arc::new(TranslationService::new(cache.clone())),
            warmup: Arc::new(WarmupService::new(cache.clone())),
            cache,
        }
    }

    pub fn lifecycle(&self) -> LifecycleManager {
        LifecycleManager::new(self.cache.clone())
    }
}

/// Decode a raw query string; the last occurrence of a key wins
pub fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    raw.map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
