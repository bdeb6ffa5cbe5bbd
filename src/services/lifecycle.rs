use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::services::ResourceCache;

/// Outcome of releasing cached sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub closed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Releases every open session when the process stops so pending schema state is flushed
pub struct LifecycleManager {
    cache: Arc<ResourceCache>,
    shut_down: AtomicBool,
}

impl LifecycleManager {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        Self {
            cache,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Close every session, best effort. Only the first call does any work.
    ///
    /// Bootstraps still running are waited for so their sessions are closed too.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return report;
        }

        let resources = self.cache.snapshot();
        tracing::info!("Shutting down. Closing {} cached resource(s)", resources.len());

        for resource in &resources {
            match self.cache.close(&resource.name).await {
                Ok(true) => report.closed.push(resource.name.clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to close session for {}: {}", resource.name, e);
                    report.failed.push((resource.name.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Shutdown complete: {} closed, {} failed",
            report.closed.len(),
            report.failed.len()
        );
        report
    }
}
