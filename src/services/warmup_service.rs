use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::WarmupReport;
use crate::services::ResourceCache;

/// Eagerly bootstraps databases so the first translation does not pay for it
pub struct WarmupService {
    cache: Arc<ResourceCache>,
}

impl WarmupService {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        Self { cache }
    }

    /// Split a comma-separated list, trimming names and dropping empties and repeats
    pub fn parse_names(raw: &str) -> Vec<String> {
        dedup(raw.split(',').map(str::trim).filter(|name| !name.is_empty()))
    }

    /// Bootstrap every name, best effort. Names are reported in input order.
    pub async fn warmup<S: AsRef<str>>(&self, names: &[S]) -> WarmupReport {
        let names = dedup(names.iter().map(|name| name.as_ref()));
        tracing::info!("Warming up {} database(s): {}", names.len(), names.join(", "));

        let outcomes = join_all(names.iter().map(|name| async move {
            let outcome = match self.cache.get_or_create(name).await {
                Ok(resource) => match resource.failure() {
                    Some(failure) => Err(failure.to_string()),
                    None => Ok(()),
                },
                Err(e) => Err(e.to_string()),
            };
            (name.clone(), outcome)
        }))
        .await;

        let mut report = WarmupReport::default();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.initialized.push(name),
                Err(reason) => {
                    tracing::warn!("Warmup failed for {}: {}", name, reason);
                    report.failed.push((name, reason));
                }
            }
        }

        report
    }
}

fn dedup<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
