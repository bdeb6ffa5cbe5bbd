// Per-database resource cache
//
// Each database name owns one slot. The first caller to reference a name
// inserts an `Uninitialized` slot while holding the map lock, then runs the
// bootstrap in a spawned task outside the lock. Every caller, the claimer
// included, waits on the slot's watch channel until it settles as `Ready` or
// `Failed`.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::models::{Resource, ResourceFailure};
use crate::services::{GatewayError, SchemaBootstrapper};

/// What happens to a `Failed` resource on its next reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Evict it and bootstrap again
    #[default]
    Retry,
    /// Keep returning the recorded failure until restart
    Cache,
}

struct Slot {
    state: watch::Sender<Arc<Resource>>,
}

impl Slot {
    fn new(resource: Resource) -> Self {
        let (state, _) = watch::channel(Arc::new(resource));
        Self { state }
    }

    fn current(&self) -> Arc<Resource> {
        self.state.borrow().clone()
    }

    fn update(&self, apply: impl FnOnce(&mut Resource) -> bool) {
        self.state.send_if_modified(|current| {
            let mut next = (**current).clone();
            if apply(&mut next) {
                *current = Arc::new(next);
                true
            } else {
                false
            }
        });
    }

    async fn settled(&self) -> Arc<Resource> {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|resource| resource.is_settled())
            .await
            .map(|resource| (*resource).clone());

        // The sender lives in this slot, so it cannot be dropped while we hold it
        settled.unwrap_or_else(|_| self.current())
    }
}

/// Marks the slot failed if the bootstrap task unwinds before settling it
struct SettleGuard(Arc<Slot>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.0.update(|resource| {
            if resource.is_settled() {
                return false;
            }
            resource.mark_building();
            resource.mark_failed(ResourceFailure::connection(
                "Bootstrap ended before the database was ready",
            ))
        });
    }
}

pub struct ResourceCache {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
    bootstrapper: Arc<SchemaBootstrapper>,
    policy: FailurePolicy,
}

impl ResourceCache {
    pub fn new(bootstrapper: Arc<SchemaBootstrapper>, policy: FailurePolicy) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            bootstrapper,
            policy,
        }
    }

    pub fn bootstrapper(&self) -> &Arc<SchemaBootstrapper> {
        &self.bootstrapper
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the settled resource for `name`, bootstrapping it on first reference.
    ///
    /// Concurrent callers for the same unseen name share a single bootstrap
    /// and all observe its outcome. Callers for other names are never held up
    /// by it.
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<Resource>, GatewayError> {
        let schema_path = self.bootstrapper.layout().artifact_path(name)?;

        let (slot, claimed) = {
            let mut slots = self.lock_slots();
            let existing = slots
                .get(name)
                .filter(|slot| {
                    !(self.policy == FailurePolicy::Retry && slot.current().failure().is_some())
                })
                .cloned();

            match existing {
                Some(slot) => (slot, false),
                None => {
                    if slots.contains_key(name) {
                        tracing::info!("Evicting failed resource for {} before retrying", name);
                    } else {
                        tracing::info!("Creating new resource for database: {}", name);
                    }
                    let slot = Arc::new(Slot::new(Resource::new(name, schema_path)));
                    slots.insert(name.to_string(), slot.clone());
                    (slot, true)
                }
            }
        };

        if claimed {
            self.spawn_bootstrap(name.to_string(), slot.clone());
        }

        Ok(slot.settled().await)
    }

    fn spawn_bootstrap(&self, name: String, slot: Arc<Slot>) {
        let bootstrapper = self.bootstrapper.clone();

        // Runs to completion even if every waiting request goes away
        tokio::spawn(async move {
            let guard = SettleGuard(slot.clone());
            slot.update(Resource::mark_building);

            match bootstrapper.bootstrap(&name).await {
                Ok(session) => {
                    tracing::info!("Database {} is ready", name);
                    slot.update(|resource| resource.mark_ready(session));
                }
                Err(failure) => {
                    tracing::warn!("Database {} failed to initialize: {}", name, failure);
                    slot.update(|resource| resource.mark_failed(failure));
                }
            }

            drop(guard);
        });
    }

    /// Current state of every cached resource
    pub fn snapshot(&self) -> Vec<Arc<Resource>> {
        self.lock_slots().values().map(|slot| slot.current()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }

    /// Close the session of `name`, waiting for an in-flight bootstrap first.
    /// Each session is closed at most once.
    ///
    /// Returns `Ok(true)` when this call closed it.
    pub async fn close(&self, name: &str) -> Result<bool, GatewayError> {
        let slot = self.lock_slots().get(name).cloned();
        match slot {
            Some(slot) => {
                slot.settled().await;
                self.close_slot(name, &slot).await
            }
            None => Ok(false),
        }
    }

    /// Drop `name` from the cache and close its session.
    ///
    /// A bootstrap still running for `name` is waited for, so its session is
    /// closed too and a later reference never races it with a second build.
    pub async fn evict(&self, name: &str) -> Result<bool, GatewayError> {
        loop {
            let Some(slot) = self.lock_slots().get(name).cloned() else {
                return Ok(false);
            };
            slot.settled().await;

            let removed = {
                let mut slots = self.lock_slots();
                let same = slots
                    .get(name)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot));
                if same {
                    slots.remove(name);
                }
                same
            };

            // Replaced by a retry while we waited; evict the newer slot instead
            if !removed {
                continue;
            }

            tracing::info!("Evicted resource for {}", name);
            self.close_slot(name, &slot).await?;
            return Ok(true);
        }
    }

    async fn close_slot(&self, name: &str, slot: &Slot) -> Result<bool, GatewayError> {
        let mut taken = None;
        slot.update(|resource| {
            taken = resource.take_session();
            taken.is_some()
        });
        let Some(session) = taken else {
            return Ok(false);
        };

        tracing::info!("Closing translation session for {}", name);
        self.bootstrapper
            .engine()
            .close_session(&session)
            .await
            .map_err(|e| GatewayError::Connection(format!("Failed to close session: {}", e)))?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, ResourceStatus};
    use crate::services::engine::StubEngine;
    use crate::services::SchemaLayout;
    use std::time::Duration;
    use tempfile::TempDir;

    fn cache_with(engine: Arc<StubEngine>, dir: &TempDir, policy: FailurePolicy) -> Arc<ResourceCache> {
        let layout = SchemaLayout::new(dir.path(), "mongo_", "xml");
        let bootstrapper = Arc::new(SchemaBootstrapper::new(engine, layout));
        Arc::new(ResourceCache::new(bootstrapper, policy))
    }

    #[tokio::test]
    async fn test_get_or_create_bootstraps_once() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let first = cache.get_or_create("tpch").await.unwrap();
        assert_eq!(first.status, ResourceStatus::Ready);
        assert_eq!(first.schema_path, dir.path().join("mongo_tpch.xml"));

        let second = cache.get_or_create("tpch").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.build_sessions(), 1);
        assert_eq!(engine.query_sessions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_bootstrap() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new().with_build_delay(Duration::from_millis(50)));
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_create("tpch").await })
            })
            .collect();

        for handle in handles {
            let resource = handle.await.unwrap().unwrap();
            assert!(resource.is_ready());
        }

        assert_eq!(engine.build_sessions(), 1);
        assert_eq!(engine.query_sessions(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_failure() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new().with_build_delay(Duration::from_millis(50)));
        engine.fail_builds_for("broken");
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_create("broken").await })
            })
            .collect();

        for handle in handles {
            let resource = handle.await.unwrap().unwrap();
            assert_eq!(resource.failure().map(|f| f.kind), Some(FailureKind::SchemaBuild));
        }
        assert_eq!(engine.build_sessions(), 1);
    }

    #[tokio::test]
    async fn test_slow_bootstrap_does_not_block_other_names() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new().with_build_delay(Duration::from_millis(300)));
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        // Pre-build the artifact for "fast" so it skips the slow build path
        std::fs::write(dir.path().join("mongo_fast.xml"), "<schema/>").unwrap();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_create("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let fast = tokio::time::timeout(Duration::from_millis(200), cache.get_or_create("fast"))
            .await
            .expect("fast database waited on slow bootstrap")
            .unwrap();
        assert!(fast.is_ready());

        assert!(slow.await.unwrap().unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_retry_policy_rebootstraps_failed_resource() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        engine.fail_connections_for("tpch");
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let failed = cache.get_or_create("tpch").await.unwrap();
        assert_eq!(failed.failure().map(|f| f.kind), Some(FailureKind::Connection));

        engine.recover("tpch");
        let ready = cache.get_or_create("tpch").await.unwrap();
        assert!(ready.is_ready());
        // The artifact from the first attempt is reused
        assert_eq!(engine.build_sessions(), 1);
        assert_eq!(engine.query_sessions(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_policy_keeps_failure() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        engine.fail_builds_for("tpch");
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Cache);

        let first = cache.get_or_create("tpch").await.unwrap();
        engine.recover("tpch");
        let second = cache.get_or_create("tpch").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.failure().is_some());
        assert_eq!(engine.build_sessions(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let result = cache.get_or_create("../escape").await;
        assert!(matches!(result, Err(GatewayError::InvalidDatabaseName(_))));
        assert!(cache.is_empty());
        assert_eq!(engine.build_sessions(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);
        cache.get_or_create("tpch").await.unwrap();

        assert!(cache.close("tpch").await.unwrap());
        assert!(!cache.close("tpch").await.unwrap());
        assert!(!cache.close("missing").await.unwrap());
        assert_eq!(engine.open_sessions(), 0);

        let closed = cache.snapshot().pop().unwrap();
        assert!(closed.session.is_none());
    }

    #[tokio::test]
    async fn test_close_waits_for_running_bootstrap() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new().with_build_delay(Duration::from_millis(100)));
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_create("tpch").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.close("tpch").await.unwrap());
        assert_eq!(engine.open_sessions(), 0);
        assert!(pending.await.unwrap().unwrap().is_ready());
    }

    #[tokio::test]
    async fn test_evict_during_bootstrap_keeps_single_build() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new().with_build_delay(Duration::from_millis(200)));
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_create("tpch").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.evict("tpch").await.unwrap());
        // The evicted bootstrap finished and its session was closed
        assert!(pending.await.unwrap().unwrap().is_ready());
        assert_eq!(engine.open_sessions(), 0);

        let rebuilt = cache.get_or_create("tpch").await.unwrap();
        assert!(rebuilt.is_ready());
        assert_eq!(engine.build_sessions(), 1);
        assert_eq!(engine.query_sessions(), 2);
        assert_eq!(engine.open_sessions(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_closes_session_and_allows_rebuild() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        let cache = cache_with(engine.clone(), &dir, FailurePolicy::Retry);
        cache.get_or_create("tpch").await.unwrap();

        assert!(cache.evict("tpch").await.unwrap());
        assert!(cache.is_empty());
        assert_eq!(engine.open_sessions(), 0);

        cache.get_or_create("tpch").await.unwrap();
        assert_eq!(engine.query_sessions(), 2);
        assert_eq!(engine.build_sessions(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_lists_resources() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(StubEngine::new());
        engine.fail_builds_for("b");
        let cache = cache_with(engine, &dir, FailurePolicy::Cache);
        cache.get_or_create("a").await.unwrap();
        cache.get_or_create("b").await.unwrap();

        let mut names: Vec<_> = cache.snapshot().iter().map(|r| r.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
