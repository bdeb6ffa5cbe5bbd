use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{EngineError, TranslationEngine};
use crate::models::{SessionHandle, SessionMode, Translation};

#[derive(Debug, Clone)]
struct OpenSession {
    mode: SessionMode,
    schema_path: PathBuf,
}

/// In-process engine used by tests and local runs without an engine sidecar.
///
/// Build sessions write a placeholder artifact when closed. Query sessions
/// require that artifact to exist. `SELECT` statements translate to a
/// `find` on the session's database, joins only produce a plan, and other
/// statements are rejected.
#[derive(Debug, Default)]
pub struct StubEngine {
    build_sessions: AtomicUsize,
    query_sessions: AtomicUsize,
    closed_sessions: AtomicUsize,
    next_id: AtomicUsize,
    open: Mutex<HashMap<String, OpenSession>>,
    failing_builds: Mutex<HashSet<String>>,
    failing_connections: Mutex<HashSet<String>>,
    build_delay: Option<Duration>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every build session sleep before returning
    pub fn with_build_delay(mut self, delay: Duration) -> Self {
        self.build_delay = Some(delay);
        self
    }

    pub fn fail_builds_for(&self, database: &str) {
        lock(&self.failing_builds).insert(database.to_string());
    }

    pub fn fail_connections_for(&self, database: &str) {
        lock(&self.failing_connections).insert(database.to_string());
    }

    /// Clear any failure injected for `database`
    pub fn recover(&self, database: &str) {
        lock(&self.failing_builds).remove(database);
        lock(&self.failing_connections).remove(database);
    }

    pub fn build_sessions(&self) -> usize {
        self.build_sessions.load(Ordering::SeqCst)
    }

    pub fn query_sessions(&self) -> usize {
        self.query_sessions.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.closed_sessions.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        lock(&self.open).len()
    }

    fn register(&self, database: &str, schema_path: &Path, mode: SessionMode) -> SessionHandle {
        let id = format!("stub-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.open).insert(
            id.clone(),
            OpenSession {
                mode,
                schema_path: schema_path.to_path_buf(),
            },
        );
        SessionHandle::new(id, database)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl TranslationEngine for StubEngine {
    async fn open_session(
        &self,
        database: &str,
        schema_path: &Path,
        mode: SessionMode,
    ) -> Result<SessionHandle, EngineError> {
        match mode {
            SessionMode::Build => {
                self.build_sessions.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.build_delay {
                    tokio::time::sleep(delay).await;
                }
                if lock(&self.failing_builds).contains(database) {
                    return Err(EngineError::Rejected(format!(
                        "Cannot infer schema for database '{}'",
                        database
                    )));
                }
            }
            SessionMode::Query => {
                self.query_sessions.fetch_add(1, Ordering::SeqCst);
                if lock(&self.failing_connections).contains(database) {
                    return Err(EngineError::Rejected(format!(
                        "Cannot connect to database '{}'",
                        database
                    )));
                }
                if !tokio::fs::try_exists(schema_path).await.unwrap_or(false) {
                    return Err(EngineError::Rejected(format!(
                        "Schema file not found: {}",
                        schema_path.display()
                    )));
                }
            }
        }

        Ok(self.register(database, schema_path, mode))
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError> {
        let open = lock(&self.open)
            .remove(&session.id)
            .ok_or_else(|| EngineError::Rejected(format!("Unknown session '{}'", session.id)))?;

        if open.mode == SessionMode::Build {
            let artifact = format!("<schema database=\"{}\"/>\n", session.database);
            tokio::fs::write(&open.schema_path, artifact)
                .await
                .map_err(|e| EngineError::Rejected(format!("Failed to write schema: {}", e)))?;
        }

        self.closed_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn translate(
        &self,
        sql: &str,
        session: &SessionHandle,
    ) -> Result<Translation, EngineError> {
        let mode = lock(&self.open).get(&session.id).map(|open| open.mode);
        if mode != Some(SessionMode::Query) {
            return Err(EngineError::Rejected(format!(
                "Session '{}' is not open for queries",
                session.id
            )));
        }

        let normalized = sql.trim().to_uppercase();
        if !normalized.starts_with("SELECT") {
            return Err(EngineError::Rejected(format!("Unsupported statement: {}", sql)));
        }
        if normalized.contains(" JOIN ") {
            return Ok(Translation::plan_only(format!("NestedLoopJoin [{}]", sql.trim())));
        }

        Ok(Translation::query(format!("db.{}.find({{}})", session.database)))
    }
}
