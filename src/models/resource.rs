use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Handle to a translation engine session opened for one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub id: String,
    pub database: String,
}

impl SessionHandle {
    pub fn new(id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            database: database.into(),
        }
    }
}

/// Which stage of a bootstrap failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SchemaBuild,
    Connection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl ResourceFailure {
    pub fn schema_build(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::SchemaBuild,
            reason: reason.into(),
        }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Connection,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "failure")]
pub enum ResourceStatus {
    Uninitialized,
    Building,
    Ready,
    Failed(ResourceFailure),
}

/// Bootstrap state of a single database.
///
/// Moves `Uninitialized -> Building -> Ready | Failed` once; the transition
/// helpers ignore any other order so a settled resource stays settled.
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub name: String,
    pub schema_path: PathBuf,
    pub status: ResourceStatus,
    /// Present only while `status` is `Ready`, and taken once the session is closed
    pub session: Option<SessionHandle>,
}

impl Resource {
    pub fn new(name: impl Into<String>, schema_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            schema_path: schema_path.into(),
            status: ResourceStatus::Uninitialized,
            session: None,
        }
    }

    pub fn mark_building(&mut self) -> bool {
        if self.status != ResourceStatus::Uninitialized {
            return false;
        }
        self.status = ResourceStatus::Building;
        true
    }

    pub fn mark_ready(&mut self, session: SessionHandle) -> bool {
        if self.status != ResourceStatus::Building {
            return false;
        }
        self.status = ResourceStatus::Ready;
        self.session = Some(session);
        true
    }

    pub fn mark_failed(&mut self, failure: ResourceFailure) -> bool {
        if self.status != ResourceStatus::Building {
            return false;
        }
        self.status = ResourceStatus::Failed(failure);
        self.session = None;
        true
    }

    /// Hand over the open session so it can be closed. Yields it at most once.
    pub fn take_session(&mut self) -> Option<SessionHandle> {
        if !self.is_ready() {
            return None;
        }
        self.session.take()
    }

    /// True once the bootstrap has produced its outcome
    pub fn is_settled(&self) -> bool {
        matches!(self.status, ResourceStatus::Ready | ResourceStatus::Failed(_))
    }

    pub fn is_ready(&self) -> bool {
        self.status == ResourceStatus::Ready
    }

    pub fn failure(&self) -> Option<&ResourceFailure> {
        match &self.status {
            ResourceStatus::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
