use serde::{Deserialize, Serialize};

/// How an engine session is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Short-lived session that (re)generates the schema artifact and flushes it on close
    Build,
    /// Long-lived session used for translation
    Query,
}

/// Engine output for one SQL statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Translation {
    /// Native query text, absent when the SQL has no single-query equivalent
    pub query: Option<String>,
    /// Diagnostic logical plan
    pub plan: Option<String>,
}

impl Translation {
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            plan: None,
        }
    }

    pub fn plan_only(plan: impl Into<String>) -> Self {
        Self {
            query: None,
            plan: Some(plan.into()),
        }
    }

    /// Query text, empty when the engine produced none
    pub fn query_text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateResponse {
    pub db: String,
    pub sql: String,
    pub mongo: String,
}

/// Per-name outcome of a warmup call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupReport {
    pub initialized: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl WarmupReport {
    pub fn into_response(self, requested: impl Into<String>) -> WarmupResponse {
        let failed = self
            .failed
            .iter()
            .map(|(name, reason)| format!("{} ({})", name, reason))
            .collect::<Vec<_>>()
            .join(", ");

        WarmupResponse {
            requested: requested.into(),
            initialized: self.initialized.join(", "),
            failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WarmupResponse {
    pub requested: String,
    pub initialized: String,
    pub failed: String,
}
