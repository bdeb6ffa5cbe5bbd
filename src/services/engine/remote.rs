use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::{EngineError, TranslationEngine};
use crate::models::{SessionHandle, SessionMode, Translation};

#[derive(Debug, Serialize)]
struct OpenSessionRequest<'a> {
    database: &'a str,
    schema_path: &'a Path,
    mode: SessionMode,
}

#[derive(Debug, Deserialize)]
struct OpenSessionResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    sql: &'a str,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    error: String,
}

/// HTTP client for a translation engine sidecar
pub struct RemoteEngine {
    base_url: Url,
    http_client: HttpClient,
}

impl RemoteEngine {
    /// `timeout` bounds each engine request; `None` waits indefinitely
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, EngineError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| EngineError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(base_url.to_string()));
        }

        let mut builder = HttpClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url,
            http_client: builder.build()?,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, EngineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RemoteErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        Err(EngineError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl TranslationEngine for RemoteEngine {
    async fn open_session(
        &self,
        database: &str,
        schema_path: &Path,
        mode: SessionMode,
    ) -> Result<SessionHandle, EngineError> {
        let url = self.endpoint(&["sessions"])?;
        tracing::debug!("Opening {:?} session for {} at {}", mode, database, url);

        let response = self
            .http_client
            .post(url)
            .json(&OpenSessionRequest {
                database,
                schema_path,
                mode,
            })
            .send()
            .await?;

        let opened: OpenSessionResponse = Self::check(response).await?.json().await?;
        Ok(SessionHandle::new(opened.session_id, database))
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<(), EngineError> {
        let url = self.endpoint(&["sessions", &session.id])?;
        let response = self.http_client.delete(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn translate(
        &self,
        sql: &str,
        session: &SessionHandle,
    ) -> Result<Translation, EngineError> {
        let url = self.endpoint(&["sessions", &session.id, "translate"])?;
        let response = self
            .http_client
            .post(url)
            .json(&TranslateRequest { sql })
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }
}
