//! reqwest implementation of the authoritative backend contract.

use async_trait::async_trait;
use parking_core::{Move, MoveOutcome, Puzzle};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::api::{
    ConfigRecord, ConfigSummary, DeleteConfigResponse, SaveConfigRequest, SolveResponse,
    UpdateConfigRequest,
};
use crate::backend::{Backend, BackendError, SessionToken};

const SESSION_HEADER: &str = "X-Session-ID";

/// Shape of the backend's error payloads.
#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    detail: String,
}

/// HTTP client for the parking backend.
///
/// Attaches the session token to every request and adopts a rotated token
/// when the service returns one in the response header.
#[derive(Debug)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    session: RwLock<SessionToken>,
}

impl HttpBackend {
    /// Creates a client rooted at `base_url` (trailing slashes are trimmed).
    pub fn new(base_url: impl Into<String>, session: SessionToken) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
            session: RwLock::new(session),
        }
    }

    /// The session token currently attached to requests.
    pub fn session(&self) -> SessionToken {
        self.session.read().expect("session lock poisoned").clone()
    }

    fn adopt_session(&self, response: &reqwest::Response) {
        let Some(raw) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return;
        };
        match SessionToken::new(raw) {
            Ok(token) => {
                let mut session = self.session.write().expect("session lock poisoned");
                if *session != token {
                    debug!(session = %token, "adopting rotated session token");
                    *session = token;
                }
            }
            Err(_) => warn!(raw, "ignoring malformed session token from server"),
        }
    }

    #[instrument(skip(self, body), fields(method = %method, path))]
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method, &url)
            .header(SESSION_HEADER, self.session().as_str());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| BackendError::transport(error.to_string()))?;
        self.adopt_session(&response);

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|error| BackendError::remote(format!("invalid response body: {error}")));
        }

        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string(),
        };
        debug!(%status, detail, "backend rejected request");
        Err(BackendError::remote(detail))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, BackendError> {
        self.request(Method::POST, path, body).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_puzzle(&self) -> Result<Puzzle, BackendError> {
        self.get("/puzzle").await
    }

    async fn submit_move(&self, mv: &Move) -> Result<MoveOutcome, BackendError> {
        self.post("/move", Some(mv)).await
    }

    async fn reset(&self) -> Result<Puzzle, BackendError> {
        self.post("/reset", None::<&()>).await
    }

    async fn replace_puzzle(&self, state: &Puzzle) -> Result<MoveOutcome, BackendError> {
        self.request(Method::PUT, "/puzzle", Some(state)).await
    }

    async fn solve(&self) -> Result<SolveResponse, BackendError> {
        self.post("/solve", None::<&()>).await
    }

    async fn save_config(&self, request: &SaveConfigRequest) -> Result<ConfigRecord, BackendError> {
        self.post("/configs", Some(request)).await
    }

    async fn update_config(
        &self,
        id: i64,
        request: &UpdateConfigRequest,
    ) -> Result<ConfigRecord, BackendError> {
        self.request(Method::PUT, &format!("/configs/{id}"), Some(request))
            .await
    }

    async fn delete_config(&self, id: i64) -> Result<DeleteConfigResponse, BackendError> {
        self.request(Method::DELETE, &format!("/configs/{id}"), None::<&()>)
            .await
    }

    async fn list_configs(&self) -> Result<Vec<ConfigSummary>, BackendError> {
        self.get("/configs").await
    }

    async fn get_config(&self, id: i64) -> Result<ConfigRecord, BackendError> {
        self.get(&format!("/configs/{id}")).await
    }

    async fn activate_config(&self, id: i64) -> Result<ConfigRecord, BackendError> {
        self.post(&format!("/configs/{id}/activate"), None::<&()>)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/api/", SessionToken::generate());
        assert_eq!(backend.base_url, "http://localhost:8000/api");
    }
}
