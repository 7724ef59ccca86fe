//! The authoritative-backend contract consumed by the session machine.

use async_trait::async_trait;
use derive_more::{Display, Error};
use parking_core::{Move, MoveOutcome, Puzzle};

use crate::api::{
    ConfigRecord, ConfigSummary, DeleteConfigResponse, SaveConfigRequest, SolveResponse,
    UpdateConfigRequest,
};

/// How a backend operation failed.
///
/// The split drives the session machine's recovery policy: transport
/// failures flip the session into offline mode, remote failures are
/// surfaced while the session stays online and keeps its link alive.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum BackendError {
    /// The service could not be reached at the network level.
    #[display("backend unreachable: {message}")]
    Transport {
        /// Underlying connectivity failure.
        message: String,
    },
    /// The service was reached but rejected the operation.
    #[display("{detail}")]
    Remote {
        /// Human-readable failure detail from the service.
        detail: String,
    },
}

impl BackendError {
    /// Builds a transport-level failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Builds a remote-logic failure.
    pub fn remote(detail: impl Into<String>) -> Self {
        Self::Remote {
            detail: detail.into(),
        }
    }

    /// True for network-level failures that warrant offline fallback.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// The session token does not match the accepted shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("session token must be 8 to 128 characters of [A-Za-z0-9_-]")]
pub struct InvalidSessionToken;

/// Opaque per-session identifier attached to every authoritative exchange.
///
/// The core never interprets the token beyond requiring the shape the
/// backend accepts: 8 to 128 characters drawn from `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Validates and wraps a raw token.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidSessionToken> {
        let raw = raw.into();
        let shape_ok = (8..=128).contains(&raw.len())
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-');
        if shape_ok {
            Ok(Self(raw))
        } else {
            Err(InvalidSessionToken)
        }
    }

    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// The raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The HTTP collaborator exposing the authoritative puzzle.
///
/// The session machine only consumes this contract; [`crate::HttpBackend`]
/// implements it over reqwest, and tests substitute in-memory fakes.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches the current puzzle snapshot.
    async fn fetch_puzzle(&self) -> Result<Puzzle, BackendError>;

    /// Submits a move and returns the resulting snapshot.
    async fn submit_move(&self, mv: &Move) -> Result<MoveOutcome, BackendError>;

    /// Resets the puzzle to the active stored layout.
    async fn reset(&self) -> Result<Puzzle, BackendError>;

    /// Replaces the current puzzle state wholesale.
    async fn replace_puzzle(&self, state: &Puzzle) -> Result<MoveOutcome, BackendError>;

    /// Runs the solver against the current puzzle.
    async fn solve(&self) -> Result<SolveResponse, BackendError>;

    /// Stores a new puzzle configuration.
    async fn save_config(&self, request: &SaveConfigRequest) -> Result<ConfigRecord, BackendError>;

    /// Updates a stored puzzle configuration.
    async fn update_config(
        &self,
        id: i64,
        request: &UpdateConfigRequest,
    ) -> Result<ConfigRecord, BackendError>;

    /// Deletes a stored puzzle configuration.
    async fn delete_config(&self, id: i64) -> Result<DeleteConfigResponse, BackendError>;

    /// Lists stored puzzle configurations.
    async fn list_configs(&self) -> Result<Vec<ConfigSummary>, BackendError>;

    /// Fetches one stored puzzle configuration.
    async fn get_config(&self, id: i64) -> Result<ConfigRecord, BackendError>;

    /// Makes a stored configuration the active one.
    async fn activate_config(&self, id: i64) -> Result<ConfigRecord, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape_is_enforced() {
        assert!(SessionToken::new("abcd1234").is_ok());
        assert!(SessionToken::new("with-dash_and_underscore").is_ok());
        assert!(SessionToken::new("short").is_err());
        assert!(SessionToken::new("has spaces in it").is_err());
        assert!(SessionToken::new("x".repeat(129)).is_err());
    }

    #[test]
    fn generated_tokens_validate() {
        let token = SessionToken::generate();
        assert!(SessionToken::new(token.as_str().to_string()).is_ok());
    }
}
