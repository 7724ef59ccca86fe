//! Wire types exchanged with the authoritative backend.

use chrono::{DateTime, Utc};
use parking_core::{Exit, Puzzle};
use serde::{Deserialize, Serialize};

/// Payload returned by the solve endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResponse {
    /// Final puzzle snapshot reached by the solver.
    pub state: Puzzle,
    /// Whether that snapshot is solved.
    pub completed: bool,
    /// Number of moves in the solution.
    pub moves: u32,
    /// Ordered snapshots from initial to final state, when the solver
    /// produced a replayable path.
    #[serde(default)]
    pub path: Option<Vec<Puzzle>>,
    /// Wall-clock solver time in milliseconds, if measured.
    #[serde(default)]
    pub elapsed_ms: Option<f64>,
}

/// Compact listing entry for a stored puzzle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    /// Storage id.
    pub id: i64,
    /// Display name, unique per store.
    pub name: String,
    /// Board side length.
    pub size: u8,
    /// Exit cell.
    pub exit: Exit,
    /// Number of vehicles in the stored layout.
    pub vehicle_count: u32,
    /// Whether this configuration is the active one.
    pub active: bool,
    /// When the configuration was stored.
    pub created_at: DateTime<Utc>,
}

/// Full stored puzzle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Storage id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// The stored layout.
    pub state: Puzzle,
    /// Whether this configuration is the active one.
    pub active: bool,
    /// When the configuration was stored.
    pub created_at: DateTime<Utc>,
}

/// Payload returned when a stored configuration is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteConfigResponse {
    /// Id of the removed configuration.
    pub removed_id: i64,
    /// Name of the removed configuration.
    pub removed_name: String,
    /// Whether an active configuration remains after deletion.
    pub active: bool,
    /// Name of the configuration promoted to active, if any.
    #[serde(default)]
    pub activated_name: Option<String>,
    /// Replacement puzzle state, present when the active config was removed.
    #[serde(default)]
    pub state: Option<Puzzle>,
    /// Whether the replacement state is solved.
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Request body for storing a new configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveConfigRequest {
    /// Display name.
    pub name: String,
    /// Layout to store.
    pub state: Puzzle,
    /// Make this the active configuration immediately.
    pub activate: bool,
}

/// Request body for updating a stored configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    /// Replacement layout.
    pub state: Puzzle,
    /// New name, if renaming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Change the active flag, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activate: Option<bool>,
}

/// Message delivered over the realtime push channel.
///
/// Only `state` messages carry data; every other tag deserializes to
/// [`PushMessage::Ignored`] and is dropped by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushMessage {
    /// Authoritative puzzle snapshot pushed by the backend.
    State {
        /// The pushed snapshot.
        state: Puzzle,
        /// Whether the snapshot is solved.
        completed: bool,
    },
    /// Any message tag this client does not understand.
    #[serde(other)]
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_push_deserializes() {
        let raw = serde_json::json!({
            "type": "state",
            "session": "abcdefgh",
            "state": Puzzle::default_layout(),
            "completed": false,
            "timestamp": 12.5,
        });
        let message: PushMessage = serde_json::from_value(raw).unwrap();
        assert!(matches!(message, PushMessage::State { completed: false, .. }));
    }

    #[test]
    fn unknown_push_tags_are_ignored() {
        let message: PushMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(message, PushMessage::Ignored);
    }

    #[test]
    fn update_request_omits_unset_fields() {
        let request = UpdateConfigRequest {
            state: Puzzle::default_layout(),
            name: None,
            activate: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("\"name\""));
        assert!(!json.contains("\"activate\""));
    }
}
