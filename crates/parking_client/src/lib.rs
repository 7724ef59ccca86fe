//! Client-side session machinery for the parking puzzle.
//!
//! The heart of this crate is [`PuzzleSession`], which reconciles an
//! authoritative remote puzzle source with the local move engine from
//! `parking_core`: it falls back to offline play when the backend becomes
//! unreachable, keeps a realtime push link alive with a fixed reconnect
//! delay, and drives animated replay of solver output.
//!
//! The remote collaborators are consumed through the [`Backend`] and
//! [`PushChannel`] traits; [`HttpBackend`] is the reqwest implementation of
//! the HTTP contract.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod backend;
mod http;
mod realtime;
mod session;

pub use api::{
    ConfigRecord, ConfigSummary, DeleteConfigResponse, PushMessage, SaveConfigRequest,
    SolveResponse, UpdateConfigRequest,
};
pub use backend::{Backend, BackendError, InvalidSessionToken, SessionToken};
pub use http::HttpBackend;
pub use realtime::{PushChannel, PushStream};
pub use session::{PlaybackHandle, PuzzleSession, SessionConfig, SessionError, SessionEvent};
