//! Client-side puzzle session state machine.
//!
//! Reconciles the authoritative backend with the local move engine, keeps
//! the realtime link alive, and drives animated replay of solver output.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use derive_more::{Display, Error};
use parking_core::{Move, MoveError, MoveOutcome, Puzzle, apply_move};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ConfigRecord, ConfigSummary, DeleteConfigResponse, PushMessage, SaveConfigRequest,
    SolveResponse, UpdateConfigRequest,
};
use crate::backend::{Backend, BackendError};
use crate::realtime::{LinkEvent, PushChannel, spawn_link_task};

const NOTICE_CONNECTION_LOST: &str = "Connection lost. Retrying…";

/// Fixed delay between realtime reconnect attempts.
pub const SOCKET_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
/// Fixed delay between solution playback frames.
pub const SOLUTION_FRAME_DELAY: Duration = Duration::from_millis(550);

/// Timing knobs for a session, overridable in tests.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Delay between solution playback frames.
    pub frame_delay: Duration,
    /// Delay between realtime reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_delay: SOLUTION_FRAME_DELAY,
            reconnect_delay: SOCKET_RECONNECT_DELAY,
        }
    }
}

/// Why a session operation failed.
///
/// Only operations whose callers need the failure signal return errors;
/// `load_puzzle` and `reset_puzzle` recover to the bundled default instead.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum SessionError {
    /// The local move engine rejected the move.
    #[display("{_0}")]
    Move(MoveError),
    /// The backend reported a failure.
    #[display("{_0}")]
    Backend(BackendError),
    /// The operation needs the backend, which is disabled.
    #[display("Backend disabled. Cannot {action}.")]
    BackendDisabled {
        /// What could not be done.
        action: &'static str,
    },
}

impl From<MoveError> for SessionError {
    fn from(error: MoveError) -> Self {
        Self::Move(error)
    }
}

impl From<BackendError> for SessionError {
    fn from(error: BackendError) -> Self {
        Self::Backend(error)
    }
}

/// Observable change emitted to session subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The puzzle snapshot was replaced.
    PuzzleChanged {
        /// The new snapshot.
        puzzle: Puzzle,
        /// Whether it is solved.
        completed: bool,
    },
    /// Playback advanced (or jumped) to a solution frame.
    SolutionFrame {
        /// Index of the frame now shown.
        step: usize,
        /// Total frames in the path.
        total: usize,
    },
    /// The user-facing notice changed.
    NoticeChanged(Option<String>),
    /// The recorded error changed.
    ErrorChanged(Option<String>),
    /// An operation started or finished.
    LoadingChanged(bool),
    /// The realtime link came up or went down.
    RealtimeChanged(bool),
    /// The session entered or left offline mode.
    OfflineChanged(bool),
    /// The backend was enabled or disabled.
    BackendEnabledChanged(bool),
    /// Solution playback started or stopped.
    AnimatingChanged(bool),
}

/// Cancels solution playback from outside the session borrow.
///
/// Cancellation is cooperative: the player polls the flag between frames,
/// so latency is bounded by the frame delay.
#[derive(Debug, Clone)]
pub struct PlaybackHandle(Arc<AtomicBool>);

impl PlaybackHandle {
    /// Halts playback after the current frame. Already-applied frames keep
    /// their state.
    pub fn cancel(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether playback is currently running.
    pub fn is_animating(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Client-side orchestration of one puzzle session.
///
/// Owned by the caller; all observable state is reached through getters and
/// the [`SessionEvent`] stream from [`PuzzleSession::subscribe`]. Operations
/// are not serialized against each other: a local move and an incoming push
/// race last-writer-wins.
pub struct PuzzleSession {
    backend: Arc<dyn Backend>,
    push: Option<Arc<dyn PushChannel>>,
    config: SessionConfig,
    default_puzzle: Puzzle,

    puzzle: Puzzle,
    completed: bool,
    loading: bool,
    last_error: Option<String>,
    notice: Option<String>,
    offline_mode: bool,
    backend_enabled: bool,
    realtime_connected: bool,

    solution_path: Vec<Puzzle>,
    solution_step: usize,
    animating: Arc<AtomicBool>,

    link_events: UnboundedReceiver<LinkEvent>,
    link_sender: UnboundedSender<LinkEvent>,
    link_task: Option<JoinHandle<()>>,

    subscribers: Vec<UnboundedSender<SessionEvent>>,
}

impl PuzzleSession {
    /// Creates a session over the given collaborators with default timing.
    ///
    /// Without a push channel the session runs request/response only and
    /// realtime management becomes a no-op.
    pub fn new(backend: Arc<dyn Backend>, push: Option<Arc<dyn PushChannel>>) -> Self {
        Self::with_config(backend, push, SessionConfig::default())
    }

    /// Creates a session with explicit timing knobs.
    pub fn with_config(
        backend: Arc<dyn Backend>,
        push: Option<Arc<dyn PushChannel>>,
        config: SessionConfig,
    ) -> Self {
        let default_puzzle = Puzzle::default_layout();
        let (link_sender, link_events) = mpsc::unbounded_channel();
        Self {
            backend,
            push,
            config,
            puzzle: default_puzzle.clone(),
            default_puzzle,
            completed: false,
            loading: false,
            last_error: None,
            notice: None,
            offline_mode: true,
            backend_enabled: true,
            realtime_connected: false,
            solution_path: Vec::new(),
            solution_step: 0,
            animating: Arc::new(AtomicBool::new(false)),
            link_events,
            link_sender,
            link_task: None,
            subscribers: Vec::new(),
        }
    }

    /// Registers a new event subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Current puzzle snapshot.
    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    /// Whether the current snapshot is solved.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Whether an operation is in flight.
    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Last recorded error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current user-facing notice, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Whether moves run through the local engine.
    pub fn offline_mode(&self) -> bool {
        self.offline_mode
    }

    /// Whether the backend is consulted at all.
    pub fn backend_enabled(&self) -> bool {
        self.backend_enabled
    }

    /// Whether the realtime link is believed healthy.
    pub fn realtime_connected(&self) -> bool {
        self.realtime_connected
    }

    /// The solution path currently loaded for playback.
    pub fn solution_path(&self) -> &[Puzzle] {
        &self.solution_path
    }

    /// Index of the solution frame currently shown.
    pub fn solution_step(&self) -> usize {
        self.solution_step
    }

    /// Whether playback is running.
    pub fn solution_animating(&self) -> bool {
        self.animating.load(Ordering::SeqCst)
    }

    /// Handle for cancelling playback from another task.
    pub fn playback_handle(&self) -> PlaybackHandle {
        PlaybackHandle(Arc::clone(&self.animating))
    }

    // ─────────────────────────────────────────────────────────────
    //  Puzzle operations
    // ─────────────────────────────────────────────────────────────

    /// Fetches the authoritative puzzle, falling back to the bundled
    /// default on failure. Never errors.
    #[instrument(skip(self))]
    pub async fn load_puzzle(&mut self) -> Puzzle {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let state = self.load_puzzle_inner().await;
        self.set_loading(false);
        state
    }

    async fn load_puzzle_inner(&mut self) -> Puzzle {
        if !self.backend_enabled {
            return self.fallback_to_default(Some("Backend disabled. Showing default puzzle."));
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.fetch_puzzle().await {
            Ok(state) => {
                self.set_puzzle(state.clone(), false);
                self.mark_backend_healthy();
                self.set_notice(None);
                self.clear_solution_path();
                state
            }
            Err(error) if error.is_transport() => {
                info!(%error, "backend unreachable, entering offline mode");
                let state =
                    self.fallback_to_default(Some("Backend unreachable. Showing default puzzle."));
                self.enter_offline_mode();
                state
            }
            Err(error) => {
                warn!(%error, "failed to load puzzle");
                let state = self.fallback_to_default(None);
                self.set_error(Some(error.to_string()));
                self.ensure_realtime_connection();
                state
            }
        }
    }

    /// Moves a vehicle, remotely when the backend is enabled and through
    /// the local engine otherwise. Illegal moves propagate and leave the
    /// puzzle untouched.
    #[instrument(skip(self), fields(vehicle = vehicle_id, steps))]
    pub async fn move_vehicle(
        &mut self,
        vehicle_id: &str,
        steps: i32,
    ) -> Result<MoveOutcome, SessionError> {
        self.set_loading(true);
        let result = self.move_vehicle_inner(vehicle_id, steps).await;
        self.set_loading(false);
        result
    }

    async fn move_vehicle_inner(
        &mut self,
        vehicle_id: &str,
        steps: i32,
    ) -> Result<MoveOutcome, SessionError> {
        let mv = Move {
            vehicle_id: vehicle_id.to_string(),
            steps,
        };

        if !self.backend_enabled {
            let outcome = apply_move(&self.puzzle, &mv)?;
            self.set_puzzle(outcome.state.clone(), outcome.completed);
            self.set_offline(true);
            self.set_error(None);
            self.set_notice(Some("Backend disabled: applying move locally.".into()));
            return Ok(outcome);
        }

        self.ensure_realtime_connection();
        let backend = Arc::clone(&self.backend);
        match backend.submit_move(&mv).await {
            Ok(outcome) => {
                self.set_puzzle(outcome.state.clone(), outcome.completed);
                self.mark_backend_healthy();
                self.set_error(None);
                self.set_notice(None);
                self.clear_solution_path();
                Ok(outcome)
            }
            Err(error) if error.is_transport() => {
                info!(%error, "move failed at transport level, replaying locally");
                self.enter_offline_mode();
                match apply_move(&self.puzzle, &mv) {
                    Ok(outcome) => {
                        self.set_puzzle(outcome.state.clone(), outcome.completed);
                        self.set_offline(true);
                        self.set_error(None);
                        self.set_notice(Some("Offline mode: using local puzzle logic.".into()));
                        self.clear_solution_path();
                        Ok(outcome)
                    }
                    Err(move_error) => {
                        self.set_error(Some(move_error.to_string()));
                        Err(move_error.into())
                    }
                }
            }
            Err(error) => {
                self.set_error(Some(error.to_string()));
                self.ensure_realtime_connection();
                Err(error.into())
            }
        }
    }

    /// Resets to the authoritative starting layout, falling back to the
    /// bundled default on failure. Never errors.
    #[instrument(skip(self))]
    pub async fn reset_puzzle(&mut self) -> Puzzle {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let state = self.reset_puzzle_inner().await;
        self.set_loading(false);
        state
    }

    async fn reset_puzzle_inner(&mut self) -> Puzzle {
        if !self.backend_enabled {
            return self.fallback_to_default(Some("Backend disabled. Resetting to default puzzle."));
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.reset().await {
            Ok(state) => {
                self.set_puzzle(state.clone(), false);
                self.mark_backend_healthy();
                self.set_notice(None);
                self.clear_solution_path();
                state
            }
            Err(error) if error.is_transport() => {
                info!(%error, "reset failed at transport level");
                let state = self
                    .fallback_to_default(Some("Backend unreachable. Resetting to default puzzle."));
                self.enter_offline_mode();
                state
            }
            Err(error) => {
                warn!(%error, "failed to reset puzzle");
                let state = self.fallback_to_default(None);
                self.set_error(Some(error.to_string()));
                self.ensure_realtime_connection();
                state
            }
        }
    }

    /// Requests a solution and replays it.
    ///
    /// A returned path animates frame-by-frame on the configured delay; an
    /// absent path applies the final state directly. The notice afterwards
    /// reports the move count and elapsed time when available.
    #[instrument(skip(self))]
    pub async fn solve_puzzle(&mut self) -> Result<Puzzle, SessionError> {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let result = self.solve_puzzle_inner().await;
        self.set_loading(false);
        result
    }

    async fn solve_puzzle_inner(&mut self) -> Result<Puzzle, SessionError> {
        if !self.backend_enabled {
            self.set_notice(Some("Backend disabled. Cannot run solver.".into()));
            return Ok(self.puzzle.clone());
        }
        self.ensure_realtime_connection();
        self.set_animating(false);

        let backend = Arc::clone(&self.backend);
        match backend.solve().await {
            Ok(payload) => {
                self.mark_backend_healthy();
                let final_state = self.apply_solve_payload(payload).await;
                Ok(final_state)
            }
            Err(error) if error.is_transport() => {
                self.enter_offline_mode();
                let message = "Backend unreachable. Cannot run solver.".to_string();
                self.set_error(Some(message.clone()));
                self.set_notice(Some(message));
                Err(error.into())
            }
            Err(error) => {
                self.set_error(Some(error.to_string()));
                self.ensure_realtime_connection();
                Err(error.into())
            }
        }
    }

    async fn apply_solve_payload(&mut self, payload: SolveResponse) -> Puzzle {
        let final_state = match payload.path {
            Some(path) if !path.is_empty() => self.play_solution_path(path).await,
            _ => {
                self.clear_solution_path();
                let state = payload.state.clone();
                self.set_puzzle(state.clone(), state.is_solved());
                state
            }
        };

        let solved = final_state.is_solved();
        let elapsed = format_elapsed_ms(payload.elapsed_ms);
        let notice = if solved {
            match &elapsed {
                Some(elapsed) => format!("Solved in {} moves ({elapsed})", payload.moves),
                None => format!("Solved in {} moves", payload.moves),
            }
        } else {
            match &elapsed {
                Some(elapsed) => {
                    format!("Solver did not complete within the limit (ran {elapsed}).")
                }
                None => "Solver did not complete within the limit.".to_string(),
            }
        };
        self.set_notice(Some(notice));

        final_state
    }

    /// Plays every frame of the path in order, emitting one
    /// [`SessionEvent::PuzzleChanged`] per frame. Returns the last frame
    /// applied before completion or cancellation.
    async fn play_solution_path(&mut self, frames: Vec<Puzzle>) -> Puzzle {
        if frames.is_empty() {
            self.clear_solution_path();
            return self.puzzle.clone();
        }

        let total = frames.len();
        self.solution_path = frames.clone();
        self.solution_step = 0;
        self.set_animating(true);

        let mut last = self.puzzle.clone();
        for (index, frame) in frames.into_iter().enumerate() {
            if !self.animating.load(Ordering::SeqCst) {
                break;
            }
            let completed = frame.is_solved();
            self.set_puzzle(frame.clone(), completed);
            last = frame;
            self.solution_step = index;
            self.emit(SessionEvent::SolutionFrame { step: index, total });

            if index + 1 < total {
                tokio::time::sleep(self.config.frame_delay).await;
                if !self.animating.load(Ordering::SeqCst) {
                    break;
                }
            }
        }

        self.set_animating(false);
        last
    }

    /// Jumps to a solution frame, clamped to the path bounds, halting any
    /// running playback.
    pub fn show_solution_step(&mut self, index: usize) {
        if self.solution_path.is_empty() {
            return;
        }
        self.set_animating(false);
        let clamped = index.min(self.solution_path.len() - 1);
        let frame = self.solution_path[clamped].clone();
        let completed = frame.is_solved();
        self.set_puzzle(frame, completed);
        self.solution_step = clamped;
        self.emit(SessionEvent::SolutionFrame {
            step: clamped,
            total: self.solution_path.len(),
        });
    }

    /// Seeks relative to the current solution frame.
    pub fn step_solution(&mut self, delta: i64) {
        if self.solution_path.is_empty() {
            return;
        }
        self.set_animating(false);
        let next = (self.solution_step as i64 + delta).max(0) as usize;
        self.show_solution_step(next);
    }

    /// Drops the loaded solution path and stops playback.
    pub fn clear_solution_path(&mut self) {
        self.solution_path.clear();
        self.solution_step = 0;
        self.set_animating(false);
    }

    /// Resets locally to the bundled default layout.
    pub fn use_default_puzzle(&mut self) -> Puzzle {
        self.set_error(None);
        self.set_notice(None);
        self.fallback_to_default(None)
    }

    /// Replaces the authoritative puzzle state wholesale.
    #[instrument(skip(self, state))]
    pub async fn replace_puzzle_state(&mut self, state: Puzzle) -> Result<Puzzle, SessionError> {
        self.set_error(None);
        self.set_loading(true);
        let result = self.replace_puzzle_state_inner(state).await;
        self.set_loading(false);
        result
    }

    async fn replace_puzzle_state_inner(&mut self, state: Puzzle) -> Result<Puzzle, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "replace puzzle state",
            });
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.replace_puzzle(&state).await {
            Ok(outcome) => {
                self.set_puzzle(outcome.state.clone(), outcome.completed);
                self.mark_backend_healthy();
                self.set_notice(None);
                self.clear_solution_path();
                Ok(outcome.state)
            }
            Err(error) => {
                self.record_proxy_failure(&error, "Failed to update puzzle.");
                Err(error.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Configuration CRUD proxies
    // ─────────────────────────────────────────────────────────────

    /// Stores a puzzle configuration, adopting it when it becomes active.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn save_puzzle_configuration(
        &mut self,
        request: SaveConfigRequest,
    ) -> Result<ConfigRecord, SessionError> {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let result = self.save_puzzle_configuration_inner(request).await;
        self.set_loading(false);
        result
    }

    async fn save_puzzle_configuration_inner(
        &mut self,
        request: SaveConfigRequest,
    ) -> Result<ConfigRecord, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "save puzzle configuration",
            });
        }
        self.ensure_realtime_connection();

        let activate = request.activate;
        let backend = Arc::clone(&self.backend);
        match backend.save_config(&request).await {
            Ok(record) => {
                self.mark_backend_healthy();
                if record.active {
                    let completed = record.state.is_solved();
                    self.set_puzzle(record.state.clone(), completed);
                    self.clear_solution_path();
                }
                let notice = if activate {
                    format!("Activated puzzle \"{}\"", record.name)
                } else {
                    format!("Saved puzzle \"{}\"", record.name)
                };
                self.set_notice(Some(notice));
                Ok(record)
            }
            Err(error) => {
                self.record_proxy_failure(&error, "Failed to save puzzle.");
                Err(error.into())
            }
        }
    }

    /// Updates a stored puzzle configuration.
    #[instrument(skip(self, request), fields(id))]
    pub async fn update_puzzle_configuration(
        &mut self,
        id: i64,
        request: UpdateConfigRequest,
    ) -> Result<ConfigRecord, SessionError> {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let result = self.update_puzzle_configuration_inner(id, request).await;
        self.set_loading(false);
        result
    }

    async fn update_puzzle_configuration_inner(
        &mut self,
        id: i64,
        request: UpdateConfigRequest,
    ) -> Result<ConfigRecord, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "update puzzle configuration",
            });
        }
        self.ensure_realtime_connection();

        let activate = request.activate;
        let backend = Arc::clone(&self.backend);
        match backend.update_config(id, &request).await {
            Ok(record) => {
                self.mark_backend_healthy();
                if record.active {
                    let completed = record.state.is_solved();
                    self.set_puzzle(record.state.clone(), completed);
                    self.clear_solution_path();
                }
                let notice = match activate {
                    Some(true) => format!("Updated and activated puzzle \"{}\"", record.name),
                    Some(false) => format!("Updated puzzle \"{}\" (not active)", record.name),
                    None => format!("Updated puzzle \"{}\"", record.name),
                };
                self.set_notice(Some(notice));
                Ok(record)
            }
            Err(error) => {
                self.record_proxy_failure(&error, "Failed to update puzzle.");
                Err(error.into())
            }
        }
    }

    /// Deletes a stored puzzle configuration, adopting the replacement
    /// state when the active one was removed.
    #[instrument(skip(self), fields(id))]
    pub async fn delete_puzzle_configuration(
        &mut self,
        id: i64,
    ) -> Result<DeleteConfigResponse, SessionError> {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let result = self.delete_puzzle_configuration_inner(id).await;
        self.set_loading(false);
        result
    }

    async fn delete_puzzle_configuration_inner(
        &mut self,
        id: i64,
    ) -> Result<DeleteConfigResponse, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "delete puzzle configuration",
            });
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.delete_config(id).await {
            Ok(response) => {
                self.mark_backend_healthy();
                if let Some(state) = &response.state {
                    self.set_puzzle(state.clone(), response.completed.unwrap_or(false));
                    self.clear_solution_path();
                }
                let mut notice = format!("Deleted puzzle \"{}\".", response.removed_name);
                if let Some(activated) = &response.activated_name {
                    notice = format!("{notice} Active puzzle: \"{activated}\".");
                }
                self.set_notice(Some(notice));
                Ok(response)
            }
            Err(error) => {
                self.record_proxy_failure(&error, "Failed to delete puzzle.");
                Err(error.into())
            }
        }
    }

    /// Lists stored puzzle configurations.
    pub async fn fetch_puzzle_configurations(&mut self) -> Result<Vec<ConfigSummary>, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "load puzzle configurations",
            });
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.list_configs().await {
            Ok(records) => {
                self.mark_backend_healthy();
                Ok(records)
            }
            Err(error) => {
                if error.is_transport() {
                    self.enter_offline_mode();
                }
                Err(error.into())
            }
        }
    }

    /// Fetches one stored puzzle configuration.
    pub async fn fetch_puzzle_configuration(
        &mut self,
        id: i64,
    ) -> Result<ConfigRecord, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "load puzzle configurations",
            });
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.get_config(id).await {
            Ok(record) => {
                self.mark_backend_healthy();
                Ok(record)
            }
            Err(error) => {
                if error.is_transport() {
                    self.enter_offline_mode();
                }
                Err(error.into())
            }
        }
    }

    /// Makes a stored configuration active and adopts its layout.
    #[instrument(skip(self), fields(id))]
    pub async fn activate_puzzle_configuration(
        &mut self,
        id: i64,
    ) -> Result<ConfigRecord, SessionError> {
        self.set_error(None);
        self.set_notice(None);
        self.set_loading(true);
        let result = self.activate_puzzle_configuration_inner(id).await;
        self.set_loading(false);
        result
    }

    async fn activate_puzzle_configuration_inner(
        &mut self,
        id: i64,
    ) -> Result<ConfigRecord, SessionError> {
        if !self.backend_enabled {
            return Err(SessionError::BackendDisabled {
                action: "activate configuration",
            });
        }
        self.ensure_realtime_connection();

        let backend = Arc::clone(&self.backend);
        match backend.activate_config(id).await {
            Ok(record) => {
                let completed = record.state.is_solved();
                self.set_puzzle(record.state.clone(), completed);
                self.mark_backend_healthy();
                self.clear_solution_path();
                self.set_notice(Some(format!("Activated puzzle \"{}\"", record.name)));
                Ok(record)
            }
            Err(error) => {
                self.record_proxy_failure(&error, "Failed to activate puzzle.");
                Err(error.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    //  Backend toggle and realtime link
    // ─────────────────────────────────────────────────────────────

    /// Enables or disables the backend for this session.
    ///
    /// Disabling closes the realtime link and resets to the bundled
    /// default; enabling re-opens the link and reloads authoritative state.
    #[instrument(skip(self))]
    pub async fn set_backend_enabled(&mut self, value: bool) {
        if self.backend_enabled != value {
            self.backend_enabled = value;
            self.emit(SessionEvent::BackendEnabledChanged(value));
        }
        if !value {
            self.set_realtime_connected(false);
            self.close_realtime();
            self.fallback_to_default(Some("Backend disabled. Showing default puzzle."));
            return;
        }
        self.refresh_realtime_connection();
        self.load_puzzle().await;
    }

    /// Tears down the current realtime link and opens a fresh one.
    pub fn refresh_realtime_connection(&mut self) {
        self.close_realtime();
        self.ensure_realtime_connection();
    }

    /// Spawns the realtime link task if none is running.
    ///
    /// Idempotent: a live task, a disabled backend, or a session without a
    /// push channel all make this a no-op. The task itself retries on the
    /// configured fixed delay, so scheduling a reconnect while one is
    /// pending is also a no-op.
    pub fn ensure_realtime_connection(&mut self) {
        if !self.backend_enabled {
            return;
        }
        if self.link_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let Some(channel) = self.push.as_ref().map(Arc::clone) else {
            return;
        };
        debug!("opening realtime link");
        self.link_task = Some(spawn_link_task(
            channel,
            self.link_sender.clone(),
            self.config.reconnect_delay,
        ));
    }

    /// Applies any pending realtime events to the session.
    ///
    /// Pushes overwrite local state unconditionally: last-writer-wins, with
    /// no sequence fencing between local moves and incoming pushes.
    pub fn pump_realtime(&mut self) {
        while let Ok(event) = self.link_events.try_recv() {
            self.handle_link_event(event);
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened => {
                self.mark_backend_healthy();
                self.set_error(None);
                self.set_notice(None);
            }
            LinkEvent::Message(PushMessage::State { state, completed }) => {
                debug!("applying pushed state");
                self.set_puzzle(state, completed);
                self.mark_backend_healthy();
                self.set_error(None);
                self.set_notice(None);
            }
            LinkEvent::Message(PushMessage::Ignored) => {}
            LinkEvent::Closed => {
                self.set_realtime_connected(false);
                if self.backend_enabled {
                    self.set_notice(Some(NOTICE_CONNECTION_LOST.into()));
                }
            }
        }
    }

    fn close_realtime(&mut self) {
        if let Some(task) = self.link_task.take() {
            task.abort();
        }
        // Replace the channel so stale events from the old link are dropped.
        let (sender, receiver) = mpsc::unbounded_channel();
        self.link_sender = sender;
        self.link_events = receiver;
    }

    // ─────────────────────────────────────────────────────────────
    //  State plumbing
    // ─────────────────────────────────────────────────────────────

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    fn set_puzzle(&mut self, puzzle: Puzzle, completed: bool) {
        self.puzzle = puzzle.clone();
        self.completed = completed;
        self.emit(SessionEvent::PuzzleChanged { puzzle, completed });
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.emit(SessionEvent::LoadingChanged(loading));
        }
    }

    fn set_error(&mut self, error: Option<String>) {
        if self.last_error != error {
            self.last_error = error.clone();
            self.emit(SessionEvent::ErrorChanged(error));
        }
    }

    fn set_notice(&mut self, notice: Option<String>) {
        if self.notice != notice {
            self.notice = notice.clone();
            self.emit(SessionEvent::NoticeChanged(notice));
        }
    }

    fn set_offline(&mut self, offline: bool) {
        if self.offline_mode != offline {
            self.offline_mode = offline;
            self.emit(SessionEvent::OfflineChanged(offline));
        }
    }

    fn set_realtime_connected(&mut self, connected: bool) {
        if self.realtime_connected != connected {
            self.realtime_connected = connected;
            self.emit(SessionEvent::RealtimeChanged(connected));
        }
    }

    fn set_animating(&mut self, animating: bool) {
        let was = self.animating.swap(animating, Ordering::SeqCst);
        if was != animating {
            self.emit(SessionEvent::AnimatingChanged(animating));
        }
    }

    fn mark_backend_healthy(&mut self) {
        self.set_realtime_connected(true);
        self.set_offline(false);
        if self.notice.as_deref() == Some(NOTICE_CONNECTION_LOST) {
            self.set_notice(None);
        }
    }

    fn enter_offline_mode(&mut self) {
        if self.backend_enabled {
            self.backend_enabled = false;
            self.emit(SessionEvent::BackendEnabledChanged(false));
        }
        self.set_offline(true);
        self.set_realtime_connected(false);
        self.close_realtime();
    }

    fn fallback_to_default(&mut self, message: Option<&str>) -> Puzzle {
        let state = self.default_puzzle.clone();
        self.set_puzzle(state.clone(), false);
        self.set_offline(true);
        self.clear_solution_path();
        if let Some(message) = message {
            self.set_notice(Some(message.to_string()));
        }
        state
    }

    /// Shared failure handling for the thin authoritative-store proxies:
    /// transport failures flip to offline, everything else keeps the link
    /// alive, and the error is recorded for the UI either way.
    fn record_proxy_failure(&mut self, error: &BackendError, fallback_message: &str) {
        if error.is_transport() {
            self.enter_offline_mode();
        } else {
            self.ensure_realtime_connection();
        }
        let detail = error.to_string();
        let message = if detail.is_empty() {
            fallback_message.to_string()
        } else {
            detail
        };
        self.set_error(Some(message));
    }
}

impl Drop for PuzzleSession {
    fn drop(&mut self) {
        if let Some(task) = self.link_task.take() {
            task.abort();
        }
    }
}

fn format_elapsed_ms(elapsed_ms: Option<f64>) -> Option<String> {
    let ms = elapsed_ms?;
    if !ms.is_finite() || ms < 0.0 {
        return None;
    }
    if ms >= 1000.0 {
        let seconds = ms / 1000.0;
        let precision: usize = if seconds >= 10.0 { 0 } else { 1 };
        Some(format!("{seconds:.precision$} s"))
    } else {
        Some(format!("{} ms", ms.round() as i64))
    }
}
