//! Tests for the session state machine against in-memory collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_client::{
    Backend, BackendError, ConfigRecord, ConfigSummary, DeleteConfigResponse, PushChannel,
    PushMessage, PushStream, PuzzleSession, SaveConfigRequest, SessionConfig, SessionError,
    SessionEvent, SolveResponse, UpdateConfigRequest,
};
use parking_core::{Exit, Move, MoveError, MoveOutcome, Orientation, Puzzle, Vehicle, apply_move};
use tokio::sync::mpsc;

/// How the fake backend responds to every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Ok,
    Transport,
    Remote,
}

struct FakeBackend {
    puzzle: Mutex<Puzzle>,
    mode: Mutex<Mode>,
    solve_response: Mutex<Option<SolveResponse>>,
}

impl FakeBackend {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            puzzle: Mutex::new(Puzzle::default_layout()),
            mode: Mutex::new(mode),
            solve_response: Mutex::new(None),
        })
    }

    fn with_solve_response(mode: Mode, response: SolveResponse) -> Arc<Self> {
        let backend = Self::new(mode);
        *backend.solve_response.lock().unwrap() = Some(response);
        backend
    }

    fn gate(&self) -> Result<(), BackendError> {
        match *self.mode.lock().unwrap() {
            Mode::Ok => Ok(()),
            Mode::Transport => Err(BackendError::transport("connection refused")),
            Mode::Remote => Err(BackendError::remote("Another vehicle blocks the path.")),
        }
    }

    fn record(&self, id: i64, name: &str, state: Puzzle, active: bool) -> ConfigRecord {
        ConfigRecord {
            id,
            name: name.to_string(),
            state,
            active,
            created_at: chrono::Utc::now(),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_puzzle(&self) -> Result<Puzzle, BackendError> {
        self.gate()?;
        Ok(self.puzzle.lock().unwrap().clone())
    }

    async fn submit_move(&self, mv: &Move) -> Result<MoveOutcome, BackendError> {
        self.gate()?;
        let current = self.puzzle.lock().unwrap().clone();
        let outcome = apply_move(&current, mv).map_err(|error| BackendError::remote(error.to_string()))?;
        *self.puzzle.lock().unwrap() = outcome.state.clone();
        Ok(outcome)
    }

    async fn reset(&self) -> Result<Puzzle, BackendError> {
        self.gate()?;
        let state = Puzzle::default_layout();
        *self.puzzle.lock().unwrap() = state.clone();
        Ok(state)
    }

    async fn replace_puzzle(&self, state: &Puzzle) -> Result<MoveOutcome, BackendError> {
        self.gate()?;
        *self.puzzle.lock().unwrap() = state.clone();
        Ok(MoveOutcome {
            state: state.clone(),
            completed: state.is_solved(),
        })
    }

    async fn solve(&self) -> Result<SolveResponse, BackendError> {
        self.gate()?;
        Ok(self
            .solve_response
            .lock()
            .unwrap()
            .clone()
            .expect("test did not script a solve response"))
    }

    async fn save_config(&self, request: &SaveConfigRequest) -> Result<ConfigRecord, BackendError> {
        self.gate()?;
        Ok(self.record(1, &request.name, request.state.clone(), request.activate))
    }

    async fn update_config(
        &self,
        id: i64,
        request: &UpdateConfigRequest,
    ) -> Result<ConfigRecord, BackendError> {
        self.gate()?;
        let name = request.name.clone().unwrap_or_else(|| "unnamed".into());
        Ok(self.record(id, &name, request.state.clone(), request.activate.unwrap_or(false)))
    }

    async fn delete_config(&self, id: i64) -> Result<DeleteConfigResponse, BackendError> {
        self.gate()?;
        Ok(DeleteConfigResponse {
            removed_id: id,
            removed_name: "Starter Puzzle".into(),
            active: false,
            activated_name: None,
            state: None,
            completed: None,
        })
    }

    async fn list_configs(&self) -> Result<Vec<ConfigSummary>, BackendError> {
        self.gate()?;
        Ok(Vec::new())
    }

    async fn get_config(&self, id: i64) -> Result<ConfigRecord, BackendError> {
        self.gate()?;
        Ok(self.record(id, "Starter Puzzle", self.puzzle.lock().unwrap().clone(), true))
    }

    async fn activate_config(&self, id: i64) -> Result<ConfigRecord, BackendError> {
        self.gate()?;
        Ok(self.record(id, "Starter Puzzle", self.puzzle.lock().unwrap().clone(), true))
    }
}

/// Push channel fed by a test-owned mpsc sender. The first connect takes
/// the receiver; later attempts fail like a downed socket.
struct ChannelPush {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<PushMessage>>>,
}

impl ChannelPush {
    fn new() -> (Arc<Self>, mpsc::UnboundedSender<PushMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                receiver: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl PushChannel for ChannelPush {
    async fn connect(&self) -> Result<PushStream, BackendError> {
        match self.receiver.lock().unwrap().take() {
            Some(rx) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|message| (message, rx))
            })
            .boxed()),
            None => Err(BackendError::transport("connection refused")),
        }
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        frame_delay: Duration::ZERO,
        reconnect_delay: Duration::from_secs(30),
    }
}

fn session_with(backend: Arc<FakeBackend>) -> PuzzleSession {
    PuzzleSession::with_config(backend, None, fast_config())
}

/// A 6x6 board holding only the goal vehicle at the given column.
fn goal_only(col: i32) -> Puzzle {
    Puzzle {
        size: 6,
        exit: Exit { row: 2, col: 5 },
        vehicles: vec![Vehicle {
            id: "X".into(),
            row: 2,
            col,
            length: 2,
            orientation: Orientation::Horizontal,
            goal: true,
        }],
    }
}

#[tokio::test]
async fn transport_failure_on_load_falls_back_to_the_default() {
    let mut session = session_with(FakeBackend::new(Mode::Transport));

    let state = session.load_puzzle().await;

    assert_eq!(state, Puzzle::default_layout());
    assert_eq!(session.puzzle(), &Puzzle::default_layout());
    assert!(session.offline_mode());
    assert!(!session.backend_enabled());
    assert_eq!(
        session.notice(),
        Some("Backend unreachable. Showing default puzzle.")
    );
}

#[tokio::test]
async fn remote_failure_on_load_keeps_the_backend_enabled() {
    let mut session = session_with(FakeBackend::new(Mode::Remote));

    let state = session.load_puzzle().await;

    assert_eq!(state, Puzzle::default_layout());
    assert!(session.backend_enabled());
    assert!(session.offline_mode());
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn successful_move_marks_the_backend_healthy() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));

    let outcome = session.move_vehicle("B", 1).await.expect("legal move");

    assert!(!outcome.completed);
    assert_eq!(session.puzzle(), &outcome.state);
    assert!(session.realtime_connected());
    assert!(!session.offline_mode());
    assert_eq!(session.notice(), None);
}

#[tokio::test]
async fn transport_failure_on_move_replays_through_the_local_engine() {
    let mut session = session_with(FakeBackend::new(Mode::Transport));

    let outcome = session.move_vehicle("B", 1).await.expect("local fallback");

    assert_eq!(outcome.state.vehicle("B").unwrap().row, 1);
    assert!(!session.backend_enabled());
    assert!(session.offline_mode());
    assert_eq!(
        session.notice(),
        Some("Offline mode: using local puzzle logic.")
    );
}

#[tokio::test]
async fn disabled_backend_applies_moves_locally() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));
    session.set_backend_enabled(false).await;

    let outcome = session.move_vehicle("B", 1).await.expect("local move");

    assert_eq!(outcome.state.vehicle("B").unwrap().row, 1);
    assert_eq!(
        session.notice(),
        Some("Backend disabled: applying move locally.")
    );
}

#[tokio::test]
async fn illegal_local_move_propagates_and_leaves_state_untouched() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));
    session.set_backend_enabled(false).await;
    let before = session.puzzle().clone();

    let result = session.move_vehicle("Z", 1).await;

    assert_eq!(
        result,
        Err(SessionError::Move(MoveError::UnknownVehicle {
            id: "Z".into()
        }))
    );
    assert_eq!(session.puzzle(), &before);
}

#[tokio::test]
async fn remote_move_rejection_propagates_and_keeps_the_session_online() {
    let mut session = session_with(FakeBackend::new(Mode::Remote));
    let before = session.puzzle().clone();

    let result = session.move_vehicle("X", 4).await;

    assert!(matches!(result, Err(SessionError::Backend(_))));
    assert_eq!(session.puzzle(), &before);
    assert!(session.backend_enabled());
    assert!(session.last_error().is_some());
}

#[tokio::test]
async fn solve_path_plays_every_frame_once() {
    let path = vec![goal_only(2), goal_only(3), goal_only(4)];
    let response = SolveResponse {
        state: goal_only(4),
        completed: true,
        moves: 3,
        path: Some(path.clone()),
        elapsed_ms: Some(12.0),
    };
    let mut session = session_with(FakeBackend::with_solve_response(Mode::Ok, response));
    let mut events = session.subscribe();

    let final_state = session.solve_puzzle().await.expect("solver ran");

    assert_eq!(final_state, goal_only(4));
    assert!(session.completed());
    assert_eq!(session.solution_step(), 2);
    assert!(!session.solution_animating());
    assert_eq!(session.notice(), Some("Solved in 3 moves (12 ms)"));

    let mut puzzle_sets = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PuzzleChanged { puzzle, .. } = event {
            puzzle_sets.push(puzzle);
        }
    }
    assert_eq!(puzzle_sets, path);
}

#[tokio::test]
async fn solve_without_a_path_applies_the_final_state_directly() {
    let response = SolveResponse {
        state: goal_only(4),
        completed: true,
        moves: 7,
        path: None,
        elapsed_ms: None,
    };
    let mut session = session_with(FakeBackend::with_solve_response(Mode::Ok, response));

    let final_state = session.solve_puzzle().await.expect("solver ran");

    assert_eq!(final_state, goal_only(4));
    assert!(session.solution_path().is_empty());
    assert_eq!(session.notice(), Some("Solved in 7 moves"));
}

#[tokio::test]
async fn unsolved_final_state_reports_the_limit_notice() {
    let response = SolveResponse {
        state: goal_only(1),
        completed: false,
        moves: 0,
        path: None,
        elapsed_ms: Some(2500.0),
    };
    let mut session = session_with(FakeBackend::with_solve_response(Mode::Ok, response));

    session.solve_puzzle().await.expect("solver ran");

    assert_eq!(
        session.notice(),
        Some("Solver did not complete within the limit (ran 2.5 s).")
    );
}

#[tokio::test]
async fn seeking_clamps_into_the_path_and_halts_playback() {
    let path = vec![goal_only(2), goal_only(3), goal_only(4)];
    let response = SolveResponse {
        state: goal_only(4),
        completed: true,
        moves: 3,
        path: Some(path),
        elapsed_ms: None,
    };
    let mut session = session_with(FakeBackend::with_solve_response(Mode::Ok, response));
    session.solve_puzzle().await.expect("solver ran");

    session.show_solution_step(99);
    assert_eq!(session.solution_step(), 2);

    session.step_solution(-99);
    assert_eq!(session.solution_step(), 0);
    assert_eq!(session.puzzle(), &goal_only(2));

    session.step_solution(1);
    assert_eq!(session.solution_step(), 1);
    assert!(!session.solution_animating());
}

#[tokio::test]
async fn solve_when_disabled_only_posts_a_notice() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));
    session.set_backend_enabled(false).await;
    let before = session.puzzle().clone();

    let state = session.solve_puzzle().await.expect("no-op");

    assert_eq!(state, before);
    assert_eq!(session.notice(), Some("Backend disabled. Cannot run solver."));
}

#[tokio::test]
async fn disabling_the_backend_resets_to_the_default_layout() {
    let backend = FakeBackend::new(Mode::Ok);
    let mut session = session_with(Arc::clone(&backend));
    session.move_vehicle("B", 1).await.expect("legal move");
    assert_ne!(session.puzzle(), &Puzzle::default_layout());

    session.set_backend_enabled(false).await;

    assert_eq!(session.puzzle(), &Puzzle::default_layout());
    assert!(!session.realtime_connected());
    assert_eq!(
        session.notice(),
        Some("Backend disabled. Showing default puzzle.")
    );

    session.set_backend_enabled(true).await;
    assert!(session.backend_enabled());
    assert!(!session.offline_mode());
}

#[tokio::test]
async fn saving_an_active_configuration_adopts_its_layout() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));
    let layout = goal_only(1);

    let record = session
        .save_puzzle_configuration(SaveConfigRequest {
            name: "Corner case".into(),
            state: layout.clone(),
            activate: true,
        })
        .await
        .expect("saved");

    assert!(record.active);
    assert_eq!(session.puzzle(), &layout);
    assert_eq!(session.notice(), Some("Activated puzzle \"Corner case\""));
}

#[tokio::test]
async fn config_crud_rethrows_after_recording_the_error() {
    let mut session = session_with(FakeBackend::new(Mode::Transport));

    let result = session.fetch_puzzle_configurations().await;

    assert!(matches!(result, Err(SessionError::Backend(_))));
    assert!(!session.backend_enabled());
    assert!(session.offline_mode());
}

#[tokio::test]
async fn disabled_backend_rejects_config_operations() {
    let mut session = session_with(FakeBackend::new(Mode::Ok));
    session.set_backend_enabled(false).await;

    let result = session.fetch_puzzle_configurations().await;

    assert_eq!(
        result,
        Err(SessionError::BackendDisabled {
            action: "load puzzle configurations"
        })
    );
}

#[tokio::test]
async fn realtime_pushes_overwrite_local_state_last_writer_wins() {
    let (push, tx) = ChannelPush::new();
    let push: Arc<dyn PushChannel> = push;
    let mut session = PuzzleSession::with_config(FakeBackend::new(Mode::Ok), Some(push), fast_config());

    session.load_puzzle().await;

    let pushed = goal_only(3);
    tx.send(PushMessage::State {
        state: pushed.clone(),
        completed: false,
    })
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.pump_realtime();

    assert_eq!(session.puzzle(), &pushed);
    assert!(session.realtime_connected());
}

#[tokio::test]
async fn closing_the_push_stream_posts_the_connection_lost_notice() {
    let (push, tx) = ChannelPush::new();
    let push: Arc<dyn PushChannel> = push;
    let mut session = PuzzleSession::with_config(FakeBackend::new(Mode::Ok), Some(push), fast_config());

    session.load_puzzle().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    drop(tx);
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.pump_realtime();

    assert!(!session.realtime_connected());
    assert_eq!(session.notice(), Some("Connection lost. Retrying…"));
}
