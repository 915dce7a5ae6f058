//! Routes a game session to the screen that can play it.
//!
//! The shell owns the shared [`GameState`], folds server messages into it,
//! and re-syncs the active game view after every change. Moves produced by a
//! view are recorded locally and forwarded over the [`GameSocket`].

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::chess::format_clock;
use crate::core::racing::car_id;
use crate::core::{ChessState, GameMove, GameState, GameStatus, GameType, NewMove, RaceStatus, RacingState};
use crate::services::{GameServerMessage, GameSocket, RealtimeError};

#[derive(Debug, Error)]
pub enum GameShellError {
    #[error("Failed to encode move: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Socket(#[from] RealtimeError),
}

/// A playable game screen
pub trait GameView {
    /// Pull this game's slice of `gameData` into the local model
    fn sync(&mut self, state: &GameState) -> Result<(), serde_json::Error>;

    fn status_line(&self) -> String;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChessView {
    pub chess: ChessState,
}

impl GameView for ChessView {
    fn sync(&mut self, state: &GameState) -> Result<(), serde_json::Error> {
        match state.game_data.get("chess") {
            Some(remote) => self.chess.sync_from(remote),
            None => Ok(()),
        }
    }

    fn status_line(&self) -> String {
        self.chess.status_message().unwrap_or_else(|| {
            format!(
                "{} to move ({} / {})",
                self.chess.current_player.name(),
                format_clock(self.chess.time_remaining.white),
                format_clock(self.chess.time_remaining.black)
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RacingView {
    pub racing: RacingState,
    /// Car driven by the local player
    pub car_id: String,
}

impl RacingView {
    pub fn new(local_player: &str) -> Self {
        Self {
            racing: RacingState::default(),
            car_id: car_id(local_player),
        }
    }
}

impl GameView for RacingView {
    fn sync(&mut self, state: &GameState) -> Result<(), serde_json::Error> {
        match state.game_data.get("racing") {
            Some(remote) => self.racing.sync_from(remote),
            None => {
                // Re-grid while nobody has started driving
                let waiting = self.racing.race_status == RaceStatus::Waiting;
                if waiting && self.racing.cars.len() != state.players.len() {
                    self.racing = RacingState::for_players(&state.players);
                }
                Ok(())
            }
        }
    }

    fn status_line(&self) -> String {
        match self.racing.race_status {
            RaceStatus::Waiting => "Waiting for racers".to_string(),
            RaceStatus::Countdown => format!("Starting in {}", self.racing.countdown),
            RaceStatus::Racing => {
                let lap = self.racing.car(&self.car_id).map(|c| c.lap).unwrap_or(0);
                format!("Lap {}/{}", (lap + 1).min(self.racing.max_laps), self.racing.max_laps)
            }
            RaceStatus::Finished => match &self.racing.winner {
                Some(winner) => format!("{} wins!", winner),
                None => "Race finished".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameScreen {
    Chess(ChessView),
    Racing(RacingView),
    /// Game type without a client screen yet
    Unsupported(String),
}

impl GameScreen {
    pub fn for_game(game_type: &str, local_player: &str) -> Self {
        match GameType::from_wire(game_type) {
            Some(GameType::Chess) => GameScreen::Chess(ChessView::default()),
            Some(GameType::CarRacing) => GameScreen::Racing(RacingView::new(local_player)),
            _ => GameScreen::Unsupported(game_type.to_string()),
        }
    }

    pub fn view_mut(&mut self) -> Option<&mut dyn GameView> {
        match self {
            GameScreen::Chess(view) => Some(view),
            GameScreen::Racing(view) => Some(view),
            GameScreen::Unsupported(_) => None,
        }
    }

    pub fn status_line(&self) -> String {
        match self {
            GameScreen::Chess(view) => view.status_line(),
            GameScreen::Racing(view) => view.status_line(),
            GameScreen::Unsupported(game_type) => format!("Unknown game type: {}", game_type),
        }
    }
}

pub struct GameShell {
    state: GameState,
    screen: GameScreen,
    local_player: String,
    error: Option<String>,
}

impl GameShell {
    pub fn new(session_id: &str, game_type: &str, local_player: &str) -> Self {
        let state = GameState::new(session_id, game_type);
        let mut shell = Self {
            screen: GameScreen::for_game(game_type, local_player),
            state,
            local_player: local_player.to_string(),
            error: None,
        };
        shell.resync();
        shell
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn screen(&self) -> &GameScreen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut GameScreen {
        &mut self.screen
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Still waiting for the server to start the session
    pub fn is_loading(&self) -> bool {
        self.state.status == GameStatus::Waiting
    }

    pub fn handle(&mut self, message: GameServerMessage) {
        match message {
            GameServerMessage::GameStateUpdate { game_state } => self.state.apply(game_state),
            GameServerMessage::PlayerJoined { player } => self.state.add_player(player),
            GameServerMessage::PlayerLeft { player_id } => self.state.remove_player(&player_id),
            GameServerMessage::MoveReceived { game_move } => self.state.push_move(game_move),
            GameServerMessage::GameEnded { result } => {
                tracing::info!("Game {} ended: {}", self.state.session_id, result);
                self.state.status = GameStatus::Finished;
            }
            GameServerMessage::Error { message } => {
                tracing::warn!("Game server error: {}", message);
                self.error = Some(message);
            }
            GameServerMessage::Unknown => {
                tracing::debug!("Ignoring unknown game message");
                return;
            }
        }
        self.resync();
    }

    fn resync(&mut self) {
        if let Some(view) = self.screen.view_mut() {
            if let Err(e) = view.sync(&self.state) {
                tracing::warn!("Discarding unreadable game data: {}", e);
            }
        }
    }

    /// Record a move made locally, typed by its `type` field.
    pub fn record_move(&mut self, move_data: Value) -> GameMove {
        let move_type = move_data
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        self.state.add_move(NewMove {
            player_id: self.local_player.clone(),
            move_type,
            move_data,
        })
    }

    /// Send a view-produced move to the server and record it locally.
    pub fn play(&mut self, action: &impl Serialize, socket: &GameSocket) -> Result<GameMove, GameShellError> {
        let move_data = serde_json::to_value(action)?;
        socket.send_move(move_data.clone())?;
        Ok(self.record_move(move_data))
    }
}
