use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use thiserror::Error;

use super::{Phase, RejectMessage, Store};
use crate::core::{generate_invite_code, lobby_capacity, normalize_invite_code};
use crate::models::{LobbyParticipant, PrivateLobby, StartGameResponse};

pub const LOBBY_TTL_HOURS: i64 = 24;
pub const MIN_PLAYERS_TO_START: usize = 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LobbyError {
    #[error("This invite code has expired")]
    Expired,

    #[error("This lobby is full")]
    Full,

    #[error("Invalid invite code")]
    NotFound,

    #[error("No active lobby")]
    NoActiveLobby,

    #[error("Need at least 2 players to start a game")]
    NotEnoughPlayers,

    #[error("{0}")]
    Backend(String),
}

impl RejectMessage for LobbyError {
    fn reject_message(&self) -> String {
        self.to_string()
    }
}

/// Lobby service; only a simulated implementation exists so far
#[async_trait]
pub trait LobbyBackend: Send + Sync {
    async fn create(&self, game_type: Option<&str>) -> Result<PrivateLobby, LobbyError>;

    async fn join(&self, invite_code: &str) -> Result<PrivateLobby, LobbyError>;

    async fn leave(&self, lobby_id: &str) -> Result<(), LobbyError>;

    async fn start_game(&self, lobby: &PrivateLobby) -> Result<StartGameResponse, LobbyError>;
}

/// In-process lobby simulation
///
/// The invite codes `EXPIRE`, `FULL` and `NOTFND` reject with the matching
/// error; any other code joins a two-player lobby owned by someone else.
#[derive(Debug, Clone)]
pub struct MockLobbyBackend {
    latency: Duration,
}

impl MockLobbyBackend {
    pub const CURRENT_USER_ID: &'static str = "current-user-id";

    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn current_user(is_creator: bool) -> LobbyParticipant {
        LobbyParticipant {
            id: Self::CURRENT_USER_ID.to_string(),
            display_name: "TestUser".to_string(),
            avatar_id: "cyber-warrior-01".to_string(),
            is_creator,
        }
    }
}

impl Default for MockLobbyBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl LobbyBackend for MockLobbyBackend {
    async fn create(&self, game_type: Option<&str>) -> Result<PrivateLobby, LobbyError> {
        tokio::time::sleep(self.latency).await;
        let now = Utc::now();

        Ok(PrivateLobby {
            id: format!("lobby_{}", now.timestamp_millis()),
            invite_code: generate_invite_code(),
            creator_id: Self::CURRENT_USER_ID.to_string(),
            participants: vec![Self::current_user(true)],
            max_capacity: lobby_capacity(game_type),
            game_type: game_type.map(str::to_string),
            created_at: now,
            expires_at: now + ChronoDuration::hours(LOBBY_TTL_HOURS),
            is_active: true,
        })
    }

    async fn join(&self, invite_code: &str) -> Result<PrivateLobby, LobbyError> {
        tokio::time::sleep(self.latency).await;
        match invite_code {
            "EXPIRE" => return Err(LobbyError::Expired),
            "FULL" => return Err(LobbyError::Full),
            "NOTFND" => return Err(LobbyError::NotFound),
            _ => {}
        }

        let now = Utc::now();
        Ok(PrivateLobby {
            id: format!("lobby_{}", now.timestamp_millis()),
            invite_code: invite_code.to_string(),
            creator_id: "other-user-id".to_string(),
            participants: vec![
                LobbyParticipant {
                    id: "other-user-id".to_string(),
                    display_name: "LobbyCreator".to_string(),
                    avatar_id: "cyber-warrior-02".to_string(),
                    is_creator: true,
                },
                Self::current_user(false),
            ],
            max_capacity: lobby_capacity(None),
            game_type: None,
            created_at: now - ChronoDuration::minutes(5),
            expires_at: now + ChronoDuration::hours(23),
            is_active: true,
        })
    }

    async fn leave(&self, lobby_id: &str) -> Result<(), LobbyError> {
        tokio::time::sleep(self.latency / 2).await;
        tracing::debug!("Left lobby {}", lobby_id);
        Ok(())
    }

    async fn start_game(&self, lobby: &PrivateLobby) -> Result<StartGameResponse, LobbyError> {
        tokio::time::sleep(self.latency).await;
        Ok(StartGameResponse {
            game_session_id: format!("game_{}", Utc::now().timestamp_millis()),
            lobby_id: lobby.id.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LobbyState {
    pub current_lobby: Option<PrivateLobby>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub join_loading: bool,
    pub create_loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LobbyAction {
    CreateLobby(Phase<PrivateLobby>),
    JoinLobby(Phase<PrivateLobby>),
    LeaveLobby(Phase<()>),
    StartGame(Phase<StartGameResponse>),
    ClearError,
    ClearLobby,
    UpdateParticipants(Vec<LobbyParticipant>),
}

impl LobbyState {
    pub fn reduce(&mut self, action: LobbyAction) {
        match action {
            LobbyAction::CreateLobby(phase) => match phase {
                Phase::Pending => {
                    self.create_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(lobby) => {
                    self.create_loading = false;
                    self.current_lobby = Some(lobby);
                }
                Phase::Rejected(message) => {
                    self.create_loading = false;
                    self.error = Some(message);
                }
            },
            LobbyAction::JoinLobby(phase) => match phase {
                Phase::Pending => {
                    self.join_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(lobby) => {
                    self.join_loading = false;
                    self.current_lobby = Some(lobby);
                }
                Phase::Rejected(message) => {
                    self.join_loading = false;
                    self.error = Some(message);
                }
            },
            LobbyAction::LeaveLobby(Phase::Fulfilled(())) | LobbyAction::ClearLobby => {
                self.current_lobby = None;
                self.error = None;
            }
            LobbyAction::LeaveLobby(_) => {}
            // The lobby stays up while the game runs
            LobbyAction::StartGame(phase) => match phase {
                Phase::Pending => {
                    self.is_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(_) => self.is_loading = false,
                Phase::Rejected(message) => {
                    self.is_loading = false;
                    self.error = Some(message);
                }
            },
            LobbyAction::ClearError => self.error = None,
            LobbyAction::UpdateParticipants(participants) => {
                if let Some(lobby) = self.current_lobby.as_mut() {
                    lobby.participants = participants;
                }
            }
        }
    }
}

impl Store {
    pub async fn create_private_lobby(&self, game_type: Option<&str>) -> Result<PrivateLobby, LobbyError> {
        let lobby = self
            .track(LobbyAction::CreateLobby, self.lobby_backend.create(game_type))
            .await?;
        tracing::info!("Created lobby {} with code {}", lobby.id, lobby.invite_code);
        Ok(lobby)
    }

    /// Join by invite code; input is trimmed and uppercased first.
    pub async fn join_lobby_by_code(&self, invite_code: &str) -> Result<PrivateLobby, LobbyError> {
        let code = normalize_invite_code(invite_code);
        self.track(LobbyAction::JoinLobby, self.lobby_backend.join(&code))
            .await
    }

    pub async fn leave_lobby(&self) -> Result<(), LobbyError> {
        let lobby_id = self
            .select(|s| s.lobby.current_lobby.as_ref().map(|l| l.id.clone()))
            .await;

        self.track(LobbyAction::LeaveLobby, async {
            if let Some(lobby_id) = lobby_id {
                self.lobby_backend.leave(&lobby_id).await?;
            }
            Ok(())
        })
        .await
    }

    pub async fn start_game(&self) -> Result<StartGameResponse, LobbyError> {
        let lobby = self.select(|s| s.lobby.current_lobby.clone()).await;

        self.track(LobbyAction::StartGame, async {
            let lobby = lobby.ok_or(LobbyError::NoActiveLobby)?;
            if lobby.participants.len() < MIN_PLAYERS_TO_START {
                return Err(LobbyError::NotEnoughPlayers);
            }
            self.lobby_backend.start_game(&lobby).await
        })
        .await
    }
}
