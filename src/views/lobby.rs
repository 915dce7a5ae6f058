use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::models::PrivateLobby;
use crate::store::lobby::MIN_PLAYERS_TO_START;
use crate::store::{LobbyAction, Store};

/// How long a lobby error stays on screen
pub const ERROR_DISPLAY: Duration = Duration::from_secs(5);

/// Read-only presentation of the current private lobby for one user
#[derive(Debug, Clone, PartialEq)]
pub struct LobbyView<'a> {
    pub lobby: &'a PrivateLobby,
    pub user_id: &'a str,
}

impl<'a> LobbyView<'a> {
    pub fn new(lobby: &'a PrivateLobby, user_id: &'a str) -> Self {
        Self { lobby, user_id }
    }

    /// e.g. `2/8`
    pub fn capacity_label(&self) -> String {
        format!("{}/{}", self.lobby.participants.len(), self.lobby.max_capacity)
    }

    pub fn is_creator(&self) -> bool {
        self.lobby
            .participants
            .iter()
            .any(|p| p.id == self.user_id && p.is_creator)
    }

    pub fn can_start(&self) -> bool {
        self.is_creator() && self.lobby.participants.len() >= MIN_PLAYERS_TO_START
    }

    /// Remaining lifetime as `Xh Ym`, floored at zero
    pub fn expiry_label(&self, now: DateTime<Utc>) -> String {
        let remaining = (self.lobby.expires_at - now).num_minutes().max(0);
        format!("{}h {}m", remaining / 60, remaining % 60)
    }

    pub fn game_label(&self) -> &str {
        self.lobby.game_type.as_deref().unwrap_or("Any Game")
    }
}

/// Clear the lobby error after `after` unless it has changed in the meantime.
pub fn schedule_error_clear(store: &Store, after: Duration) -> JoinHandle<()> {
    let store = store.clone();
    tokio::spawn(async move {
        let shown = store.select(|s| s.lobby.error.clone()).await;
        if shown.is_none() {
            return;
        }
        tokio::time::sleep(after).await;
        let current = store.select(|s| s.lobby.error.clone()).await;
        if current == shown {
            store.dispatch(LobbyAction::ClearError).await;
        }
    })
}
