//! Client state containers.
//!
//! Each slice owns a state struct, an action enum and a pure `reduce`. Async
//! operations live on [`Store`] and dispatch a pending action, then a
//! fulfilled or rejected one, so views only ever read settled state.

pub mod auth;
pub mod compatibility;
pub mod gamecoin;
pub mod lobby;
pub mod matchmaking;
pub mod profile;
pub mod room;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::services::{ApiClient, ApiError, CatalogCache, RealtimeEvent, Session, SessionEvent};

pub use auth::{AuthAction, AuthState};
pub use compatibility::{CompatibilityAction, CompatibilityState, MockRecommendations, RecommendationSource};
pub use gamecoin::{GameCoinAction, GameCoinState};
pub use lobby::{LobbyAction, LobbyBackend, LobbyError, LobbyState, MockLobbyBackend};
pub use matchmaking::{MatchmakingAction, MatchmakingState, QueueStatus};
pub use profile::{ProfileAction, ProfileState};
pub use room::{RoomAction, RoomState};

/// Lifecycle of one async operation
#[derive(Debug, Clone, PartialEq)]
pub enum Phase<T> {
    Pending,
    Fulfilled(T),
    Rejected(String),
}

/// Errors that can reject an async operation
pub trait RejectMessage {
    /// Text stored in the slice's `error` field
    fn reject_message(&self) -> String;
}

impl RejectMessage for ApiError {
    fn reject_message(&self) -> String {
        self.message()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    pub auth: AuthState,
    pub profile: ProfileState,
    pub room: RoomState,
    pub gamecoin: GameCoinState,
    pub compatibility: CompatibilityState,
    pub lobby: LobbyState,
    pub matchmaking: MatchmakingState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Auth(AuthAction),
    Profile(ProfileAction),
    Room(RoomAction),
    GameCoin(GameCoinAction),
    Compatibility(CompatibilityAction),
    Lobby(LobbyAction),
    Matchmaking(MatchmakingAction),
}

macro_rules! slice_action {
    ($($variant:ident($action:ty)),* $(,)?) => {
        $(
            impl From<$action> for Action {
                fn from(action: $action) -> Self {
                    Action::$variant(action)
                }
            }
        )*
    };
}

slice_action!(
    Auth(AuthAction),
    Profile(ProfileAction),
    Room(RoomAction),
    GameCoin(GameCoinAction),
    Compatibility(CompatibilityAction),
    Lobby(LobbyAction),
    Matchmaking(MatchmakingAction),
);

impl RootState {
    pub fn reduce(&mut self, action: Action) {
        match action {
            Action::Auth(a) => self.auth.reduce(a),
            Action::Profile(a) => self.profile.reduce(a),
            Action::Room(a) => self.room.reduce(a),
            Action::GameCoin(a) => self.gamecoin.reduce(a),
            Action::Compatibility(a) => self.compatibility.reduce(a),
            Action::Lobby(a) => self.lobby.reduce(a),
            Action::Matchmaking(a) => self.matchmaking.reduce(a),
        }
    }
}

/// Shared handle to the client state and the services that feed it
#[derive(Clone)]
pub struct Store {
    state: Arc<RwLock<RootState>>,
    api: Arc<ApiClient>,
    catalogs: CatalogCache,
    lobby_backend: Arc<dyn LobbyBackend>,
    recommendations: Arc<dyn RecommendationSource>,
}

impl Store {
    pub fn new(api: Arc<ApiClient>, catalogs: CatalogCache) -> Self {
        let state = RootState {
            auth: AuthState::restored(api.session().is_authenticated()),
            ..RootState::default()
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            api,
            catalogs,
            lobby_backend: Arc::new(MockLobbyBackend::default()),
            recommendations: Arc::new(MockRecommendations::default()),
        }
    }

    pub fn with_lobby_backend(mut self, backend: Arc<dyn LobbyBackend>) -> Self {
        self.lobby_backend = backend;
        self
    }

    pub fn with_recommendations(mut self, source: Arc<dyn RecommendationSource>) -> Self {
        self.recommendations = source;
        self
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn session(&self) -> &Arc<Session> {
        self.api.session()
    }

    pub fn catalogs(&self) -> &CatalogCache {
        &self.catalogs
    }

    pub async fn dispatch(&self, action: impl Into<Action>) {
        let action = action.into();
        tracing::trace!("dispatch {:?}", action);
        self.state.write().await.reduce(action);
    }

    /// Clone of the whole state tree
    pub async fn snapshot(&self) -> RootState {
        self.state.read().await.clone()
    }

    pub async fn select<R>(&self, f: impl FnOnce(&RootState) -> R) -> R {
        f(&*self.state.read().await)
    }

    /// Run `op`, dispatching pending before and fulfilled or rejected after.
    async fn track<T, E, A, Fut>(&self, wrap: fn(Phase<T>) -> A, op: Fut) -> Result<T, E>
    where
        T: Clone,
        E: RejectMessage,
        A: Into<Action>,
        Fut: Future<Output = Result<T, E>>,
    {
        self.dispatch(wrap(Phase::Pending)).await;
        match op.await {
            Ok(value) => {
                self.dispatch(wrap(Phase::Fulfilled(value.clone()))).await;
                Ok(value)
            }
            Err(e) => {
                self.dispatch(wrap(Phase::Rejected(e.reject_message()))).await;
                Err(e)
            }
        }
    }

    /// Drive the auth slice to logged-out whenever the session is cleared,
    /// whether by a failed refresh, an explicit logout, or another tab.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut events = self.session().subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut) => {
                        store.dispatch(AuthAction::LoggedOut).await;
                    }
                    Ok(SessionEvent::LoggedOutElsewhere) => {
                        tracing::info!("Logged out in another tab");
                        store.dispatch(AuthAction::LoggedOut).await;
                    }
                    Ok(SessionEvent::TokensUpdated) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Session watcher lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Feed realtime client events into the room and matchmaking slices
    /// until the client stops.
    pub fn follow_realtime(&self, mut events: mpsc::Receiver<RealtimeEvent>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                for action in realtime_actions(event) {
                    store.dispatch(action).await;
                }
            }
        })
    }
}

fn realtime_actions(event: RealtimeEvent) -> Vec<Action> {
    match event {
        RealtimeEvent::QueueUpdate(_) | RealtimeEvent::MatchFound(_) | RealtimeEvent::QueueTimeout(_) => {
            MatchmakingAction::from_realtime(event)
                .into_iter()
                .map(Action::from)
                .collect()
        }
        other => RoomAction::from_realtime(other).map(Action::from).into_iter().collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{ApiSettings, CacheSettings};
    use crate::models::AuthTokens;
    use crate::services::LocalStorage;

    /// Store against a backend URL that is never reachable
    pub(crate) fn offline_store() -> Store {
        store_for("http://127.0.0.1:9")
    }

    pub(crate) fn store_for(base_url: &str) -> Store {
        let session = Arc::new(Session::new(LocalStorage::in_memory()));
        let settings = ApiSettings {
            base_url: base_url.to_string(),
            timeout_secs: 2,
        };
        let api = Arc::new(ApiClient::new(&settings, session).unwrap());
        Store::new(api, CatalogCache::new(&CacheSettings::default()))
    }

    #[tokio::test]
    async fn test_starts_logged_out_without_token() {
        let store = offline_store();
        assert!(!store.select(|s| s.auth.is_authenticated).await);
    }

    #[tokio::test]
    async fn test_session_clear_logs_out() {
        let store = offline_store();
        let watcher = store.watch_session();
        store
            .dispatch(AuthAction::VerifyOtp(Phase::Fulfilled(AuthTokens {
                token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_in: None,
                is_new_user: false,
            })))
            .await;
        assert!(store.select(|s| s.auth.is_authenticated).await);

        store.session().clear().unwrap();
        for _ in 0..50 {
            if !store.select(|s| s.auth.is_authenticated).await {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!store.select(|s| s.auth.is_authenticated).await);
        watcher.abort();
    }
}
