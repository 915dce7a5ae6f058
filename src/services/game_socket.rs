//! JSON-over-WebSocket channel for a single game session.
//!
//! Unlike the chat client there is no STOMP framing: every text message is a
//! JSON object tagged by `type`. The socket reconnects after a fixed delay
//! until it is disconnected explicitly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::RealtimeSettings;
use crate::core::game_session::{GameMove, GameStatePatch, Player};
use crate::services::realtime::{Connector, RealtimeError, Transport};
use crate::services::session::Session;

const EVENT_CHANNEL_CAPACITY: usize = 128;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameServerMessage {
    GameStateUpdate {
        #[serde(rename = "gameState")]
        game_state: GameStatePatch,
    },
    PlayerJoined {
        player: Player,
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    MoveReceived {
        #[serde(rename = "move")]
        game_move: GameMove,
    },
    GameEnded {
        #[serde(default)]
        result: Value,
    },
    Error {
        message: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameClientMessage {
    JoinGame {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    MakeMove {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "move")]
        game_move: Value,
    },
    LeaveGame {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameSocketEvent {
    Connected,
    Disconnected { reason: Option<String> },
    Message(GameServerMessage),
    Error(String),
}

#[derive(Debug)]
enum Command {
    Send(GameClientMessage),
    Disconnect,
}

/// Build the game endpoint URL carrying the token and session id
pub fn game_url(base: &str, token: Option<&str>, session_id: &str) -> String {
    format!(
        "{}?token={}&sessionId={}",
        base,
        urlencoding::encode(token.unwrap_or_default()),
        urlencoding::encode(session_id)
    )
}

pub struct GameSocket {
    session_id: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    connected: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl GameSocket {
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: Arc<dyn Connector>,
        session: Arc<Session>,
        settings: RealtimeSettings,
        session_id: impl Into<String>,
    ) -> (Self, mpsc::Receiver<GameSocketEvent>) {
        let session_id = session_id.into();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(socket_loop(
            connector,
            session,
            settings,
            session_id.clone(),
            cmd_rx,
            event_tx,
            Arc::clone(&connected),
        ));

        let socket = Self {
            session_id,
            cmd_tx,
            connected,
            task: Some(task),
        };
        (socket, event_rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn send_move(&self, game_move: Value) -> Result<(), RealtimeError> {
        self.send(GameClientMessage::MakeMove {
            session_id: self.session_id.clone(),
            game_move,
        })
    }

    pub fn leave_game(&self) -> Result<(), RealtimeError> {
        self.send(GameClientMessage::LeaveGame {
            session_id: self.session_id.clone(),
        })
    }

    /// Close the socket and stop reconnecting.
    pub async fn disconnect(&mut self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Game socket loop did not exit in time; aborting");
                task.abort();
            }
        }
        self.connected.store(false, Ordering::Release);
    }

    fn send(&self, message: GameClientMessage) -> Result<(), RealtimeError> {
        if !self.is_connected() {
            tracing::error!("Game WebSocket is not connected");
            return Err(RealtimeError::NotConnected);
        }
        self.cmd_tx
            .send(Command::Send(message))
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for GameSocket {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SocketEnd {
    Shutdown,
    Lost(String),
}

async fn write(transport: &mut dyn Transport, message: &GameClientMessage) -> Result<(), RealtimeError> {
    let text = serde_json::to_string(message).map_err(|e| RealtimeError::Transport(e.to_string()))?;
    tracing::debug!("Game >>> {}", text);
    transport.send(text).await
}

async fn socket_loop(
    connector: Arc<dyn Connector>,
    session: Arc<Session>,
    settings: RealtimeSettings,
    session_id: String,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<GameSocketEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        let token = session.token();
        let url = game_url(&settings.game_ws_url, token.as_deref(), &session_id);

        match connector.connect(&url).await {
            Ok(mut transport) => {
                let join = GameClientMessage::JoinGame {
                    session_id: session_id.clone(),
                };
                let end = match write(transport.as_mut(), &join).await {
                    Ok(()) => {
                        connected.store(true, Ordering::Release);
                        tracing::info!("Game WebSocket connected to session {}", session_id);
                        emit_event(&event_tx, GameSocketEvent::Connected).await;
                        run_socket(transport.as_mut(), &mut cmd_rx, &event_tx).await
                    }
                    Err(e) => SocketEnd::Lost(e.to_string()),
                };
                connected.store(false, Ordering::Release);

                match end {
                    SocketEnd::Shutdown => {
                        let _ = transport.close().await;
                        tracing::info!("Game WebSocket disconnected");
                        emit_disconnected(&event_tx, Some("client disconnected".to_string())).await;
                        return;
                    }
                    SocketEnd::Lost(reason) => {
                        tracing::warn!("Game WebSocket disconnected: {}", reason);
                        emit_disconnected(&event_tx, Some(reason)).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!("Game WebSocket error: {}", e);
                emit_event(&event_tx, GameSocketEvent::Error(e.to_string())).await;
            }
        }

        let delay = settings.game_reconnect_delay();
        tracing::info!("Reconnecting game socket in {:?}", delay);
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(Command::Disconnect) => {
                        emit_disconnected(&event_tx, Some("client disconnected".to_string())).await;
                        return;
                    }
                    Some(Command::Send(message)) => {
                        tracing::debug!("Dropping {:?} while reconnecting", message)
                    }
                },
            }
        }
    }
}

async fn run_socket(
    transport: &mut dyn Transport,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::Sender<GameSocketEvent>,
) -> SocketEnd {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None | Some(Command::Disconnect) => return SocketEnd::Shutdown,
                Some(Command::Send(message)) => {
                    if let Err(e) = write(transport, &message).await {
                        return SocketEnd::Lost(e.to_string());
                    }
                }
            },
            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => handle_text(&text, event_tx).await,
                Some(Err(e)) => return SocketEnd::Lost(e.to_string()),
                None => return SocketEnd::Lost("connection closed by server".to_string()),
            },
        }
    }
}

async fn handle_text(text: &str, event_tx: &mpsc::Sender<GameSocketEvent>) {
    tracing::debug!("Game <<< {}", text);
    match serde_json::from_str::<GameServerMessage>(text) {
        Ok(GameServerMessage::Unknown) => {
            tracing::warn!("Unknown game message type: {}", text);
        }
        Ok(message) => emit_event(event_tx, GameSocketEvent::Message(message)).await,
        Err(e) => tracing::warn!("Error parsing game message: {}", e),
    }
}

async fn emit_event(event_tx: &mpsc::Sender<GameSocketEvent>, event: GameSocketEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            tracing::warn!("Game event channel full, dropping {:?}", dropped);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("Game event channel closed, receiver dropped");
        }
    }
}

async fn emit_disconnected(event_tx: &mpsc::Sender<GameSocketEvent>, reason: Option<String>) {
    if event_tx.send(GameSocketEvent::Disconnected { reason }).await.is_err() {
        tracing::debug!("Game event channel closed, receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::game_session::GameStatus;
    use crate::models::AuthTokens;
    use crate::services::realtime::tests::MockConnector;
    use crate::services::storage::LocalStorage;
    use serde_json::json;

    fn session() -> Arc<Session> {
        let session = Session::new(LocalStorage::in_memory());
        session
            .store_tokens(&AuthTokens {
                token: "tok en".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_in: None,
                is_new_user: false,
            })
            .unwrap();
        Arc::new(session)
    }

    fn settings() -> RealtimeSettings {
        RealtimeSettings {
            game_ws_url: "ws://localhost:8080/ws/game".to_string(),
            game_reconnect_delay_ms: 10,
            ..RealtimeSettings::default()
        }
    }

    fn text(value: Value) -> Option<Result<String, RealtimeError>> {
        Some(Ok(value.to_string()))
    }

    async fn next_event(rx: &mut mpsc::Receiver<GameSocketEvent>) -> GameSocketEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[test]
    fn test_game_url_encodes_params() {
        assert_eq!(
            game_url("ws://h/ws/game", Some("a b"), "game_1"),
            "ws://h/ws/game?token=a%20b&sessionId=game_1"
        );
        assert_eq!(game_url("ws://h/ws/game", None, "g"), "ws://h/ws/game?token=&sessionId=g");
    }

    #[test]
    fn test_unknown_type_parses() {
        let message: GameServerMessage = serde_json::from_str(r#"{"type":"CHAT_PING","x":1}"#).unwrap();
        assert_eq!(message, GameServerMessage::Unknown);
    }

    #[tokio::test]
    async fn test_joins_on_connect() {
        let connector = MockConnector::new(vec![vec![]]);
        let (socket, mut events) = GameSocket::start(connector.clone(), session(), settings(), "game_1");

        assert_eq!(next_event(&mut events).await, GameSocketEvent::Connected);
        assert!(socket.is_connected());
        assert_eq!(connector.urls()[0], "ws://localhost:8080/ws/game?token=tok%20en&sessionId=game_1");

        let join: Value = serde_json::from_str(&connector.sent()[0]).unwrap();
        assert_eq!(join, json!({ "type": "JOIN_GAME", "sessionId": "game_1" }));
    }

    #[tokio::test]
    async fn test_server_messages_become_events() {
        let connector = MockConnector::new(vec![vec![
            text(json!({ "type": "GAME_STATE_UPDATE", "gameState": { "status": "active" } })),
            text(json!({ "type": "SOMETHING_NEW" })),
            text(json!({ "type": "PLAYER_LEFT", "playerId": "2" })),
        ]]);
        let (_socket, mut events) = GameSocket::start(connector, session(), settings(), "game_1");

        assert_eq!(next_event(&mut events).await, GameSocketEvent::Connected);
        match next_event(&mut events).await {
            GameSocketEvent::Message(GameServerMessage::GameStateUpdate { game_state }) => {
                assert_eq!(game_state.status, Some(GameStatus::Active));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            next_event(&mut events).await,
            GameSocketEvent::Message(GameServerMessage::PlayerLeft { player_id: "2".to_string() })
        );
    }

    #[tokio::test]
    async fn test_move_requires_connection() {
        let connector = MockConnector::new(vec![]);
        let (socket, _events) = GameSocket::start(connector, session(), settings(), "game_1");

        let err = socket.send_move(json!({ "type": "RACE_STARTED" })).unwrap_err();
        assert!(matches!(err, RealtimeError::NotConnected));
    }

    #[tokio::test]
    async fn test_send_move_and_reconnect() {
        let connector = MockConnector::new(vec![vec![], vec![]]);
        let (socket, mut events) = GameSocket::start(connector.clone(), session(), settings(), "game_1");
        assert_eq!(next_event(&mut events).await, GameSocketEvent::Connected);

        socket.send_move(json!({ "type": "CHESS_MOVE" })).unwrap();
        for _ in 0..100 {
            if connector.sent().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        connector.push(0, None);

        assert!(matches!(next_event(&mut events).await, GameSocketEvent::Disconnected { .. }));
        assert_eq!(next_event(&mut events).await, GameSocketEvent::Connected);

        let sent: Vec<Value> = connector
            .sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect();
        assert_eq!(sent[1]["type"], "MAKE_MOVE");
        assert_eq!(sent[1]["move"]["type"], "CHESS_MOVE");
        assert_eq!(sent[2]["type"], "JOIN_GAME");
    }

    #[tokio::test]
    async fn test_disconnect_stops_reconnecting() {
        let connector = MockConnector::new(vec![vec![]]);
        let (mut socket, mut events) = GameSocket::start(connector.clone(), session(), settings(), "game_1");
        assert_eq!(next_event(&mut events).await, GameSocketEvent::Connected);

        socket.disconnect().await;
        assert!(!socket.is_connected());
        assert!(matches!(next_event(&mut events).await, GameSocketEvent::Disconnected { .. }));
        assert_eq!(connector.urls().len(), 1);
    }
}
