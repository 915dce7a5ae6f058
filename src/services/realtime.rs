use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

use crate::config::RealtimeSettings;
use crate::models::{ChatMessage, MatchDetails, MatchResult, QueueStatusResponse, QueueTimeout, RoomParticipant};
use crate::services::session::Session;
use crate::services::stomp::{self, Frame, StompError};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that can occur on the real-time channels
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("WebSocket not connected")]
    NotConnected,

    #[error("No room joined")]
    NoRoom,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("STOMP error: {0}")]
    Stomp(#[from] StompError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Connection handshake timed out")]
    HandshakeTimeout,
}

/// A bidirectional text channel, typically one WebSocket connection
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: String) -> Result<(), RealtimeError>;

    /// `None` once the peer closed the connection
    async fn recv(&mut self) -> Option<Result<String, RealtimeError>>;

    async fn close(&mut self) -> Result<(), RealtimeError>;
}

/// Opens transports; called again for every reconnect attempt
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError>;
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
        self.stream
            .send(Message::Text(message))
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(String::from_utf8(bytes).map_err(|_| {
                        RealtimeError::Transport("binary frame is not valid UTF-8".to_string())
                    }))
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(RealtimeError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }
}

/// Connects over plain or TLS WebSockets
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))?;
        tracing::debug!("WebSocket connected to {}", url);
        Ok(Box::new(WsTransport { stream }))
    }
}

/// STOMP destinations for chat rooms
pub struct RoomTopics;

impl RoomTopics {
    pub fn messages(room_id: &str) -> String {
        format!("/topic/room/{}/messages", room_id)
    }

    pub fn participants(room_id: &str) -> String {
        format!("/topic/room/{}/participants", room_id)
    }

    pub fn app(room_id: &str, action: &str) -> String {
        format!("/app/room/{}/{}", room_id, action)
    }
}

/// Per-user STOMP destinations for matchmaking pushes
pub struct MatchmakingTopics;

impl MatchmakingTopics {
    const PREFIX: &'static str = "/queue/matchmaking/user/";

    pub fn status(user_id: &str) -> String {
        format!("{}{}/status", Self::PREFIX, user_id)
    }

    pub fn match_found(user_id: &str) -> String {
        format!("{}{}/match-found", Self::PREFIX, user_id)
    }

    pub fn timeout(user_id: &str) -> String {
        format!("{}{}/timeout", Self::PREFIX, user_id)
    }

    fn all(user_id: &str) -> [String; 3] {
        [Self::status(user_id), Self::match_found(user_id), Self::timeout(user_id)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Connected,
    Disconnected { reason: Option<String> },
    ChatMessage(ChatMessage),
    Participants(Vec<RoomParticipant>),
    /// Queue position and wait estimate for the watched user
    QueueUpdate(QueueStatusResponse),
    /// Opponents exclude the watched user
    MatchFound(MatchDetails),
    QueueTimeout(QueueTimeout),
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Reconnect attempts exhausted; the client stays disconnected
    GaveUp,
    Error(String),
}

#[derive(Debug)]
enum Command {
    JoinRoom(String),
    LeaveRoom,
    SendMessage(String),
    Heartbeat,
    WatchMatchmaking(String),
    UnwatchMatchmaking,
    Disconnect,
}

struct ClientState {
    connected: AtomicBool,
    /// Room the client wants to be in; resubscribed after a reconnect
    room_id: Mutex<Option<String>>,
    /// User whose matchmaking queue is followed, also restored on reconnect
    matchmaking_user: Mutex<Option<String>>,
}

/// Chat room client speaking STOMP over WebSocket
///
/// Created via [`RealtimeClient::start`], which spawns the connection loop
/// and returns this handle together with an event receiver. The client holds
/// at most one room subscription at a time.
pub struct RealtimeClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Arc<ClientState>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl RealtimeClient {
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        connector: Arc<dyn Connector>,
        session: Arc<Session>,
        settings: RealtimeSettings,
    ) -> (Self, mpsc::Receiver<RealtimeEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let state = Arc::new(ClientState {
            connected: AtomicBool::new(false),
            room_id: Mutex::new(None),
            matchmaking_user: Mutex::new(None),
        });

        let task = tokio::spawn(connection_loop(
            connector,
            session,
            settings,
            cmd_rx,
            event_tx,
            Arc::clone(&state),
        ));

        let client = Self {
            cmd_tx,
            state,
            task: Some(task),
        };

        (client, event_rx)
    }

    /// Join a room, leaving the current one first.
    pub async fn join_room(&self, room_id: &str) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        *self.state.room_id.lock().await = Some(room_id.to_string());
        self.send(Command::JoinRoom(room_id.to_string()))
    }

    pub async fn leave_room(&self) -> Result<(), RealtimeError> {
        let had_room = self.state.room_id.lock().await.take().is_some();
        if !had_room || !self.is_connected() {
            return Ok(());
        }
        self.send(Command::LeaveRoom)
    }

    pub async fn send_message(&self, content: &str) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        if self.state.room_id.lock().await.is_none() {
            tracing::error!("Cannot send message: no room joined");
            return Err(RealtimeError::NoRoom);
        }
        self.send(Command::SendMessage(content.to_string()))
    }

    /// Presence heartbeat for the current room; no-op outside a room.
    pub async fn send_heartbeat(&self) -> Result<(), RealtimeError> {
        if !self.is_connected() || self.state.room_id.lock().await.is_none() {
            return Ok(());
        }
        self.send(Command::Heartbeat)
    }

    /// Follow queue updates and match announcements for `user_id`.
    pub async fn watch_matchmaking(&self, user_id: &str) -> Result<(), RealtimeError> {
        self.ensure_connected()?;
        *self.state.matchmaking_user.lock().await = Some(user_id.to_string());
        self.send(Command::WatchMatchmaking(user_id.to_string()))
    }

    pub async fn unwatch_matchmaking(&self) -> Result<(), RealtimeError> {
        let watching = self.state.matchmaking_user.lock().await.take().is_some();
        if !watching || !self.is_connected() {
            return Ok(());
        }
        self.send(Command::UnwatchMatchmaking)
    }

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&mut self) {
        *self.state.room_id.lock().await = None;
        *self.state.matchmaking_user.lock().await = None;
        let _ = self.cmd_tx.send(Command::Disconnect);

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Realtime loop did not exit in time; aborting");
                task.abort();
            }
        }

        self.state.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    pub async fn current_room_id(&self) -> Option<String> {
        self.state.room_id.lock().await.clone()
    }

    fn ensure_connected(&self) -> Result<(), RealtimeError> {
        if self.is_connected() {
            Ok(())
        } else {
            tracing::error!("WebSocket not connected");
            Err(RealtimeError::NotConnected)
        }
    }

    fn send(&self, command: Command) -> Result<(), RealtimeError> {
        self.cmd_tx
            .send(command)
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

struct ActiveRoom {
    id: String,
    subscriptions: [String; 2],
}

struct MatchmakingWatch {
    user_id: String,
    subscriptions: [String; 3],
}

struct StompSession {
    transport: Box<dyn Transport>,
    next_subscription: u64,
    active: Option<ActiveRoom>,
    matchmaking: Option<MatchmakingWatch>,
    send_every: Option<Duration>,
    expect_every: Option<Duration>,
}

impl StompSession {
    async fn write(&mut self, frame: Frame) -> Result<(), RealtimeError> {
        tracing::debug!("STOMP >>> {}", frame.command);
        self.transport.send(frame.encode()).await
    }

    async fn publish(&mut self, destination: String, body: serde_json::Value) -> Result<(), RealtimeError> {
        let frame = stomp::send(&destination, &body)?;
        self.write(frame).await
    }

    fn subscription_id(&mut self) -> String {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        id
    }

    async fn join(&mut self, room_id: &str) -> Result<(), RealtimeError> {
        if self.active.is_some() {
            self.leave().await?;
        }

        let messages = self.subscription_id();
        let participants = self.subscription_id();
        self.write(stomp::subscribe(&messages, &RoomTopics::messages(room_id))).await?;
        self.write(stomp::subscribe(&participants, &RoomTopics::participants(room_id))).await?;
        self.publish(RoomTopics::app(room_id, "join"), json!({})).await?;

        self.active = Some(ActiveRoom {
            id: room_id.to_string(),
            subscriptions: [messages, participants],
        });
        tracing::info!("Joined room: {}", room_id);
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), RealtimeError> {
        let Some(room) = self.active.take() else {
            return Ok(());
        };

        self.publish(RoomTopics::app(&room.id, "leave"), json!({})).await?;
        for id in &room.subscriptions {
            self.write(stomp::unsubscribe(id)).await?;
        }
        tracing::info!("Left room: {}", room.id);
        Ok(())
    }

    async fn watch_matchmaking(&mut self, user_id: &str) -> Result<(), RealtimeError> {
        self.unwatch_matchmaking().await?;

        let destinations = MatchmakingTopics::all(user_id);
        let subscriptions = [self.subscription_id(), self.subscription_id(), self.subscription_id()];
        for (id, destination) in subscriptions.iter().zip(destinations.iter()) {
            self.write(stomp::subscribe(id, destination)).await?;
        }

        self.matchmaking = Some(MatchmakingWatch {
            user_id: user_id.to_string(),
            subscriptions,
        });
        tracing::info!("Watching matchmaking for user {}", user_id);
        Ok(())
    }

    async fn unwatch_matchmaking(&mut self) -> Result<(), RealtimeError> {
        let Some(watch) = self.matchmaking.take() else {
            return Ok(());
        };

        for id in &watch.subscriptions {
            self.write(stomp::unsubscribe(id)).await?;
        }
        tracing::info!("Stopped watching matchmaking for user {}", watch.user_id);
        Ok(())
    }

    /// Resubscribe what the caller asked for before the connection dropped
    async fn restore(&mut self, state: &ClientState) -> Result<(), RealtimeError> {
        let room_id = state.room_id.lock().await.clone();
        if let Some(room_id) = room_id {
            self.join(&room_id).await?;
        }
        let user_id = state.matchmaking_user.lock().await.clone();
        if let Some(user_id) = user_id {
            self.watch_matchmaking(&user_id).await?;
        }
        Ok(())
    }
}

/// Heart-beat negotiation: `(client, server)` pairs, zero disables.
fn negotiate(ours: u64, theirs: u64) -> Option<Duration> {
    if ours == 0 || theirs == 0 {
        None
    } else {
        Some(Duration::from_millis(ours.max(theirs)))
    }
}

fn host_of(url: &str) -> &str {
    url.split("://")
        .nth(1)
        .and_then(|rest| rest.split(['/', '?']).next())
        .unwrap_or("localhost")
}

async fn handshake(
    connector: &dyn Connector,
    session: &Session,
    settings: &RealtimeSettings,
) -> Result<StompSession, RealtimeError> {
    let mut transport = connector.connect(&settings.ws_url).await?;

    let token = session.token();
    let connect = stomp::connect(
        host_of(&settings.ws_url),
        token.as_deref(),
        (settings.heartbeat_outgoing_ms, settings.heartbeat_incoming_ms),
    );
    transport.send(connect.encode()).await?;

    let connected = tokio::time::timeout(CONNECT_TIMEOUT, await_connected(transport.as_mut()))
        .await
        .map_err(|_| RealtimeError::HandshakeTimeout)??;

    let (server_send, server_expect) = connected
        .get_header("heart-beat")
        .and_then(|hb| hb.split_once(','))
        .map(|(sx, sy)| (sx.trim().parse().unwrap_or(0), sy.trim().parse().unwrap_or(0)))
        .unwrap_or((0, 0));

    Ok(StompSession {
        transport,
        next_subscription: 0,
        active: None,
        matchmaking: None,
        send_every: negotiate(settings.heartbeat_outgoing_ms, server_expect),
        expect_every: negotiate(settings.heartbeat_incoming_ms, server_send),
    })
}

async fn await_connected(transport: &mut dyn Transport) -> Result<Frame, RealtimeError> {
    loop {
        let text = match transport.recv().await {
            Some(result) => result?,
            None => return Err(RealtimeError::Transport("closed during handshake".to_string())),
        };
        match Frame::decode(&text)? {
            Some(frame) if frame.command == "CONNECTED" => return Ok(frame),
            Some(frame) if frame.command == "ERROR" => {
                let message = frame.get_header("message").unwrap_or("connection refused");
                return Err(RealtimeError::Server(message.to_string()));
            }
            _ => continue,
        }
    }
}

async fn connection_loop(
    connector: Arc<dyn Connector>,
    session: Arc<Session>,
    settings: RealtimeSettings,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<RealtimeEvent>,
    state: Arc<ClientState>,
) {
    let mut attempt: u32 = 0;

    loop {
        match handshake(connector.as_ref(), &session, &settings).await {
            Ok(mut stomp) => {
                attempt = 0;
                state.connected.store(true, Ordering::Release);
                tracing::info!("WebSocket connected");
                emit_event(&event_tx, RealtimeEvent::Connected).await;

                let end = match stomp.restore(&state).await {
                    Ok(()) => run_session(&mut stomp, &mut cmd_rx, &event_tx).await,
                    Err(e) => SessionEnd::Lost(e.to_string()),
                };

                state.connected.store(false, Ordering::Release);
                match end {
                    SessionEnd::Shutdown => {
                        let _ = stomp.write(stomp::disconnect("disconnect-0")).await;
                        let _ = stomp.transport.close().await;
                        tracing::info!("WebSocket disconnected");
                        emit_disconnected(&event_tx, Some("client disconnected".to_string())).await;
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        tracing::warn!("WebSocket disconnected: {}", reason);
                        emit_disconnected(&event_tx, Some(reason)).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!("WebSocket connection failed: {}", e);
                emit_event(&event_tx, RealtimeEvent::Error(e.to_string())).await;
            }
        }

        if attempt >= settings.max_reconnect_attempts {
            tracing::warn!("Giving up after {} reconnect attempts", attempt);
            emit_event(&event_tx, RealtimeEvent::GaveUp).await;
            return;
        }

        attempt += 1;
        let delay = settings.reconnect_delay() * attempt;
        tracing::info!(
            "Attempting to reconnect in {:?} ({}/{})",
            delay,
            attempt,
            settings.max_reconnect_attempts
        );
        emit_event(&event_tx, RealtimeEvent::ReconnectScheduled { attempt, delay }).await;

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
                    Some(other) => tracing::debug!("Dropping {:?} while reconnecting", other),
                },
            }
        }
    }
}

async fn run_session(
    stomp: &mut StompSession,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> SessionEnd {
    let idle = Duration::from_secs(3600);
    let mut outgoing = tokio::time::interval(stomp.send_every.unwrap_or(idle));
    let mut liveness = tokio::time::interval(stomp.expect_every.unwrap_or(idle));
    let sends_heartbeats = stomp.send_every.is_some();
    let expects_heartbeats = stomp.expect_every.is_some();
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let result = match cmd {
                    None | Some(Command::Disconnect) => return SessionEnd::Shutdown,
                    Some(Command::JoinRoom(room_id)) => stomp.join(&room_id).await,
                    Some(Command::LeaveRoom) => stomp.leave().await,
                    Some(Command::SendMessage(content)) => match stomp.active.as_ref().map(|r| r.id.clone()) {
                        Some(room_id) => stomp.publish(RoomTopics::app(&room_id, "send"), json!({ "content": content })).await,
                        None => Err(RealtimeError::NoRoom),
                    },
                    Some(Command::Heartbeat) => match stomp.active.as_ref().map(|r| r.id.clone()) {
                        Some(room_id) => stomp.publish(RoomTopics::app(&room_id, "heartbeat"), json!({})).await,
                        None => Ok(()),
                    },
                    Some(Command::WatchMatchmaking(user_id)) => stomp.watch_matchmaking(&user_id).await,
                    Some(Command::UnwatchMatchmaking) => stomp.unwatch_matchmaking().await,
                };

                match result {
                    Ok(()) => {}
                    Err(RealtimeError::NoRoom) => tracing::warn!("Dropping message: no room joined"),
                    Err(e) => return SessionEnd::Lost(e.to_string()),
                }
            }

            incoming = stomp.transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        last_seen = Instant::now();
                        match Frame::decode(&text) {
                            Ok(Some(frame)) => {
                                let watched = stomp.matchmaking.as_ref().map(|m| m.user_id.as_str());
                                if let Some(end) = handle_frame(frame, watched, event_tx).await {
                                    return end;
                                }
                            }
                            Ok(None) => tracing::trace!("STOMP <<< heart-beat"),
                            Err(e) => tracing::warn!("Dropping unreadable STOMP frame: {}", e),
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("connection closed by server".to_string()),
                }
            }

            _ = outgoing.tick(), if sends_heartbeats => {
                if let Err(e) = stomp.transport.send("\n".to_string()).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }

            _ = liveness.tick(), if expects_heartbeats => {
                if let Some(expected) = stomp.expect_every {
                    if last_seen.elapsed() > expected * 2 {
                        return SessionEnd::Lost("heart-beat timeout".to_string());
                    }
                }
            }
        }
    }
}

async fn handle_frame(
    frame: Frame,
    watched_user: Option<&str>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> Option<SessionEnd> {
    tracing::debug!("STOMP <<< {}", frame.command);

    match frame.command.as_str() {
        "MESSAGE" => {
            let destination = frame.get_header("destination").unwrap_or_default();
            if destination.starts_with(MatchmakingTopics::PREFIX) {
                handle_matchmaking(destination, &frame.body, watched_user, event_tx).await;
            } else if destination.ends_with("/messages") {
                match serde_json::from_str::<ChatMessage>(&frame.body) {
                    Ok(message) => emit_event(event_tx, RealtimeEvent::ChatMessage(message)).await,
                    Err(e) => tracing::warn!("Error parsing message: {}", e),
                }
            } else if destination.ends_with("/participants") {
                match serde_json::from_str::<Vec<RoomParticipant>>(&frame.body) {
                    Ok(participants) => {
                        emit_event(event_tx, RealtimeEvent::Participants(participants)).await
                    }
                    Err(e) => tracing::warn!("Error parsing participants: {}", e),
                }
            } else {
                tracing::debug!("Ignoring message for {}", destination);
            }
            None
        }
        "ERROR" => {
            let message = frame
                .get_header("message")
                .map(str::to_string)
                .unwrap_or_else(|| frame.body.clone());
            tracing::error!("STOMP error: {}", message);
            emit_event(event_tx, RealtimeEvent::Error(message.clone())).await;
            Some(SessionEnd::Lost(message))
        }
        _ => None,
    }
}

async fn handle_matchmaking(
    destination: &str,
    body: &str,
    watched_user: Option<&str>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) {
    let event = if destination.ends_with("/status") {
        serde_json::from_str::<QueueStatusResponse>(body).map(RealtimeEvent::QueueUpdate)
    } else if destination.ends_with("/match-found") {
        serde_json::from_str::<MatchResult>(body)
            .map(|result| RealtimeEvent::MatchFound(result.details_for(watched_user.unwrap_or_default())))
    } else if destination.ends_with("/timeout") {
        serde_json::from_str::<QueueTimeout>(body).map(RealtimeEvent::QueueTimeout)
    } else {
        tracing::debug!("Ignoring matchmaking message for {}", destination);
        return;
    };

    match event {
        Ok(event) => emit_event(event_tx, event).await,
        Err(e) => tracing::warn!("Error parsing matchmaking update from {}: {}", destination, e),
    }
}

async fn emit_event(event_tx: &mpsc::Sender<RealtimeEvent>, event: RealtimeEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            tracing::warn!("Event channel full, dropping {:?}", dropped);
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("Event channel closed, receiver dropped");
        }
    }
}

async fn emit_disconnected(event_tx: &mpsc::Sender<RealtimeEvent>, reason: Option<String>) {
    if event_tx.send(RealtimeEvent::Disconnected { reason }).await.is_err() {
        tracing::debug!("Event channel closed, receiver dropped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::AuthTokens;
    use crate::services::storage::LocalStorage;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    pub(crate) type Item = Option<Result<String, RealtimeError>>;
    pub(crate) type Script = Vec<Item>;

    /// Replays frames fed by the test and records everything sent
    pub(crate) struct MockTransport {
        incoming: mpsc::UnboundedReceiver<Item>,
        sent: Arc<StdMutex<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> Result<(), RealtimeError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
            match self.incoming.recv().await {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), RealtimeError> {
            Ok(())
        }
    }

    /// Hands out one scripted transport per connect; refuses once exhausted
    pub(crate) struct MockConnector {
        pending: StdMutex<VecDeque<mpsc::UnboundedReceiver<Item>>>,
        feeds: Vec<mpsc::UnboundedSender<Item>>,
        sent: Arc<StdMutex<Vec<String>>>,
        urls: StdMutex<Vec<String>>,
    }

    impl MockConnector {
        pub(crate) fn new(scripts: Vec<Script>) -> Arc<Self> {
            let mut pending = VecDeque::new();
            let mut feeds = Vec::new();
            for script in scripts {
                let (tx, rx) = mpsc::unbounded_channel();
                for item in script {
                    tx.send(item).unwrap();
                }
                feeds.push(tx);
                pending.push_back(rx);
            }

            Arc::new(Self {
                pending: StdMutex::new(pending),
                feeds,
                sent: Arc::new(StdMutex::new(Vec::new())),
                urls: StdMutex::new(Vec::new()),
            })
        }

        /// Deliver another frame on the `connection`-th transport
        pub(crate) fn push(&self, connection: usize, item: Item) {
            self.feeds[connection].send(item).unwrap();
        }

        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, RealtimeError> {
            self.urls.lock().unwrap().push(url.to_string());
            let incoming = self
                .pending
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| RealtimeError::Transport("connection refused".to_string()))?;
            Ok(Box::new(MockTransport {
                incoming,
                sent: Arc::clone(&self.sent),
            }))
        }
    }

    pub(crate) fn connected_frame() -> Option<Result<String, RealtimeError>> {
        Some(Ok("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0".to_string()))
    }

    pub(crate) fn message_frame(destination: &str, body: &str) -> Option<Result<String, RealtimeError>> {
        Some(Ok(format!(
            "MESSAGE\ndestination:{}\nsubscription:sub-0\nmessage-id:1\n\n{}\0",
            destination, body
        )))
    }

    pub(crate) fn session() -> Arc<Session> {
        let session = Session::new(LocalStorage::in_memory());
        session
            .store_tokens(&AuthTokens {
                token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_in: None,
                is_new_user: false,
            })
            .unwrap();
        Arc::new(session)
    }

    pub(crate) fn settings(max_attempts: u32) -> RealtimeSettings {
        RealtimeSettings {
            reconnect_delay_ms: 10,
            max_reconnect_attempts: max_attempts,
            ..RealtimeSettings::default()
        }
    }

    async fn next_event(rx: &mut mpsc::Receiver<RealtimeEvent>) -> RealtimeEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn wait_for_sent(connector: &MockConnector, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let sent = connector.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        connector.sent()
    }

    #[tokio::test]
    async fn test_connect_sends_bearer_token() {
        let connector = MockConnector::new(vec![vec![connected_frame()]]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(0));

        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);
        assert!(client.is_connected());

        let sent = connector.sent();
        assert!(sent[0].starts_with("CONNECT\n"));
        assert!(sent[0].contains("Authorization:Bearer access-1\n"));
        assert!(sent[0].contains("heart-beat:4000,4000\n"));
    }

    #[tokio::test]
    async fn test_join_requires_connection() {
        let connector = MockConnector::new(vec![]);
        let (client, _events) = RealtimeClient::start(connector, session(), settings(0));

        let err = client.join_room("7").await.unwrap_err();
        assert!(matches!(err, RealtimeError::NotConnected));
    }

    #[tokio::test]
    async fn test_join_switches_rooms() {
        let connector = MockConnector::new(vec![vec![connected_frame()]]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(0));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        client.join_room("1").await.unwrap();
        client.join_room("2").await.unwrap();
        assert_eq!(client.current_room_id().await.as_deref(), Some("2"));

        // CONNECT, 3 frames per join, 3 frames for the implicit leave
        let sent = wait_for_sent(&connector, 10).await;
        assert!(sent[1].contains("destination:/topic/room/1/messages"));
        assert!(sent[2].contains("destination:/topic/room/1/participants"));
        assert!(sent[3].contains("destination:/app/room/1/join"));
        assert!(sent[4].contains("destination:/app/room/1/leave"));
        assert!(sent[5].starts_with("UNSUBSCRIBE\nid:sub-0"));
        assert!(sent[6].starts_with("UNSUBSCRIBE\nid:sub-1"));
        assert!(sent[7].contains("destination:/topic/room/2/messages"));
        assert!(sent[9].contains("destination:/app/room/2/join"));
    }

    #[tokio::test]
    async fn test_send_requires_room() {
        let connector = MockConnector::new(vec![vec![connected_frame()]]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(0));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        let err = client.send_message("hi").await.unwrap_err();
        assert!(matches!(err, RealtimeError::NoRoom));
        client.send_heartbeat().await.unwrap();

        client.join_room("7").await.unwrap();
        client.send_message("hi").await.unwrap();

        let sent = wait_for_sent(&connector, 5).await;
        assert!(sent[4].contains("destination:/app/room/7/send"));
        assert!(sent[4].ends_with("{\"content\":\"hi\"}\0"));
    }

    #[tokio::test]
    async fn test_incoming_messages_become_events() {
        let chat = r#"{"id":5,"content":"gg","senderDisplayName":"CyberNinja","timestamp":"2024-01-01T00:00:00","messageType":"CHAT"}"#;
        let participants = r#"[{"userId":7,"displayName":"CyberNinja","avatar":"cyber-warrior-01","isActive":true}]"#;
        let connector = MockConnector::new(vec![vec![
            connected_frame(),
            message_frame("/topic/room/7/messages", "not json"),
            message_frame("/topic/room/7/messages", chat),
            message_frame("/topic/room/7/participants", participants),
        ]]);
        let (_client, mut events) = RealtimeClient::start(connector, session(), settings(0));

        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);
        match next_event(&mut events).await {
            RealtimeEvent::ChatMessage(message) => assert_eq!(message.content, "gg"),
            other => panic!("unexpected event: {:?}", other),
        }
        match next_event(&mut events).await {
            RealtimeEvent::Participants(list) => assert_eq!(list[0].user_id, "7"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_linear_backoff_then_give_up() {
        let connector = MockConnector::new(vec![vec![connected_frame(), None]]);
        let (client, mut events) = RealtimeClient::start(connector, session(), settings(2));

        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::Disconnected { .. }));
        assert_eq!(
            next_event(&mut events).await,
            RealtimeEvent::ReconnectScheduled { attempt: 1, delay: Duration::from_millis(10) }
        );
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::Error(_)));
        assert_eq!(
            next_event(&mut events).await,
            RealtimeEvent::ReconnectScheduled { attempt: 2, delay: Duration::from_millis(20) }
        );
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::Error(_)));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::GaveUp);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_room_is_resubscribed_after_reconnect() {
        let connector = MockConnector::new(vec![
            vec![connected_frame()],
            vec![connected_frame()],
        ]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(1));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);
        client.join_room("7").await.unwrap();
        wait_for_sent(&connector, 4).await;

        connector.push(0, None);
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::Disconnected { .. }));
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::ReconnectScheduled { attempt: 1, .. }));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        let sent = wait_for_sent(&connector, 8).await;
        assert!(sent[4].starts_with("CONNECT\n"));
        assert!(sent[5].contains("destination:/topic/room/7/messages"));
        assert!(sent[7].contains("destination:/app/room/7/join"));
        assert_eq!(client.current_room_id().await.as_deref(), Some("7"));
        assert_eq!(connector.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_matchmaking_pushes_become_events() {
        let connector = MockConnector::new(vec![vec![connected_frame()]]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(0));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        client.watch_matchmaking("7").await.unwrap();
        let sent = wait_for_sent(&connector, 4).await;
        assert!(sent[1].contains("destination:/queue/matchmaking/user/7/status"));
        assert!(sent[2].contains("destination:/queue/matchmaking/user/7/match-found"));
        assert!(sent[3].contains("destination:/queue/matchmaking/user/7/timeout"));

        connector.push(0, message_frame(
            "/queue/matchmaking/user/7/status",
            r#"{"isInQueue":true,"gameType":"CHESS","queuePosition":3,"estimatedWaitTime":45}"#,
        ));
        connector.push(0, message_frame("/queue/matchmaking/user/7/match-found", "{broken"));
        connector.push(0, message_frame(
            "/queue/matchmaking/user/7/match-found",
            r#"{"sessionId":"s-1","gameType":"CHESS","players":[{"id":"7","displayName":"Me","skillLevel":"ADVANCED"},{"id":"9","displayName":"CyberNinja","skillLevel":"ADVANCED"}]}"#,
        ));

        match next_event(&mut events).await {
            RealtimeEvent::QueueUpdate(status) => {
                assert_eq!(status.queue_position, Some(3));
                assert_eq!(status.estimated_wait_time, Some(45));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        match next_event(&mut events).await {
            RealtimeEvent::MatchFound(details) => {
                assert_eq!(details.session_id.as_deref(), Some("s-1"));
                let ids: Vec<&str> = details.opponents.iter().map(|o| o.id.as_str()).collect();
                assert_eq!(ids, vec!["9"]);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        client.unwatch_matchmaking().await.unwrap();
        let sent = wait_for_sent(&connector, 7).await;
        assert!(sent[4].starts_with("UNSUBSCRIBE\nid:sub-0"));
        assert!(sent[6].starts_with("UNSUBSCRIBE\nid:sub-2"));
    }

    #[tokio::test]
    async fn test_matchmaking_watch_restored_after_reconnect() {
        let connector = MockConnector::new(vec![
            vec![connected_frame()],
            vec![connected_frame()],
        ]);
        let (client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(1));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);
        client.watch_matchmaking("7").await.unwrap();
        wait_for_sent(&connector, 4).await;

        connector.push(0, None);
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::Disconnected { .. }));
        assert!(matches!(next_event(&mut events).await, RealtimeEvent::ReconnectScheduled { .. }));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        let sent = wait_for_sent(&connector, 8).await;
        assert!(sent[4].starts_with("CONNECT\n"));
        assert!(sent[5].contains("destination:/queue/matchmaking/user/7/status"));
        assert!(sent[7].contains("destination:/queue/matchmaking/user/7/timeout"));
    }

    #[tokio::test]
    async fn test_disconnect_stops_loop() {
        let connector = MockConnector::new(vec![vec![connected_frame()]]);
        let (mut client, mut events) = RealtimeClient::start(connector.clone(), session(), settings(5));
        assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

        client.disconnect().await;
        assert!(!client.is_connected());
        assert_eq!(client.current_room_id().await, None);
        assert_eq!(
            next_event(&mut events).await,
            RealtimeEvent::Disconnected { reason: Some("client disconnected".to_string()) }
        );
        assert!(connector.sent().iter().any(|f| f.starts_with("DISCONNECT\n")));
    }
}
