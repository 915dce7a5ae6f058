use super::{Phase, Store};
use crate::models::{ChatMessage, CreateRoomRequest, Room, RoomParticipant};
use crate::services::{ApiError, RealtimeEvent};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomState {
    pub current_room: Option<Room>,
    pub rooms: Vec<Room>,
    pub participants: Vec<RoomParticipant>,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_connected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomAction {
    FetchRooms(Phase<Vec<Room>>),
    CreateRoom(Phase<Room>),
    JoinRoom(Phase<Room>),
    /// Carries the id of the room that was left
    LeaveRoom(Phase<String>),
    FetchMessages(Phase<Vec<ChatMessage>>),
    SetCurrentRoom(Option<Room>),
    AddMessage(ChatMessage),
    UpdateParticipants(Vec<RoomParticipant>),
    SetConnected(bool),
    ClearMessages,
    ClearError,
}

impl RoomAction {
    /// Translate a chat client event into the matching slice update
    pub fn from_realtime(event: RealtimeEvent) -> Option<Self> {
        match event {
            RealtimeEvent::Connected => Some(RoomAction::SetConnected(true)),
            RealtimeEvent::Disconnected { .. } | RealtimeEvent::GaveUp => {
                Some(RoomAction::SetConnected(false))
            }
            RealtimeEvent::ChatMessage(message) => Some(RoomAction::AddMessage(message)),
            RealtimeEvent::Participants(participants) => {
                Some(RoomAction::UpdateParticipants(participants))
            }
            RealtimeEvent::ReconnectScheduled { .. }
            | RealtimeEvent::Error(_)
            | RealtimeEvent::QueueUpdate(_)
            | RealtimeEvent::MatchFound(_)
            | RealtimeEvent::QueueTimeout(_) => None,
        }
    }
}

impl RoomState {
    fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.is_loading = false;
        self.error = Some(message);
    }

    pub fn reduce(&mut self, action: RoomAction) {
        match action {
            RoomAction::FetchRooms(phase) => match phase {
                Phase::Pending => self.begin(),
                Phase::Fulfilled(rooms) => {
                    self.is_loading = false;
                    self.rooms = rooms;
                }
                Phase::Rejected(message) => self.fail(message),
            },
            RoomAction::CreateRoom(phase) => match phase {
                Phase::Pending => self.begin(),
                Phase::Fulfilled(room) => {
                    self.is_loading = false;
                    self.rooms.push(room.clone());
                    self.current_room = Some(room);
                }
                Phase::Rejected(message) => self.fail(message),
            },
            RoomAction::JoinRoom(phase) => match phase {
                Phase::Pending => self.begin(),
                Phase::Fulfilled(room) => {
                    self.is_loading = false;
                    self.current_room = Some(room);
                }
                Phase::Rejected(message) => self.fail(message),
            },
            RoomAction::LeaveRoom(Phase::Fulfilled(_)) => {
                self.current_room = None;
                self.participants.clear();
                self.messages.clear();
                self.is_connected = false;
            }
            RoomAction::LeaveRoom(_) => {}
            RoomAction::FetchMessages(Phase::Fulfilled(messages)) => self.messages = messages,
            RoomAction::FetchMessages(_) => {}
            RoomAction::SetCurrentRoom(room) => self.current_room = room,
            RoomAction::AddMessage(message) => self.messages.push(message),
            RoomAction::UpdateParticipants(participants) => self.participants = participants,
            RoomAction::SetConnected(connected) => self.is_connected = connected,
            RoomAction::ClearMessages => self.messages.clear(),
            RoomAction::ClearError => self.error = None,
        }
    }
}

impl Store {
    pub async fn fetch_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.track(RoomAction::FetchRooms, self.api.get_rooms()).await
    }

    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<Room, ApiError> {
        self.track(RoomAction::CreateRoom, self.api.create_room(request))
            .await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<Room, ApiError> {
        self.track(RoomAction::JoinRoom, self.api.join_room(room_id))
            .await
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<String, ApiError> {
        self.track(RoomAction::LeaveRoom, async {
            self.api.leave_room(room_id).await?;
            Ok(room_id.to_string())
        })
        .await
    }

    pub async fn fetch_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.track(RoomAction::FetchMessages, self.api.get_messages(room_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;

    fn room(id: &str) -> Room {
        Room {
            id: id.to_string(),
            name: "Lounge".to_string(),
            description: None,
            created_by: None,
            created_at: None,
            is_active: true,
            participant_count: 1,
            max_capacity: 10,
        }
    }

    fn message(content: &str) -> ChatMessage {
        ChatMessage {
            id: "m1".to_string(),
            content: content.to_string(),
            sender_display_name: "CyberNinja".to_string(),
            timestamp: "2024-01-01T00:00:00".to_string(),
            message_type: MessageType::Chat,
        }
    }

    #[test]
    fn test_create_room_becomes_current() {
        let mut state = RoomState::default();
        state.reduce(RoomAction::CreateRoom(Phase::Pending));
        assert!(state.is_loading);
        state.reduce(RoomAction::CreateRoom(Phase::Fulfilled(room("r1"))));
        assert_eq!(state.rooms.len(), 1);
        assert_eq!(state.current_room.as_ref().map(|r| r.id.as_str()), Some("r1"));
        assert!(!state.is_loading);
    }

    #[test]
    fn test_leave_room_clears_everything() {
        let mut state = RoomState::default();
        state.reduce(RoomAction::JoinRoom(Phase::Fulfilled(room("r1"))));
        state.reduce(RoomAction::SetConnected(true));
        state.reduce(RoomAction::AddMessage(message("hi")));

        state.reduce(RoomAction::LeaveRoom(Phase::Pending));
        assert!(state.current_room.is_some());

        state.reduce(RoomAction::LeaveRoom(Phase::Fulfilled("r1".to_string())));
        assert!(state.current_room.is_none());
        assert!(state.messages.is_empty());
        assert!(!state.is_connected);
    }

    #[test]
    fn test_realtime_events_map_to_actions() {
        assert_eq!(
            RoomAction::from_realtime(RealtimeEvent::Connected),
            Some(RoomAction::SetConnected(true))
        );
        assert_eq!(
            RoomAction::from_realtime(RealtimeEvent::Disconnected { reason: None }),
            Some(RoomAction::SetConnected(false))
        );
        assert_eq!(
            RoomAction::from_realtime(RealtimeEvent::ChatMessage(message("gg"))),
            Some(RoomAction::AddMessage(message("gg")))
        );
        assert_eq!(RoomAction::from_realtime(RealtimeEvent::Error("boom".to_string())), None);
    }

    #[tokio::test]
    async fn test_follow_realtime_updates_slice() {
        let store = crate::store::tests::offline_store();
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let follower = store.follow_realtime(rx);

        tx.send(RealtimeEvent::Connected).await.unwrap();
        tx.send(RealtimeEvent::ChatMessage(message("gg"))).await.unwrap();
        drop(tx);
        follower.await.unwrap();

        let state = store.select(|s| s.room.clone()).await;
        assert!(state.is_connected);
        assert_eq!(state.messages.len(), 1);
    }
}
