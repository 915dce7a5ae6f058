use chrono::{DateTime, Duration, Utc};

use super::{Phase, RejectMessage, Store};
use crate::models::{JoinQueueRequest, MatchDetails, QueueStatusResponse};
use crate::services::{ApiError, RealtimeEvent};

pub const DEFAULT_ESTIMATED_WAIT_SECS: u32 = 30;
pub const QUEUE_TIMEOUT_SECS: i64 = 60;
pub const QUEUE_TIMEOUT_MESSAGE: &str = "Queue timeout - try alternative games";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStatus {
    #[default]
    Idle,
    Searching,
    Found,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchmakingState {
    pub is_in_queue: bool,
    pub queue_start_time: Option<DateTime<Utc>>,
    /// Seconds
    pub estimated_wait_time: u32,
    pub game_type: Option<String>,
    pub skill_level: Option<String>,
    pub status: QueueStatus,
    pub match_found: bool,
    pub match_details: Option<MatchDetails>,
    pub error: Option<String>,
    pub queue_position: Option<u32>,
    pub alternative_games: Vec<String>,
}

impl Default for MatchmakingState {
    fn default() -> Self {
        Self {
            is_in_queue: false,
            queue_start_time: None,
            estimated_wait_time: DEFAULT_ESTIMATED_WAIT_SECS,
            game_type: None,
            skill_level: None,
            status: QueueStatus::Idle,
            match_found: false,
            match_details: None,
            error: None,
            queue_position: None,
            alternative_games: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingAction {
    JoinQueuePending(DateTime<Utc>),
    JoinQueueFulfilled(QueueStatusResponse),
    JoinQueueRejected(String),
    LeaveQueue(Phase<()>),
    FetchQueueStatus(Phase<QueueStatusResponse>),
    Reset,
    UpdateQueuePosition(u32),
    UpdateEstimatedWaitTime(u32),
    MatchFound(MatchDetails),
    SetAlternativeGames(Vec<String>),
    ClearError,
    /// Periodic tick carrying the current time
    UpdateQueueTime(DateTime<Utc>),
}

impl MatchmakingAction {
    /// Actions for a matchmaking push; other realtime events map to none.
    pub fn from_realtime(event: RealtimeEvent) -> Vec<Self> {
        match event {
            RealtimeEvent::QueueUpdate(status) => {
                let mut actions = Vec::with_capacity(2);
                if let Some(position) = status.queue_position {
                    actions.push(MatchmakingAction::UpdateQueuePosition(position));
                }
                if let Some(wait) = status.estimated_wait_time {
                    actions.push(MatchmakingAction::UpdateEstimatedWaitTime(wait));
                }
                actions
            }
            RealtimeEvent::MatchFound(details) => vec![MatchmakingAction::MatchFound(details)],
            RealtimeEvent::QueueTimeout(timeout) => {
                vec![MatchmakingAction::SetAlternativeGames(timeout.alternatives)]
            }
            _ => Vec::new(),
        }
    }
}

impl MatchmakingState {
    /// Time spent in the queue so far
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.queue_start_time.map(|start| now - start)
    }

    pub fn reduce(&mut self, action: MatchmakingAction) {
        match action {
            MatchmakingAction::JoinQueuePending(started_at) => {
                self.status = QueueStatus::Searching;
                self.error = None;
                self.queue_start_time = Some(started_at);
                self.is_in_queue = true;
            }
            MatchmakingAction::JoinQueueFulfilled(response) => {
                self.game_type = response.game_type;
                self.skill_level = response.skill_level;
                self.queue_position = response.queue_position;
                if let Some(wait) = response.estimated_wait_time {
                    self.estimated_wait_time = wait;
                }
                if !response.alternative_games.is_empty() {
                    self.alternative_games = response.alternative_games;
                }
            }
            MatchmakingAction::JoinQueueRejected(message) => {
                self.status = QueueStatus::Error;
                self.error = Some(message);
                self.is_in_queue = false;
                self.queue_start_time = None;
            }
            MatchmakingAction::LeaveQueue(phase) => match phase {
                Phase::Pending => self.status = QueueStatus::Idle,
                Phase::Fulfilled(()) => {
                    self.is_in_queue = false;
                    self.queue_start_time = None;
                    self.status = QueueStatus::Cancelled;
                    self.game_type = None;
                    self.skill_level = None;
                    self.queue_position = None;
                }
                Phase::Rejected(message) => self.error = Some(message),
            },
            MatchmakingAction::FetchQueueStatus(Phase::Fulfilled(response)) => {
                if response.is_in_queue {
                    self.is_in_queue = true;
                    self.queue_position = response.queue_position;
                    if let Some(wait) = response.estimated_wait_time {
                        self.estimated_wait_time = wait;
                    }
                    self.game_type = response.game_type;
                    self.status = QueueStatus::Searching;
                }
            }
            MatchmakingAction::FetchQueueStatus(_) => {}
            MatchmakingAction::Reset => *self = Self::default(),
            MatchmakingAction::UpdateQueuePosition(position) => self.queue_position = Some(position),
            MatchmakingAction::UpdateEstimatedWaitTime(wait) => self.estimated_wait_time = wait,
            MatchmakingAction::MatchFound(details) => {
                self.match_found = true;
                self.status = QueueStatus::Found;
                self.is_in_queue = false;
                self.match_details = Some(details);
            }
            MatchmakingAction::SetAlternativeGames(games) => self.alternative_games = games,
            MatchmakingAction::ClearError => self.error = None,
            MatchmakingAction::UpdateQueueTime(now) => {
                let timed_out = self
                    .elapsed(now)
                    .is_some_and(|elapsed| elapsed > Duration::seconds(QUEUE_TIMEOUT_SECS));
                if timed_out {
                    self.status = QueueStatus::Error;
                    self.error = Some(QUEUE_TIMEOUT_MESSAGE.to_string());
                }
            }
        }
    }
}

impl Store {
    pub async fn join_queue(&self, game_type: &str, skill_level: Option<&str>) -> Result<QueueStatusResponse, ApiError> {
        let request = JoinQueueRequest {
            game_type: game_type.to_string(),
            skill_level: skill_level.map(str::to_string),
        };

        self.dispatch(MatchmakingAction::JoinQueuePending(Utc::now()))
            .await;
        match self.api.join_queue(&request).await {
            Ok(mut response) => {
                if response.game_type.is_none() {
                    response.game_type = Some(request.game_type);
                }
                if response.skill_level.is_none() {
                    response.skill_level = request.skill_level;
                }
                tracing::info!("Joined {} queue", game_type);
                self.dispatch(MatchmakingAction::JoinQueueFulfilled(response.clone()))
                    .await;
                Ok(response)
            }
            Err(e) => {
                self.dispatch(MatchmakingAction::JoinQueueRejected(e.reject_message()))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn leave_queue(&self) -> Result<(), ApiError> {
        self.track(MatchmakingAction::LeaveQueue, self.api.leave_queue())
            .await
    }

    /// Poll the queue; a response carrying match details settles the search.
    pub async fn get_queue_status(&self) -> Result<QueueStatusResponse, ApiError> {
        let response = self
            .track(MatchmakingAction::FetchQueueStatus, self.api.get_queue_status())
            .await?;
        if let Some(details) = response.match_details.clone() {
            tracing::info!("Match found: {:?}", details.session_id);
            self.dispatch(MatchmakingAction::MatchFound(details)).await;
        }
        Ok(response)
    }
}
