use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Accept ids sent either as JSON strings or numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameExperience {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// Player profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub user_id: String,
    pub avatar_id: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub interest_tags: Vec<String>,
    pub game_experience: GameExperience,
    #[serde(default)]
    pub games_played: Vec<String>,
    #[serde(default)]
    pub total_games_won: u32,
    #[serde(default)]
    pub total_games_played: u32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Profile {
    pub fn win_rate(&self) -> u32 {
        crate::core::stats::win_rate(self.total_games_won, self.total_games_played)
    }
}

/// Candidate profile surfaced for swipe-based discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecommendation {
    pub id: u64,
    pub display_name: String,
    pub avatar_id: String,
    #[serde(default)]
    pub interest_tags: Vec<String>,
    pub game_experience: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub compatibility_score: u32,
    #[serde(default)]
    pub total_games_played: u32,
    #[serde(default)]
    pub total_games_won: u32,
}

impl ProfileRecommendation {
    pub fn win_rate(&self) -> u32 {
        crate::core::stats::win_rate(self.total_games_won, self.total_games_played)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityMatch {
    pub profile: Profile,
    pub score: f64,
    #[serde(default)]
    pub shared_interests: Vec<String>,
    #[serde(default)]
    pub game_experience_match: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyParticipant {
    pub id: String,
    pub display_name: String,
    pub avatar_id: String,
    pub is_creator: bool,
}

/// Invite-code-gated pre-game waiting room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLobby {
    pub id: String,
    pub invite_code: String,
    pub creator_id: String,
    pub participants: Vec<LobbyParticipant>,
    pub max_capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl PrivateLobby {
    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.max_capacity
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, alias = "currentCount")]
    pub participant_count: u32,
    pub max_capacity: u32,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomParticipant {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub joined_at: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Chat,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content: String,
    pub sender_display_name: String,
    pub timestamp: String,
    pub message_type: MessageType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Earned,
    Spent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCoinTransaction {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub description: String,
    pub timestamp: String,
}

/// An opponent announced by the matchmaking queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opponent {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub skill_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub session_id: Option<String>,
    #[serde(default)]
    pub opponents: Vec<Opponent>,
    pub game_type: Option<String>,
}
