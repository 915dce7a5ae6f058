use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::domain::{string_or_number, GameCoinTransaction, MatchDetails, Opponent};

/// Backend envelope: `{ success, message, data, error }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiEnvelope {
    /// Unwrap `data` when the body is an envelope, otherwise return the body.
    pub fn unwrap_payload(body: Value) -> Value {
        let is_envelope = body
            .as_object()
            .map(|obj| obj.contains_key("success") && obj.contains_key("data"))
            .unwrap_or(false);

        if is_envelope {
            body.get("data").cloned().unwrap_or(Value::Null)
        } else {
            body
        }
    }
}

/// Error body returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Tokens issued on OTP verification and refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub is_new_user: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub balance: f64,
    #[serde(default = "default_true")]
    pub daily_bonus_available: bool,
    #[serde(default)]
    pub last_bonus_claimed_at: Option<String>,
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBonusResponse {
    pub new_balance: f64,
    pub bonus_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendCoinsResponse {
    pub new_balance: f64,
    pub transaction: GameCoinTransaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityScoreResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    #[serde(default)]
    pub is_in_queue: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub skill_level: Option<String>,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub estimated_wait_time: Option<u32>,
    #[serde(default)]
    pub alternative_games: Vec<String>,
    #[serde(default)]
    pub match_details: Option<MatchDetails>,
}

/// Match announcement pushed to every matched player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub session_id: String,
    pub game_type: Option<String>,
    #[serde(default)]
    pub players: Vec<Opponent>,
}

impl MatchResult {
    /// Details as seen by `user_id`: everyone else is an opponent
    pub fn details_for(self, user_id: &str) -> MatchDetails {
        MatchDetails {
            session_id: Some(self.session_id),
            opponents: self.players.into_iter().filter(|p| p.id != user_id).collect(),
            game_type: self.game_type,
        }
    }
}

/// Sent when a queued search exceeded the server's wait limit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueTimeout {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Result of starting a game from a private lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub game_session_id: String,
    pub lobby_id: String,
}
