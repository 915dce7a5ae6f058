use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::GameExperience;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    #[validate(length(min = 8, max = 20))]
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[validate(length(min = 8, max = 20))]
    pub phone_number: String,
    #[validate(length(equal = 6))]
    pub otp_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request to create the caller's profile
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    #[validate(length(min = 1))]
    pub avatar_id: String,
    #[validate(length(min = 3, max = 20))]
    pub display_name: String,
    #[validate(length(max = 500))]
    pub bio: String,
    #[validate(length(min = 1, max = 10))]
    pub interest_tags: Vec<String>,
    pub game_experience: GameExperience,
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,
    #[validate(length(min = 3, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[validate(length(max = 10))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_experience: Option<GameExperience>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SpendCoinsRequest {
    #[validate(range(min = 1))]
    pub amount: u32,
    #[validate(length(min = 1))]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueueRequest {
    pub game_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<String>,
}
