use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use validator::Validate;

use crate::config::ApiSettings;
use crate::models::{
    ApiEnvelope, AuthTokens, BalanceResponse, ChatMessage, CompatibilityMatch,
    CompatibilityScoreResponse, CreateProfileRequest, CreateRoomRequest, DailyBonusResponse,
    GameCoinTransaction, JoinQueueRequest, Profile, QueueStatusResponse, RefreshTokenRequest, Room,
    SendMessageRequest, SendOtpRequest, SpendCoinsRequest, SpendCoinsResponse,
    UpdateProfileRequest, VerifyOtpRequest,
};
use crate::services::session::Session;
use crate::services::storage::StorageError;

/// Errors that can occur when talking to the REST backend
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unauthorized: session expired")]
    Unauthorized,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Message suitable for a slice's `error` field
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. } => message.clone(),
            ApiError::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

/// REST client for the GameVerse backend
///
/// Injects the session's bearer token into every request. A 401 triggers a
/// single refresh through `/auth/refresh-token` followed by one replay of
/// the original request; if the refresh fails the session is cleared.
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings, session: Arc<Session>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            session,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let payload = self.request_value(method, path, body, fallback).await?;
        serde_json::from_value(ApiEnvelope::unwrap_payload(payload))
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    async fn request_value(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        fallback: &str,
    ) -> Result<Value, ApiError> {
        let mut retried = false;

        loop {
            let mut request = self.client.request(method.clone(), self.url(path));
            if let Some(token) = self.session.token() {
                request = request.bearer_auth(token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            tracing::debug!("{} {}", method, path);
            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                tracing::debug!("{} {} returned 401, refreshing session", method, path);
                self.refresh_session().await?;
                continue;
            }

            let text = response.text().await?;
            let json = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            };

            if !status.is_success() {
                let message = json
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or(fallback)
                    .to_string();
                tracing::warn!("{} {} failed with {}: {}", method, path, status, message);
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(json);
        }
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// Any failure clears the session and yields [`ApiError::Unauthorized`].
    pub async fn refresh_session(&self) -> Result<AuthTokens, ApiError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            tracing::info!("No refresh token available, logging out");
            self.force_logout();
            return Err(ApiError::Unauthorized);
        };

        let response = self
            .client
            .post(self.url("/auth/refresh-token"))
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .await;

        let tokens = match response {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| serde_json::from_value::<AuthTokens>(ApiEnvelope::unwrap_payload(body)).ok()),
            Ok(response) => {
                tracing::warn!("Token refresh rejected with {}", response.status());
                None
            }
            Err(e) => {
                tracing::warn!("Token refresh failed: {}", e);
                None
            }
        };

        match tokens {
            Some(tokens) => {
                self.session.store_tokens(&tokens)?;
                tracing::info!("Access token refreshed");
                Ok(tokens)
            }
            None => {
                self.force_logout();
                Err(ApiError::Unauthorized)
            }
        }
    }

    fn force_logout(&self) {
        if let Err(e) = self.session.clear() {
            tracing::error!("Failed to clear session: {}", e);
        }
    }

    fn validated<T: Validate + Serialize>(request: &T) -> Result<Value, ApiError> {
        request.validate()?;
        serde_json::to_value(request).map_err(|e| ApiError::Validation(e.to_string()))
    }

    // Auth

    pub async fn send_otp(&self, phone_number: &str) -> Result<(), ApiError> {
        let body = Self::validated(&SendOtpRequest {
            phone_number: phone_number.to_string(),
        })?;
        self.request_value(Method::POST, "/auth/send-otp", Some(body), "Failed to send OTP")
            .await?;
        Ok(())
    }

    pub async fn verify_otp(&self, phone_number: &str, otp_code: &str) -> Result<AuthTokens, ApiError> {
        let body = Self::validated(&VerifyOtpRequest {
            phone_number: phone_number.to_string(),
            otp_code: otp_code.to_string(),
        })?;
        self.request(Method::POST, "/auth/verify-otp", Some(body), "Invalid OTP")
            .await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.request_value(Method::POST, "/auth/logout", None, "Failed to log out")
            .await?;
        Ok(())
    }

    // Profile

    pub async fn create_profile(&self, request: &CreateProfileRequest) -> Result<Profile, ApiError> {
        let body = Self::validated(request)?;
        self.request(Method::POST, "/profile/create", Some(body), "Failed to create profile")
            .await
    }

    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.request(Method::GET, "/profile/me", None, "Failed to fetch profile")
            .await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        let body = Self::validated(request)?;
        self.request(Method::PUT, "/profile/update", Some(body), "Failed to update profile")
            .await
    }

    pub async fn search_profiles(&self, query: &str) -> Result<Vec<Profile>, ApiError> {
        let path = format!("/profile/search?q={}", urlencoding::encode(query));
        self.request(Method::GET, &path, None, "Failed to search profiles")
            .await
    }

    pub async fn get_available_avatars(&self) -> Result<Vec<String>, ApiError> {
        self.request(Method::GET, "/profile/avatars", None, "Failed to fetch avatars")
            .await
    }

    pub async fn get_available_interest_tags(&self) -> Result<Vec<String>, ApiError> {
        self.request(Method::GET, "/profile/interest-tags", None, "Failed to fetch interest tags")
            .await
    }

    pub async fn discover_profiles(&self) -> Result<Vec<Profile>, ApiError> {
        self.request(Method::GET, "/profile/discover", None, "Failed to discover profiles")
            .await
    }

    // Rooms

    pub async fn get_rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.request(Method::GET, "/rooms", None, "Failed to fetch rooms")
            .await
    }

    pub async fn create_room(&self, request: &CreateRoomRequest) -> Result<Room, ApiError> {
        let body = Self::validated(request)?;
        self.request(Method::POST, "/rooms", Some(body), "Failed to create room")
            .await
    }

    pub async fn join_room(&self, room_id: &str) -> Result<Room, ApiError> {
        let path = format!("/rooms/{}/join", room_id);
        self.request(Method::POST, &path, None, "Failed to join room")
            .await
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<(), ApiError> {
        let path = format!("/rooms/{}/leave", room_id);
        self.request_value(Method::POST, &path, None, "Failed to leave room")
            .await?;
        Ok(())
    }

    pub async fn get_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("/rooms/{}/messages", room_id);
        self.request(Method::GET, &path, None, "Failed to fetch messages")
            .await
    }

    pub async fn send_message(&self, room_id: &str, content: &str) -> Result<ChatMessage, ApiError> {
        let path = format!("/rooms/{}/messages", room_id);
        let body = Self::validated(&SendMessageRequest {
            content: content.to_string(),
        })?;
        self.request(Method::POST, &path, Some(body), "Failed to send message")
            .await
    }

    // Game coins

    pub async fn get_balance(&self) -> Result<BalanceResponse, ApiError> {
        self.request(Method::GET, "/gamecoins/balance", None, "Failed to fetch balance")
            .await
    }

    pub async fn get_transactions(&self) -> Result<Vec<GameCoinTransaction>, ApiError> {
        self.request(Method::GET, "/gamecoins/transactions", None, "Failed to fetch transactions")
            .await
    }

    pub async fn claim_daily_bonus(&self) -> Result<DailyBonusResponse, ApiError> {
        self.request(Method::POST, "/gamecoins/daily-bonus", None, "Failed to claim daily bonus")
            .await
    }

    pub async fn spend_coins(&self, amount: u32, description: &str) -> Result<SpendCoinsResponse, ApiError> {
        let body = Self::validated(&SpendCoinsRequest {
            amount,
            description: description.to_string(),
        })?;
        self.request(Method::POST, "/gamecoins/spend", Some(body), "Failed to spend coins")
            .await
    }

    pub async fn get_game_pricing(&self) -> Result<Value, ApiError> {
        self.request(Method::GET, "/gamecoins/game-pricing", None, "Failed to fetch game pricing")
            .await
    }

    // Compatibility

    pub async fn get_matches(&self, limit: u32) -> Result<Vec<CompatibilityMatch>, ApiError> {
        let path = format!("/compatibility/matches?limit={}", limit);
        self.request(Method::GET, &path, None, "Failed to fetch matches")
            .await
    }

    pub async fn get_compatibility_score(&self, user_id: &str) -> Result<CompatibilityScoreResponse, ApiError> {
        let path = format!("/compatibility/score/{}", urlencoding::encode(user_id));
        self.request(Method::GET, &path, None, "Failed to get compatibility score")
            .await
    }

    pub async fn get_leaderboard(&self) -> Result<Vec<CompatibilityMatch>, ApiError> {
        self.request(Method::GET, "/compatibility/leaderboard", None, "Failed to fetch leaderboard")
            .await
    }

    // Matchmaking

    pub async fn join_queue(&self, request: &JoinQueueRequest) -> Result<QueueStatusResponse, ApiError> {
        let body = json!(request);
        self.request(Method::POST, "/matchmaking/join", Some(body), "Failed to join queue")
            .await
    }

    pub async fn leave_queue(&self) -> Result<(), ApiError> {
        self.request_value(Method::POST, "/matchmaking/leave", None, "Failed to leave queue")
            .await?;
        Ok(())
    }

    pub async fn get_queue_status(&self) -> Result<QueueStatusResponse, ApiError> {
        self.request(Method::GET, "/matchmaking/status", None, "Failed to get queue status")
            .await
    }
}
