//! Error classification shared by every client surface.
//!
//! Service-level errors (`ApiError`, `RealtimeError`, ...) live next to their
//! services. This module maps them onto a small catalogue of [`ErrorCode`]s
//! with user-facing messages, which is what the views show.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::services::{ApiError, RealtimeError, StorageError};
use crate::store::LobbyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    ConnectionTimeout,
    ServerError,
    AuthFailed,
    TokenExpired,
    Unauthorized,
    GameSessionNotFound,
    GameFull,
    InvalidMove,
    GameEnded,
    ValidationError,
    InvalidInput,
    UnknownError,
}

impl ErrorCode {
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::NetworkError => "Network connection failed. Please check your internet connection.",
            ErrorCode::ConnectionTimeout => "Connection timed out. Please try again.",
            ErrorCode::ServerError => "Server error occurred. Please try again later.",
            ErrorCode::AuthFailed => "Authentication failed. Please log in again.",
            ErrorCode::TokenExpired => "Your session has expired. Please log in again.",
            ErrorCode::Unauthorized => "You are not authorized to perform this action.",
            ErrorCode::GameSessionNotFound => "Game session not found or has expired.",
            ErrorCode::GameFull => "This game is full. Please try another game.",
            ErrorCode::InvalidMove => "Invalid move. Please try again.",
            ErrorCode::GameEnded => "This game has already ended.",
            ErrorCode::ValidationError => "Please check your input and try again.",
            ErrorCode::InvalidInput => "Invalid input provided.",
            ErrorCode::UnknownError => "An unexpected error occurred. Please try again.",
        }
    }

    /// Critical errors stay on screen longer.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ErrorCode::ServerError | ErrorCode::AuthFailed | ErrorCode::TokenExpired
        )
    }
}

/// A classified, user-presentable error
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthFailed, message)
    }

    pub fn game(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }

    /// Log the error with its context and return the message to show.
    pub fn report(&self, context: Option<&str>) -> &'static str {
        let context = context.unwrap_or("unknown context");
        if self.code.is_critical() {
            tracing::error!(code = ?self.code, details = ?self.details, "Error in {}: {}", context, self.message);
        } else {
            tracing::warn!(code = ?self.code, details = ?self.details, "Error in {}: {}", context, self.message);
        }
        self.user_message()
    }
}

impl From<&ApiError> for AppError {
    fn from(err: &ApiError) -> Self {
        let code = match err {
            ApiError::Request(e) if e.is_timeout() => ErrorCode::ConnectionTimeout,
            ApiError::Request(_) => ErrorCode::NetworkError,
            ApiError::Unauthorized => ErrorCode::TokenExpired,
            ApiError::Status { status, .. } if *status == 403 => ErrorCode::Unauthorized,
            ApiError::Status { status, .. } if *status == 400 || *status == 422 => ErrorCode::ValidationError,
            ApiError::Status { status, .. } if *status >= 500 => ErrorCode::ServerError,
            ApiError::Status { .. } => ErrorCode::UnknownError,
            ApiError::Validation(_) => ErrorCode::ValidationError,
            ApiError::InvalidResponse(_) => ErrorCode::ServerError,
            ApiError::Storage(_) => ErrorCode::UnknownError,
        };
        AppError::new(code, err.to_string())
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::from(&err)
    }
}

impl From<RealtimeError> for AppError {
    fn from(err: RealtimeError) -> Self {
        AppError::network(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::new(ErrorCode::UnknownError, err.to_string())
    }
}

impl From<LobbyError> for AppError {
    fn from(err: LobbyError) -> Self {
        let code = match err {
            LobbyError::Full => ErrorCode::GameFull,
            LobbyError::Expired | LobbyError::NotFound | LobbyError::NoActiveLobby => {
                ErrorCode::GameSessionNotFound
            }
            LobbyError::NotEnoughPlayers => ErrorCode::InvalidInput,
            LobbyError::Backend(_) => ErrorCode::ServerError,
        };
        AppError::new(code, err.to_string())
    }
}
