use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use super::{Phase, Store};
use crate::models::AuthTokens;
use crate::services::ApiError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub phone_number: Option<String>,
    pub otp_sent: bool,
    pub otp_loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// Initial state for a client that may already hold a stored token
    pub fn restored(has_token: bool) -> Self {
        Self {
            is_authenticated: has_token,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    SendOtp(Phase<String>),
    VerifyOtp(Phase<AuthTokens>),
    RefreshToken(Phase<AuthTokens>),
    LoggedOut,
    ClearError,
    SetLoading(bool),
}

impl AuthState {
    pub fn reduce(&mut self, action: AuthAction) {
        match action {
            AuthAction::SendOtp(phase) => match phase {
                Phase::Pending => {
                    self.otp_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(phone_number) => {
                    self.otp_loading = false;
                    self.phone_number = Some(phone_number);
                    self.otp_sent = true;
                }
                Phase::Rejected(message) => {
                    self.otp_loading = false;
                    self.error = Some(message);
                }
            },
            AuthAction::VerifyOtp(phase) => match phase {
                Phase::Pending => {
                    self.is_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(_) => {
                    self.is_loading = false;
                    self.is_authenticated = true;
                }
                Phase::Rejected(message) => {
                    self.is_loading = false;
                    self.error = Some(message);
                }
            },
            AuthAction::RefreshToken(phase) => match phase {
                Phase::Pending => {}
                Phase::Fulfilled(_) => self.is_authenticated = true,
                Phase::Rejected(_) => self.is_authenticated = false,
            },
            AuthAction::LoggedOut => {
                self.is_authenticated = false;
                self.phone_number = None;
                self.otp_sent = false;
                self.error = None;
            }
            AuthAction::ClearError => self.error = None,
            AuthAction::SetLoading(loading) => self.is_loading = loading,
        }
    }
}

impl Store {
    pub async fn send_otp(&self, phone_number: &str) -> Result<String, ApiError> {
        tracing::info!("Sending OTP to {}", phone_number);
        self.track(AuthAction::SendOtp, async {
            self.api.send_otp(phone_number).await?;
            Ok(phone_number.to_string())
        })
        .await
    }

    /// Verify the code and keep the issued tokens in the session.
    pub async fn verify_otp(&self, phone_number: &str, otp_code: &str) -> Result<AuthTokens, ApiError> {
        self.track(AuthAction::VerifyOtp, async {
            let tokens = self.api.verify_otp(phone_number, otp_code).await?;
            self.session().store_tokens(&tokens)?;
            Ok(tokens)
        })
        .await
    }

    pub async fn refresh_auth_token(&self) -> Result<AuthTokens, ApiError> {
        self.track(AuthAction::RefreshToken, self.api.refresh_session())
            .await
    }

    /// Check the session every `interval` and refresh while one exists.
    ///
    /// A token carrying an `exp` claim is only refreshed once it would expire
    /// before the next check; opaque tokens are refreshed on every tick.
    pub fn schedule_token_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let margin = chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::hours(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let session = store.session();
                if !session.is_authenticated() {
                    continue;
                }
                if session.token_expiry().is_some() && !session.refresh_due(Utc::now(), margin) {
                    tracing::debug!("Access token still valid, skipping scheduled refresh");
                    continue;
                }
                if let Err(e) = store.refresh_auth_token().await {
                    tracing::warn!("Scheduled token refresh failed: {}", e);
                }
            }
        })
    }

    /// Refresh when the client comes back to the foreground with a stale session.
    pub async fn refresh_if_stale(&self) -> Option<Result<AuthTokens, ApiError>> {
        let session = self.session();
        if !session.is_authenticated() || !session.visibility_refresh_due(Utc::now()) {
            return None;
        }
        tracing::debug!("Session is stale, refreshing");
        Some(self.refresh_auth_token().await)
    }

    /// Tell the backend, then drop the local session regardless of the outcome.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            tracing::warn!("Logout request failed: {}", e);
        }
        if let Err(e) = self.session().clear() {
            tracing::error!("Failed to clear session: {}", e);
        }
        self.catalogs.invalidate_all();
        self.dispatch(AuthAction::LoggedOut).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_otp_transitions() {
        let mut state = AuthState::default();
        state.error = Some("old".to_string());

        state.reduce(AuthAction::SendOtp(Phase::Pending));
        assert!(state.otp_loading);
        assert_eq!(state.error, None);

        state.reduce(AuthAction::SendOtp(Phase::Fulfilled("+15550001111".to_string())));
        assert!(!state.otp_loading);
        assert!(state.otp_sent);
        assert_eq!(state.phone_number.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn test_verify_rejected_keeps_logged_out() {
        let mut state = AuthState::default();
        state.reduce(AuthAction::VerifyOtp(Phase::Pending));
        assert!(state.is_loading);
        state.reduce(AuthAction::VerifyOtp(Phase::Rejected("Invalid OTP".to_string())));
        assert!(!state.is_loading);
        assert!(!state.is_authenticated);
        assert_eq!(state.error.as_deref(), Some("Invalid OTP"));
    }

    #[test]
    fn test_logout_resets_flow() {
        let mut state = AuthState::restored(true);
        state.otp_sent = true;
        state.phone_number = Some("+15550001111".to_string());

        state.reduce(AuthAction::LoggedOut);
        assert_eq!(state, AuthState::default());
    }

    #[test]
    fn test_refresh_rejected_logs_out() {
        let mut state = AuthState::restored(true);
        state.reduce(AuthAction::RefreshToken(Phase::Rejected("Unauthorized".to_string())));
        assert!(!state.is_authenticated);
    }

    #[tokio::test]
    async fn test_fresh_session_is_not_refreshed() {
        let store = crate::store::tests::offline_store();
        assert!(store.refresh_if_stale().await.is_none());

        store
            .session()
            .store_tokens(&AuthTokens {
                token: "access-1".to_string(),
                refresh_token: "refresh-1".to_string(),
                expires_in: None,
                is_new_user: false,
            })
            .unwrap();
        assert!(store.refresh_if_stale().await.is_none());
    }
}
