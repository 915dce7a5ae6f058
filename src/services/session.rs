use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::AuthTokens;
use crate::services::storage::{
    LocalStorage, StorageError, LAST_TOKEN_REFRESH_KEY, REFRESH_TOKEN_KEY, TOKEN_KEY,
};

const SESSION_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TokensUpdated,
    LoggedOut,
    /// Another handle over the same storage removed the access token
    LoggedOutElsewhere,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Authentication session backed by the token storage
pub struct Session {
    storage: LocalStorage,
    events: broadcast::Sender<SessionEvent>,
    visibility_refresh: Duration,
}

impl Session {
    pub fn new(storage: LocalStorage) -> Self {
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            storage,
            events,
            visibility_refresh: Duration::hours(1),
        }
    }

    pub fn with_visibility_refresh(mut self, secs: u64) -> Self {
        self.visibility_refresh = Duration::seconds(secs as i64);
        self
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn store_tokens(&self, tokens: &AuthTokens) -> Result<(), StorageError> {
        self.storage.set(TOKEN_KEY, tokens.token.as_str())?;
        self.storage.set(REFRESH_TOKEN_KEY, tokens.refresh_token.as_str())?;
        self.mark_refreshed(Utc::now())?;
        self.emit(SessionEvent::TokensUpdated);
        Ok(())
    }

    /// Log out locally: drop both tokens.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(REFRESH_TOKEN_KEY)?;
        tracing::info!("Session cleared");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    pub fn mark_refreshed(&self, now: DateTime<Utc>) -> Result<(), StorageError> {
        self.storage
            .set(LAST_TOKEN_REFRESH_KEY, now.timestamp_millis().to_string())
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        let millis = self.storage.get(LAST_TOKEN_REFRESH_KEY)?.parse::<i64>().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// True when a client coming back to the foreground should refresh.
    pub fn visibility_refresh_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed() {
            Some(last) => now - last > self.visibility_refresh,
            None => true,
        }
    }

    /// Expiry of the access token, read from its `exp` claim without verification
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        let token = self.token()?;

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        match decode::<ExpiryClaims>(&token, &DecodingKey::from_secret(&[]), &validation) {
            Ok(data) => Utc.timestamp_opt(data.claims.exp, 0).single(),
            Err(e) => {
                tracing::debug!("Access token carries no readable expiry: {}", e);
                None
            }
        }
    }

    pub fn refresh_due(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.token_expiry()
            .map(|exp| exp - margin <= now)
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Propagate logouts performed through other storage handles.
    pub fn watch_other_tabs(&self) -> JoinHandle<()> {
        let mut changes = self.storage.subscribe();
        let events = self.events.clone();

        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                if change.key == TOKEN_KEY && change.new_value.is_none() {
                    tracing::info!("Logged out from another tab");
                    let _ = events.send(SessionEvent::LoggedOutElsewhere);
                }
            }
        })
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
