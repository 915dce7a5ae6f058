use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Phase, Store};
use crate::models::{
    BalanceResponse, DailyBonusResponse, GameCoinTransaction, SpendCoinsResponse, TransactionType,
};
use crate::services::{ApiError, CatalogKey};

#[derive(Debug, Clone, PartialEq)]
pub struct GameCoinState {
    pub balance: f64,
    pub transactions: Vec<GameCoinTransaction>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub daily_bonus_available: bool,
    pub last_bonus_claimed_at: Option<String>,
}

impl Default for GameCoinState {
    fn default() -> Self {
        Self {
            balance: 0.0,
            transactions: Vec::new(),
            is_loading: false,
            error: None,
            daily_bonus_available: true,
            last_bonus_claimed_at: None,
        }
    }
}

/// A granted daily bonus and the moment it was claimed
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedBonus {
    pub response: DailyBonusResponse,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameCoinAction {
    FetchBalance(Phase<BalanceResponse>),
    FetchTransactions(Phase<Vec<GameCoinTransaction>>),
    ClaimDailyBonus(Phase<ClaimedBonus>),
    SpendCoins(Phase<SpendCoinsResponse>),
    ClearError,
    UpdateBalance(f64),
    AddTransaction(GameCoinTransaction),
}

impl GameCoinState {
    fn settle<T>(&mut self, phase: Phase<T>, apply: impl FnOnce(&mut Self, T)) {
        match phase {
            Phase::Pending => {
                self.is_loading = true;
                self.error = None;
            }
            Phase::Fulfilled(value) => {
                self.is_loading = false;
                apply(self, value);
            }
            Phase::Rejected(message) => {
                self.is_loading = false;
                self.error = Some(message);
            }
        }
    }

    pub fn reduce(&mut self, action: GameCoinAction) {
        match action {
            GameCoinAction::FetchBalance(phase) => self.settle(phase, |state, response| {
                state.balance = response.balance;
                state.daily_bonus_available = response.daily_bonus_available;
                state.last_bonus_claimed_at = response.last_bonus_claimed_at;
            }),
            GameCoinAction::FetchTransactions(phase) => {
                self.settle(phase, |state, transactions| state.transactions = transactions)
            }
            GameCoinAction::ClaimDailyBonus(phase) => self.settle(phase, |state, claimed| {
                let timestamp = claimed.claimed_at.to_rfc3339();
                state.balance = claimed.response.new_balance;
                state.daily_bonus_available = false;
                state.last_bonus_claimed_at = Some(timestamp.clone());
                state.transactions.insert(
                    0,
                    GameCoinTransaction {
                        id: claimed.claimed_at.timestamp_millis().to_string(),
                        amount: claimed.response.bonus_amount,
                        kind: TransactionType::Earned,
                        description: "Daily Bonus".to_string(),
                        timestamp,
                    },
                );
            }),
            GameCoinAction::SpendCoins(phase) => self.settle(phase, |state, response| {
                state.balance = response.new_balance;
                state.transactions.insert(0, response.transaction);
            }),
            GameCoinAction::ClearError => self.error = None,
            GameCoinAction::UpdateBalance(balance) => self.balance = balance,
            GameCoinAction::AddTransaction(transaction) => self.transactions.insert(0, transaction),
        }
    }
}

impl Store {
    pub async fn fetch_balance(&self) -> Result<BalanceResponse, ApiError> {
        self.track(GameCoinAction::FetchBalance, self.api.get_balance())
            .await
    }

    pub async fn fetch_transactions(&self) -> Result<Vec<GameCoinTransaction>, ApiError> {
        self.track(GameCoinAction::FetchTransactions, self.api.get_transactions())
            .await
    }

    pub async fn claim_daily_bonus(&self) -> Result<ClaimedBonus, ApiError> {
        self.track(GameCoinAction::ClaimDailyBonus, async {
            let response = self.api.claim_daily_bonus().await?;
            tracing::info!("Daily bonus claimed: {}", response.bonus_amount);
            Ok(ClaimedBonus {
                response,
                claimed_at: Utc::now(),
            })
        })
        .await
    }

    pub async fn spend_coins(&self, amount: u32, description: &str) -> Result<SpendCoinsResponse, ApiError> {
        self.track(GameCoinAction::SpendCoins, self.api.spend_coins(amount, description))
            .await
    }

    /// Per-game coin prices, served from the catalog cache
    pub async fn game_pricing(&self) -> Result<Value, ApiError> {
        self.catalogs
            .get_or_fetch(CatalogKey::GAME_PRICING, || self.api.get_game_pricing())
            .await
    }
}
