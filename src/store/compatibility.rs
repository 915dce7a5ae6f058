use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{Phase, Store};
use crate::core::SwipeDecision;
use crate::models::{CompatibilityMatch, CompatibilityScoreResponse, ProfileRecommendation};
use crate::services::ApiError;

pub const DEFAULT_MATCH_LIMIT: u32 = 10;

/// Supplier of swipe candidates and sink for like/pass decisions
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn recommendations(&self) -> Result<Vec<ProfileRecommendation>, ApiError>;

    async fn record_decision(&self, profile_id: u64, decision: SwipeDecision) -> Result<(), ApiError>;
}

/// Fixed recommendation list used until the backend serves real candidates
#[derive(Debug, Clone)]
pub struct MockRecommendations {
    latency: Duration,
}

impl MockRecommendations {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockRecommendations {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[allow(clippy::too_many_arguments)]
fn recommendation(
    id: u64,
    display_name: &str,
    tags: [&str; 3],
    game_experience: &str,
    bio: &str,
    compatibility_score: u32,
    played: u32,
    won: u32,
) -> ProfileRecommendation {
    ProfileRecommendation {
        id,
        display_name: display_name.to_string(),
        avatar_id: format!("cyber-warrior-{:02}", id),
        interest_tags: tags.iter().map(|t| t.to_string()).collect(),
        game_experience: game_experience.to_string(),
        bio: Some(bio.to_string()),
        compatibility_score,
        total_games_played: played,
        total_games_won: won,
    }
}

#[async_trait]
impl RecommendationSource for MockRecommendations {
    async fn recommendations(&self) -> Result<Vec<ProfileRecommendation>, ApiError> {
        Ok(vec![
            recommendation(
                1,
                "CyberNinja",
                ["FPS", "Strategy", "RPG"],
                "Advanced",
                "Competitive gamer who loves tactical shooters and strategy games. Always looking for new challenges!",
                87,
                150,
                120,
            ),
            recommendation(
                2,
                "PixelMaster",
                ["Puzzle", "Arcade", "Indie"],
                "Intermediate",
                "Indie game enthusiast with a passion for creative gameplay mechanics.",
                72,
                89,
                45,
            ),
            recommendation(
                3,
                "StealthGamer",
                ["Stealth", "Action", "Adventure"],
                "Advanced",
                "Love games that require patience and strategy. Stealth is my specialty!",
                65,
                200,
                140,
            ),
            recommendation(
                4,
                "RacingPro",
                ["Racing", "Sports", "Simulation"],
                "Expert",
                "Speed is life! Racing games are my passion, always pushing for the fastest lap times.",
                58,
                300,
                180,
            ),
            recommendation(
                5,
                "RPGLegend",
                ["RPG", "Fantasy", "Story"],
                "Expert",
                "Immersive storytelling and character development are what I live for in gaming.",
                91,
                120,
                95,
            ),
        ])
    }

    async fn record_decision(&self, profile_id: u64, decision: SwipeDecision) -> Result<(), ApiError> {
        tokio::time::sleep(self.latency).await;
        tracing::debug!("Recorded {:?} for profile {}", decision, profile_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompatibilityState {
    pub matches: Vec<CompatibilityMatch>,
    pub current_match: Option<CompatibilityMatch>,
    pub recommendations: Vec<ProfileRecommendation>,
    /// Latest score per user id
    pub scores: HashMap<String, f64>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub leaderboard: Vec<CompatibilityMatch>,
    pub leaderboard_loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompatibilityAction {
    FetchMatches(Phase<Vec<CompatibilityMatch>>),
    FetchRecommendations(Phase<Vec<ProfileRecommendation>>),
    LikeProfile(Phase<u64>),
    PassProfile(Phase<u64>),
    GetScore(Phase<CompatibilityScoreResponse>),
    FetchLeaderboard(Phase<Vec<CompatibilityMatch>>),
    SetCurrentMatch(Option<CompatibilityMatch>),
    /// Drop the match for a profile id
    RemoveMatch(String),
    ClearMatches,
    ClearRecommendations,
    ClearError,
}

impl CompatibilityState {
    fn begin(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.is_loading = false;
        self.error = Some(message);
    }

    pub fn reduce(&mut self, action: CompatibilityAction) {
        match action {
            CompatibilityAction::FetchMatches(phase) => match phase {
                Phase::Pending => self.begin(),
                Phase::Fulfilled(matches) => {
                    self.is_loading = false;
                    if self.current_match.is_none() {
                        self.current_match = matches.first().cloned();
                    }
                    self.matches = matches;
                }
                Phase::Rejected(message) => self.fail(message),
            },
            CompatibilityAction::FetchRecommendations(phase) => match phase {
                Phase::Pending => self.begin(),
                Phase::Fulfilled(recommendations) => {
                    self.is_loading = false;
                    self.recommendations = recommendations;
                }
                Phase::Rejected(message) => self.fail(message),
            },
            CompatibilityAction::LikeProfile(Phase::Fulfilled(profile_id))
            | CompatibilityAction::PassProfile(Phase::Fulfilled(profile_id)) => {
                self.recommendations.retain(|r| r.id != profile_id);
            }
            CompatibilityAction::LikeProfile(_) | CompatibilityAction::PassProfile(_) => {}
            CompatibilityAction::GetScore(Phase::Fulfilled(response)) => {
                if let Some(found) = self
                    .matches
                    .iter_mut()
                    .find(|m| m.profile.id == response.user_id)
                {
                    found.score = response.score;
                }
                self.scores.insert(response.user_id, response.score);
            }
            CompatibilityAction::GetScore(_) => {}
            CompatibilityAction::FetchLeaderboard(phase) => match phase {
                Phase::Pending => {
                    self.leaderboard_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(leaderboard) => {
                    self.leaderboard_loading = false;
                    self.leaderboard = leaderboard;
                }
                Phase::Rejected(message) => {
                    self.leaderboard_loading = false;
                    self.error = Some(message);
                }
            },
            CompatibilityAction::SetCurrentMatch(current) => self.current_match = current,
            CompatibilityAction::RemoveMatch(profile_id) => {
                self.matches.retain(|m| m.profile.id != profile_id);
                if self
                    .current_match
                    .as_ref()
                    .is_some_and(|m| m.profile.id == profile_id)
                {
                    self.current_match = None;
                }
            }
            CompatibilityAction::ClearMatches => {
                self.matches.clear();
                self.current_match = None;
            }
            CompatibilityAction::ClearRecommendations => self.recommendations.clear(),
            CompatibilityAction::ClearError => self.error = None,
        }
    }
}

impl Store {
    pub async fn fetch_matches(&self, limit: Option<u32>) -> Result<Vec<CompatibilityMatch>, ApiError> {
        let limit = limit.unwrap_or(DEFAULT_MATCH_LIMIT);
        self.track(CompatibilityAction::FetchMatches, self.api.get_matches(limit))
            .await
    }

    pub async fn fetch_recommendations(&self) -> Result<Vec<ProfileRecommendation>, ApiError> {
        self.track(
            CompatibilityAction::FetchRecommendations,
            self.recommendations.recommendations(),
        )
        .await
    }

    pub async fn like_profile(&self, profile_id: u64) -> Result<u64, ApiError> {
        self.track(CompatibilityAction::LikeProfile, async {
            self.recommendations
                .record_decision(profile_id, SwipeDecision::Like)
                .await?;
            Ok(profile_id)
        })
        .await
    }

    pub async fn pass_profile(&self, profile_id: u64) -> Result<u64, ApiError> {
        self.track(CompatibilityAction::PassProfile, async {
            self.recommendations
                .record_decision(profile_id, SwipeDecision::Pass)
                .await?;
            Ok(profile_id)
        })
        .await
    }

    pub async fn get_compatibility_score(&self, user_id: &str) -> Result<CompatibilityScoreResponse, ApiError> {
        self.track(CompatibilityAction::GetScore, self.api.get_compatibility_score(user_id))
            .await
    }

    pub async fn fetch_leaderboard(&self) -> Result<Vec<CompatibilityMatch>, ApiError> {
        self.track(CompatibilityAction::FetchLeaderboard, self.api.get_leaderboard())
            .await
    }
}
