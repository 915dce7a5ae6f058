use crate::core::{CompatibilityTier, SwipeDecision, SwipeDeck};
use crate::models::ProfileRecommendation;
use crate::services::ApiError;
use crate::store::{CompatibilityState, Store};

/// Presentation of one recommendation card
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: u64,
    pub display_name: String,
    pub avatar_id: String,
    pub bio: Option<String>,
    pub interest_tags: Vec<String>,
    pub game_experience: String,
    pub score: u32,
    pub score_class: &'static str,
    pub badge_class: &'static str,
    pub win_rate: u32,
    pub games_played: u32,
    /// e.g. `2 / 5`
    pub position: String,
    pub opacity: f64,
    pub rotation_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoverScreen {
    Loading,
    Error(String),
    NoMore,
    Card(Box<CardView>),
}

/// Swipe-driven discovery over the compatibility slice
#[derive(Debug, Default)]
pub struct DiscoverView {
    deck: SwipeDeck,
}

impl DiscoverView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deck(&self) -> &SwipeDeck {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut SwipeDeck {
        &mut self.deck
    }

    /// Nothing loaded, nothing in flight, and no error to show
    pub fn needs_fetch(state: &CompatibilityState) -> bool {
        state.recommendations.is_empty() && !state.is_loading && state.error.is_none()
    }

    pub fn screen(&self, state: &CompatibilityState) -> DiscoverScreen {
        let cards = &state.recommendations;
        if state.is_loading && cards.is_empty() {
            return DiscoverScreen::Loading;
        }
        if let Some(error) = &state.error {
            return DiscoverScreen::Error(error.clone());
        }
        match self.deck.current(cards) {
            Some(card) if !self.deck.is_exhausted(cards.len()) => {
                DiscoverScreen::Card(Box::new(self.card_view(card, cards.len())))
            }
            _ => DiscoverScreen::NoMore,
        }
    }

    fn card_view(&self, card: &ProfileRecommendation, total: usize) -> CardView {
        let tier = CompatibilityTier::from_score(card.compatibility_score);
        CardView {
            id: card.id,
            display_name: card.display_name.clone(),
            avatar_id: card.avatar_id.clone(),
            bio: card.bio.clone(),
            interest_tags: card.interest_tags.clone(),
            game_experience: card.game_experience.clone(),
            score: card.compatibility_score,
            score_class: tier.text_class(),
            badge_class: tier.badge_class(),
            win_rate: card.win_rate(),
            games_played: card.total_games_played,
            position: self.deck.position_label(total),
            opacity: self.deck.card_opacity(),
            rotation_deg: self.deck.card_rotation_deg(),
        }
    }

    pub async fn load(&mut self, store: &Store) -> Result<(), ApiError> {
        self.deck.reset();
        store.fetch_recommendations().await?;
        Ok(())
    }

    /// Finish a drag; past the threshold the current card is decided.
    pub async fn release(&mut self, store: &Store) -> Result<Option<SwipeDecision>, ApiError> {
        match self.deck.release() {
            Some(decision) => {
                self.decide(store, decision).await?;
                Ok(Some(decision))
            }
            None => Ok(None),
        }
    }

    /// Like or pass the current card, as from the buttons under it.
    pub async fn decide(&mut self, store: &Store, decision: SwipeDecision) -> Result<(), ApiError> {
        let current = store
            .select(|s| self.deck.current(&s.compatibility.recommendations).map(|c| c.id))
            .await;
        let Some(profile_id) = current else {
            self.deck.cancel();
            return Ok(());
        };

        let outcome = match decision {
            SwipeDecision::Like => store.like_profile(profile_id).await,
            SwipeDecision::Pass => store.pass_profile(profile_id).await,
        };
        match outcome {
            // The decided card left the list, so the next one is already under the cursor
            Ok(_) => {
                self.deck.complete(true);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to record {:?} for {}: {}", decision, profile_id, e);
                self.deck.cancel();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::offline_store;
    use crate::store::MockRecommendations;
    use std::sync::Arc;
    use std::time::Duration;

    fn store() -> Store {
        offline_store().with_recommendations(Arc::new(MockRecommendations::new(Duration::ZERO)))
    }

    #[test]
    fn test_screens_before_loading() {
        let view = DiscoverView::new();
        let mut state = CompatibilityState::default();
        assert!(DiscoverView::needs_fetch(&state));
        assert_eq!(view.screen(&state), DiscoverScreen::NoMore);

        state.is_loading = true;
        assert_eq!(view.screen(&state), DiscoverScreen::Loading);

        state.is_loading = false;
        state.error = Some("Failed to fetch recommendations".to_string());
        assert!(!DiscoverView::needs_fetch(&state));
        assert!(matches!(view.screen(&state), DiscoverScreen::Error(_)));
    }

    #[tokio::test]
    async fn test_swipe_through_recommendations() {
        let store = store();
        let mut view = DiscoverView::new();
        view.load(&store).await.unwrap();

        let state = store.select(|s| s.compatibility.clone()).await;
        match view.screen(&state) {
            DiscoverScreen::Card(card) => {
                assert_eq!(card.display_name, "CyberNinja");
                assert_eq!(card.score_class, "text-green-400");
                assert_eq!(card.win_rate, 80);
                assert_eq!(card.position, "1 / 5");
            }
            other => panic!("unexpected screen {:?}", other),
        }

        view.deck_mut().begin_drag();
        view.deck_mut().drag_to(40.0);
        assert_eq!(view.release(&store).await.unwrap(), None);

        view.deck_mut().begin_drag();
        view.deck_mut().drag_to(-180.0);
        assert_eq!(view.release(&store).await.unwrap(), Some(SwipeDecision::Pass));

        let state = store.select(|s| s.compatibility.clone()).await;
        assert_eq!(state.recommendations.len(), 4);
        match view.screen(&state) {
            DiscoverScreen::Card(card) => {
                assert_eq!(card.display_name, "PixelMaster");
                assert_eq!(card.score_class, "text-yellow-400");
                assert_eq!(card.position, "1 / 4");
            }
            other => panic!("unexpected screen {:?}", other),
        }

        for _ in 0..4 {
            view.decide(&store, SwipeDecision::Like).await.unwrap();
        }
        let state = store.select(|s| s.compatibility.clone()).await;
        assert!(state.recommendations.is_empty());
        assert_eq!(view.screen(&state), DiscoverScreen::NoMore);
    }
}
