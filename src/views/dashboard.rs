use crate::models::GameExperience;
use crate::store::RootState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardCard {
    pub title: &'static str,
    pub description: &'static str,
    pub route: &'static str,
}

pub const DASHBOARD_CARDS: [DashboardCard; 4] = [
    DashboardCard {
        title: "Meet People",
        description: "Discover compatible gaming partners through our Smart Connect algorithm",
        route: "/discover",
    },
    DashboardCard {
        title: "The Room (Lounge)",
        description: "Join virtual lobbies with real-time chat and see who's online",
        route: "/room",
    },
    DashboardCard {
        title: "Game with Friend",
        description: "Create private lobbies with invite codes for your gaming crew",
        route: "/private-lobby",
    },
    DashboardCard {
        title: "Play with Stranger",
        description: "Enter the matchmaking queue and face random opponents",
        route: "/matchmaking",
    },
];

/// Header and stats shown on the dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub display_name: String,
    pub initial: char,
    pub experience: GameExperience,
    pub balance: f64,
    pub daily_bonus_available: bool,
    pub win_rate: u32,
    pub games_played: u32,
}

impl DashboardView {
    pub fn from_state(state: &RootState) -> Self {
        let profile = state.profile.profile.as_ref();
        let display_name = profile
            .map(|p| p.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "User".to_string());
        let initial = display_name.chars().next().unwrap_or('U');

        Self {
            initial,
            display_name,
            experience: profile
                .map(|p| p.game_experience)
                .unwrap_or(GameExperience::Beginner),
            balance: state.gamecoin.balance,
            daily_bonus_available: state.gamecoin.daily_bonus_available,
            win_rate: profile.map(|p| p.win_rate()).unwrap_or(0),
            games_played: profile.map(|p| p.total_games_played).unwrap_or(0),
        }
    }

    pub fn balance_label(&self) -> String {
        format!("{} GameCoins", self.balance.round() as i64)
    }

    pub fn win_rate_label(&self) -> String {
        format!("{}%", self.win_rate)
    }
}

pub fn route_for(title: &str) -> Option<&'static str> {
    DASHBOARD_CARDS
        .iter()
        .find(|card| card.title == title)
        .map(|card| card.route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;

    #[test]
    fn test_defaults_without_profile() {
        let view = DashboardView::from_state(&RootState::default());
        assert_eq!(view.display_name, "User");
        assert_eq!(view.initial, 'U');
        assert_eq!(view.experience, GameExperience::Beginner);
        assert!(view.daily_bonus_available);
        assert_eq!(view.win_rate_label(), "0%");
    }

    #[test]
    fn test_stats_from_slices() {
        let mut state = RootState::default();
        state.gamecoin.balance = 1250.0;
        state.gamecoin.daily_bonus_available = false;
        state.profile.profile = Some(Profile {
            id: "1".to_string(),
            user_id: "1".to_string(),
            avatar_id: "cyber-warrior-03".to_string(),
            display_name: "StealthGamer".to_string(),
            bio: String::new(),
            interest_tags: Vec::new(),
            game_experience: GameExperience::Advanced,
            games_played: Vec::new(),
            total_games_won: 140,
            total_games_played: 200,
            created_at: None,
            updated_at: None,
        });

        let view = DashboardView::from_state(&state);
        assert_eq!(view.initial, 'S');
        assert_eq!(view.win_rate_label(), "70%");
        assert_eq!(view.balance_label(), "1250 GameCoins");
        assert!(!view.daily_bonus_available);
    }

    #[test]
    fn test_card_routes() {
        assert_eq!(route_for("Play with Stranger"), Some("/matchmaking"));
        assert_eq!(route_for("Leaderboard"), None);
    }
}
