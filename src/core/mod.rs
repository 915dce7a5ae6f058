// Client-side game and matching logic
pub mod chess;
pub mod game_session;
pub mod invite;
pub mod racing;
pub mod stats;
pub mod swipe;

pub use chess::{ChessAction, ChessState, ChessStatus, Color, Square};
pub use game_session::{lobby_capacity, GameMove, GameState, GameStatePatch, GameStatus, GameType, NewMove, Player};
pub use invite::{generate_invite_code, is_valid_invite_code, normalize_invite_code};
pub use racing::{Controls, RaceStatus, RacingAction, RacingState};
pub use stats::{win_rate, CompatibilityTier};
pub use swipe::{SwipeDecision, SwipeDeck};
