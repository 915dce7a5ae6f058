//! View models: what each screen shows, derived from store state.

pub mod dashboard;
pub mod discover;
pub mod game_shell;
pub mod lobby;

pub use dashboard::{DashboardCard, DashboardView, DASHBOARD_CARDS};
pub use discover::{CardView, DiscoverScreen, DiscoverView};
pub use game_shell::{ChessView, GameScreen, GameShell, GameShellError, GameView, RacingView};
pub use lobby::{schedule_error_clear, LobbyView};
