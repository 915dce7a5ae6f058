use std::collections::HashMap;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameType {
    Chess,
    CarRacing,
    Uno,
    Rummy,
    Ludo,
    TruthDare,
    MemeBattle,
    Fighting,
    BubbleBlast,
    MathMaster,
}

/// Lobby capacity when no game type is chosen or it is unknown
pub const DEFAULT_LOBBY_CAPACITY: usize = 8;

impl GameType {
    pub const ALL: [GameType; 10] = [
        GameType::Chess,
        GameType::CarRacing,
        GameType::Uno,
        GameType::Rummy,
        GameType::Ludo,
        GameType::TruthDare,
        GameType::MemeBattle,
        GameType::Fighting,
        GameType::BubbleBlast,
        GameType::MathMaster,
    ];

    /// Name used by the game server, e.g. `CAR_RACING`
    pub fn wire_name(&self) -> &'static str {
        match self {
            GameType::Chess => "CHESS",
            GameType::CarRacing => "CAR_RACING",
            GameType::Uno => "UNO",
            GameType::Rummy => "RUMMY",
            GameType::Ludo => "LUDO",
            GameType::TruthDare => "TRUTH_DARE",
            GameType::MemeBattle => "MEME_BATTLE",
            GameType::Fighting => "FIGHTING",
            GameType::BubbleBlast => "BUBBLE_BLAST",
            GameType::MathMaster => "MATH_MASTER",
        }
    }

    /// Name used when creating private lobbies, e.g. `racing`
    pub fn slug(&self) -> &'static str {
        match self {
            GameType::Chess => "chess",
            GameType::CarRacing => "racing",
            GameType::Uno => "uno",
            GameType::Rummy => "rummy",
            GameType::Ludo => "ludo",
            GameType::TruthDare => "truth-or-dare",
            GameType::MemeBattle => "meme-battle",
            GameType::Fighting => "fighting",
            GameType::BubbleBlast => "bubble-blast",
            GameType::MathMaster => "math-master",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GameType::Chess => "Chess",
            GameType::CarRacing => "Car Racing",
            GameType::Uno => "Uno",
            GameType::Rummy => "Rummy",
            GameType::Ludo => "Ludo",
            GameType::TruthDare => "Truth or Dare",
            GameType::MemeBattle => "Meme Battle",
            GameType::Fighting => "Fighting",
            GameType::BubbleBlast => "Bubble Blast",
            GameType::MathMaster => "Math Master",
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            GameType::Chess | GameType::Fighting => 2,
            GameType::CarRacing | GameType::Ludo => 4,
            GameType::Rummy => 6,
            _ => DEFAULT_LOBBY_CAPACITY,
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.wire_name() == name)
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.slug() == slug)
    }
}

/// Capacity of a private lobby for the given game slug
pub fn lobby_capacity(slug: Option<&str>) -> usize {
    slug.and_then(GameType::from_slug)
        .map(|g| g.capacity())
        .unwrap_or(DEFAULT_LOBBY_CAPACITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Waiting,
    Active,
    Paused,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_id: String,
    #[serde(default)]
    pub is_connected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_id: Option<String>,
    #[serde(default)]
    pub is_connected: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMove {
    pub id: String,
    pub player_id: String,
    pub move_type: String,
    #[serde(default)]
    pub move_data: Value,
    /// Milliseconds since the epoch
    pub timestamp: i64,
}

/// A move before it is stamped with an id and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMove {
    pub player_id: String,
    pub move_type: String,
    #[serde(default)]
    pub move_data: Value,
}

/// Partial state pushed by the server; present fields replace the current ones
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePatch {
    pub players: Option<Vec<Player>>,
    pub current_player: Option<String>,
    pub game_data: Option<Value>,
    pub status: Option<GameStatus>,
    pub timer: Option<u32>,
    pub scores: Option<HashMap<String, i64>>,
    pub moves: Option<Vec<GameMove>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub session_id: String,
    pub game_type: String,
    pub players: Vec<Player>,
    pub current_player: String,
    pub game_data: Value,
    pub status: GameStatus,
    #[serde(default)]
    pub timer: Option<u32>,
    #[serde(default)]
    pub scores: HashMap<String, i64>,
    pub moves: Vec<GameMove>,
}

impl GameState {
    pub fn new(session_id: impl Into<String>, game_type: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            game_type: game_type.into(),
            players: Vec::new(),
            current_player: String::new(),
            game_data: Value::Object(Default::default()),
            status: GameStatus::Waiting,
            timer: None,
            scores: HashMap::new(),
            moves: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<GameType> {
        GameType::from_wire(&self.game_type)
    }

    pub fn apply(&mut self, patch: GameStatePatch) {
        if let Some(players) = patch.players {
            self.players = players;
        }
        if let Some(current) = patch.current_player {
            self.current_player = current;
        }
        if let Some(data) = patch.game_data {
            self.game_data = data;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if patch.timer.is_some() {
            self.timer = patch.timer;
        }
        if let Some(scores) = patch.scores {
            self.scores = scores;
        }
        if let Some(moves) = patch.moves {
            self.moves = moves;
        }
    }

    /// Record a move, stamping it with a generated id and the current time
    pub fn add_move(&mut self, new_move: NewMove) -> GameMove {
        let now = Utc::now().timestamp_millis();
        let game_move = GameMove {
            id: format!("move_{}_{}", now, random_suffix()),
            player_id: new_move.player_id,
            move_type: new_move.move_type,
            move_data: new_move.move_data,
            timestamp: now,
        };
        self.moves.push(game_move.clone());
        game_move
    }

    /// Record a move received from the server as-is
    pub fn push_move(&mut self, game_move: GameMove) {
        self.moves.push(game_move);
    }

    pub fn update_player(&mut self, player_id: &str, patch: PlayerPatch) {
        if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
            if let Some(name) = patch.display_name {
                player.display_name = name;
            }
            if let Some(avatar) = patch.avatar_id {
                player.avatar_id = avatar;
            }
            if let Some(connected) = patch.is_connected {
                player.is_connected = connected;
            }
        }
    }

    /// Add a player, replacing any existing entry with the same id
    pub fn add_player(&mut self, player: Player) {
        self.players.retain(|p| p.id != player.id);
        self.players.push(player);
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.players.retain(|p| p.id != player_id);
    }

    pub fn update_score(&mut self, player_id: &str, score: i64) {
        self.scores.insert(player_id.to_string(), score);
    }

    /// Back to waiting; players and identity are kept
    pub fn reset(&mut self) {
        self.game_data = Value::Object(Default::default());
        self.status = GameStatus::Waiting;
        self.moves.clear();
        self.scores.clear();
    }
}

fn random_suffix() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
