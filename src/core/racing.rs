//! Top-down car racing model: one oval track, simple arcade physics and lap
//! counting. Each client steps its own car and publishes the pose; the other
//! cars arrive through server state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::game_session::Player;

pub const MAX_SPEED: f64 = 8.0;
pub const MAX_REVERSE_SPEED: f64 = -4.0;
pub const ACCELERATION: f64 = 0.5;
pub const TURN_RATE: f64 = 3.0;
pub const FRICTION: f64 = 0.98;
pub const BOUNCE: f64 = -0.3;
pub const DEFAULT_MAX_LAPS: u32 = 3;
pub const COUNTDOWN_SECS: u32 = 3;

/// Start grid in the left lane, two abreast, below the finish line
const GRID_COLUMNS: [f64; 2] = [80.0, 120.0];
const GRID_FIRST_ROW_Y: f64 = 300.0;
const GRID_ROW_SPACING: f64 = 40.0;
const GRID_ROWS: usize = 6;

pub const PLAYER_COLORS: [&str; 8] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#ffeaa7", "#dda0dd", "#98d8c8", "#f7dc6f",
];

pub fn player_color(index: usize) -> &'static str {
    PLAYER_COLORS[index % PLAYER_COLORS.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Strict containment; points on the edge are outside
    fn contains(&self, x: f64, y: f64) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub width: f64,
    pub height: f64,
    /// Drivable area; leaving it is a collision
    pub outer: Rect,
    /// Infield; entering it is a collision
    pub inner: Rect,
    pub finish_line: Line,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            outer: Rect { x: 60.0, y: 60.0, width: 680.0, height: 480.0 },
            inner: Rect { x: 140.0, y: 140.0, width: 520.0, height: 320.0 },
            finish_line: Line { x: 100.0, y: 280.0, width: 100.0 },
        }
    }
}

impl Track {
    pub fn collides(&self, x: f64, y: f64) -> bool {
        let outside = x < self.outer.x
            || x > self.outer.x + self.outer.width
            || y < self.outer.y
            || y > self.outer.y + self.outer.height;
        outside || self.inner.contains(x, y)
    }

    /// True when moving from `from_y` to `to` crosses the finish line downward
    pub fn crosses_finish(&self, from_y: f64, to_x: f64, to_y: f64) -> bool {
        let line = &self.finish_line;
        from_y < line.y && to_y >= line.y && to_x >= line.x && to_x <= line.x + line.width
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Degrees, 0 pointing along +x
    pub angle: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: String,
    pub player_id: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub lap: u32,
    #[serde(default)]
    pub started_lap: bool,
    pub finished: bool,
    pub color: String,
}

impl Car {
    pub fn for_player(player_id: &str, index: usize) -> Self {
        let row = (index / GRID_COLUMNS.len()) % GRID_ROWS;
        Self {
            id: car_id(player_id),
            player_id: player_id.to_string(),
            x: GRID_COLUMNS[index % GRID_COLUMNS.len()],
            y: GRID_FIRST_ROW_Y + row as f64 * GRID_ROW_SPACING,
            angle: 90.0,
            speed: 0.0,
            lap: 0,
            started_lap: false,
            finished: false,
            color: player_color(index).to_string(),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            x: self.x,
            y: self.y,
            angle: self.angle,
            speed: self.speed,
        }
    }

    fn set_pose(&mut self, pose: Pose) {
        self.x = pose.x;
        self.y = pose.y;
        self.angle = pose.angle;
        self.speed = pose.speed;
    }
}

pub fn car_id(player_id: &str) -> String {
    format!("car_{}", player_id)
}

/// Pressed driving keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub accelerate: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
}

impl Controls {
    /// Map held keys (arrow keys or WASD, any case) to controls
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut controls = Controls::default();
        for key in keys {
            match key.to_lowercase().as_str() {
                "arrowup" | "w" => controls.accelerate = true,
                "arrowdown" | "s" => controls.brake = true,
                "arrowleft" | "a" => controls.left = true,
                "arrowright" | "d" => controls.right = true,
                _ => {}
            }
        }
        controls
    }
}

/// One frame of physics. A move into a wall keeps the old position and
/// bounces the speed back.
pub fn advance(pose: Pose, controls: Controls, track: &Track) -> Pose {
    let mut speed = pose.speed;
    let mut angle = pose.angle;

    if controls.accelerate {
        speed = (speed + ACCELERATION).min(MAX_SPEED);
    }
    if controls.brake {
        speed = (speed - ACCELERATION).max(MAX_REVERSE_SPEED);
    }
    if speed.abs() > 0.1 {
        let turn = TURN_RATE * (speed / MAX_SPEED);
        if controls.left {
            angle -= turn;
        }
        if controls.right {
            angle += turn;
        }
    }

    speed *= FRICTION;

    let radians = angle.to_radians();
    let x = pose.x + radians.cos() * speed;
    let y = pose.y + radians.sin() * speed;

    if track.collides(x, y) {
        Pose { x: pose.x, y: pose.y, angle, speed: speed * BOUNCE }
    } else {
        Pose { x, y, angle, speed }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceStatus {
    #[default]
    Waiting,
    Countdown,
    Racing,
    Finished,
}

/// Move payloads sent to the game server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RacingAction {
    RaceStarted,
    CarPositionUpdate {
        #[serde(rename = "carId")]
        car_id: String,
        position: Pose,
        lap: u32,
    },
    RaceFinished {
        #[serde(rename = "carId")]
        car_id: String,
        position: Pose,
        lap: u32,
        #[serde(rename = "finishTime")]
        finish_time: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacingState {
    pub track: Track,
    pub cars: Vec<Car>,
    pub race_status: RaceStatus,
    pub max_laps: u32,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub countdown: u32,
    #[serde(default)]
    pub winner: Option<String>,
}

impl Default for RacingState {
    fn default() -> Self {
        Self {
            track: Track::default(),
            cars: Vec::new(),
            race_status: RaceStatus::Waiting,
            max_laps: DEFAULT_MAX_LAPS,
            start_time: 0,
            countdown: 0,
            winner: None,
        }
    }
}

impl RacingState {
    /// Grid every player on the start straight in join order
    pub fn for_players(players: &[Player]) -> Self {
        Self {
            cars: players
                .iter()
                .enumerate()
                .map(|(i, p)| Car::for_player(&p.id, i))
                .collect(),
            ..Self::default()
        }
    }

    /// Overlay fields pushed by the server under `gameData.racing`
    pub fn sync_from(&mut self, remote: &Value) -> Result<(), serde_json::Error> {
        let mut merged = serde_json::to_value(&*self)?;
        if let (Some(current), Some(remote)) = (merged.as_object_mut(), remote.as_object()) {
            for (key, value) in remote {
                current.insert(key.clone(), value.clone());
            }
        }
        *self = serde_json::from_value(merged)?;
        Ok(())
    }

    pub fn car(&self, car_id: &str) -> Option<&Car> {
        self.cars.iter().find(|c| c.id == car_id)
    }

    pub fn start_countdown(&mut self) -> bool {
        if self.race_status != RaceStatus::Waiting {
            return false;
        }
        self.race_status = RaceStatus::Countdown;
        self.countdown = COUNTDOWN_SECS;
        true
    }

    /// Called once a second during the countdown.
    pub fn countdown_tick(&mut self) -> Option<RacingAction> {
        if self.race_status != RaceStatus::Countdown {
            return None;
        }
        if self.countdown > 1 {
            self.countdown -= 1;
            return None;
        }
        self.countdown = 0;
        self.race_status = RaceStatus::Racing;
        self.start_time = Utc::now().timestamp_millis();
        Some(RacingAction::RaceStarted)
    }

    /// Advance the local car by one frame and report its new pose.
    pub fn step(&mut self, car_id: &str, controls: Controls) -> Option<RacingAction> {
        if self.race_status != RaceStatus::Racing {
            return None;
        }
        let max_laps = self.max_laps;
        let track = self.track.clone();
        let car = self.cars.iter_mut().find(|c| c.id == car_id)?;
        if car.finished {
            return None;
        }

        let before = car.pose();
        let after = advance(before, controls, &track);
        car.set_pose(after);

        if track.crosses_finish(before.y, after.x, after.y) {
            // The first crossing only starts lap counting.
            if car.started_lap {
                car.lap += 1;
            } else {
                car.started_lap = true;
            }
        }

        if car.lap >= max_laps {
            car.finished = true;
            let action = RacingAction::RaceFinished {
                car_id: car.id.clone(),
                position: after,
                lap: car.lap,
                finish_time: Utc::now().timestamp_millis(),
            };
            let winner = car.player_id.clone();
            self.race_status = RaceStatus::Finished;
            self.winner.get_or_insert(winner);
            return Some(action);
        }

        Some(RacingAction::CarPositionUpdate {
            car_id: car.id.clone(),
            position: after,
            lap: car.lap,
        })
    }

    /// Cars ordered by lap, leaders first; ties keep grid order
    pub fn leaderboard(&self) -> Vec<&Car> {
        let mut cars: Vec<&Car> = self.cars.iter().collect();
        cars.sort_by(|a, b| b.lap.cmp(&a.lap));
        cars
    }
}
