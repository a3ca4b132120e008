// src/types.rs
//
// Common shared types for the Skycourier decision core.

use serde::{Deserialize, Serialize};

/// Grid position (x east, y south, z altitude level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Manhattan distance across all three axes.
    pub fn manhattan(&self, other: &Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    /// One cell over in the given direction (no bounds check).
    pub fn step(&self, dir: Direction) -> Position {
        let (dx, dy, dz) = dir.delta();
        Position::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// The six movement directions on the grid.
///
/// North is -y, south is +y, east is +x, west is -x (screen convention,
/// matching the city generator's row-major maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Up,
        Direction::Down,
    ];

    pub const HORIZONTAL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn delta(&self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, -1, 0),
            Direction::South => (0, 1, 0),
            Direction::East => (1, 0, 0),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 0, 1),
            Direction::Down => (0, 0, -1),
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Direction::North => 1 << 0,
            Direction::South => 1 << 1,
            Direction::East => 1 << 2,
            Direction::West => 1 << 3,
            Direction::Up => 1 << 4,
            Direction::Down => 1 << 5,
        }
    }
}

/// Bitmask over the six directions, used for proximity sensor summaries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DirectionFlags(pub u8);

impl DirectionFlags {
    pub const EMPTY: DirectionFlags = DirectionFlags(0);

    pub fn set(&mut self, dir: Direction) {
        self.0 |= dir.bit();
    }

    pub fn contains(&self, dir: Direction) -> bool {
        self.0 & dir.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// The fixed discrete action set.
///
/// `Action::ALL` defines the canonical ordering used everywhere ties must be
/// broken deterministically (greedy selection, admissible-set iteration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    MoveNorth,
    MoveSouth,
    MoveEast,
    MoveWest,
    MoveUp,
    MoveDown,
    Hover,
    Charge,
    Pickup,
    Deliver,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::MoveNorth,
        Action::MoveSouth,
        Action::MoveEast,
        Action::MoveWest,
        Action::MoveUp,
        Action::MoveDown,
        Action::Hover,
        Action::Charge,
        Action::Pickup,
        Action::Deliver,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Stable lowercase name used in logs / telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::MoveNorth => "move_north",
            Action::MoveSouth => "move_south",
            Action::MoveEast => "move_east",
            Action::MoveWest => "move_west",
            Action::MoveUp => "move_up",
            Action::MoveDown => "move_down",
            Action::Hover => "hover",
            Action::Charge => "charge",
            Action::Pickup => "pickup",
            Action::Deliver => "deliver",
        }
    }

    /// Movement direction, if this action moves the drone.
    pub fn movement(&self) -> Option<Direction> {
        match self {
            Action::MoveNorth => Some(Direction::North),
            Action::MoveSouth => Some(Direction::South),
            Action::MoveEast => Some(Direction::East),
            Action::MoveWest => Some(Direction::West),
            Action::MoveUp => Some(Direction::Up),
            Action::MoveDown => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn is_movement(&self) -> bool {
        self.movement().is_some()
    }
}

/// Weather category as seen by the discretizer and the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeatherKind {
    Clear,
    Wind,
    Rain,
    Storm,
}

impl WeatherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherKind::Clear => "clear",
            WeatherKind::Wind => "wind",
            WeatherKind::Rain => "rain",
            WeatherKind::Storm => "storm",
        }
    }
}

/// Why an episode ended. Each terminal condition sets exactly one cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalCause {
    /// Cargo delivered at the destination cell.
    Delivered,
    /// Battery reached zero.
    BatteryExhausted,
    /// Blocked movement beyond the retry threshold.
    Collision,
    /// Entered a no-fly cell and was intercepted.
    NoFlyViolation,
    /// Sustained storm exposure beyond the damage threshold.
    StormCrash,
    /// Step-count cap exceeded.
    StepLimit,
}

impl TerminalCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalCause::Delivered => "delivered",
            TerminalCause::BatteryExhausted => "battery_exhausted",
            TerminalCause::Collision => "collision",
            TerminalCause::NoFlyViolation => "no_fly_violation",
            TerminalCause::StormCrash => "storm_crash",
            TerminalCause::StepLimit => "step_limit",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminalCause::Delivered)
    }
}

/// Which branch of the fusion state machine produced the final action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionPath {
    /// Agent's preferred action was admissible and used as-is.
    Exploit,
    /// Preferred action rejected; best admissible alternative chosen.
    Override,
    /// Admissible set collapsed to the designated fail-safe action.
    FailSafe,
}

impl DecisionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPath::Exploit => "exploit",
            DecisionPath::Override => "override",
            DecisionPath::FailSafe => "fail_safe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_ordering_is_stable() {
        // The canonical ordering is a contract: greedy tie-breaking and the
        // admissible-set iteration both depend on it.
        assert_eq!(Action::ALL[0], Action::MoveNorth);
        assert_eq!(Action::ALL[6], Action::Hover);
        assert_eq!(Action::ALL[9], Action::Deliver);
        assert_eq!(Action::COUNT, 10);
    }

    #[test]
    fn direction_flags_roundtrip() {
        let mut flags = DirectionFlags::EMPTY;
        assert!(flags.is_empty());
        flags.set(Direction::North);
        flags.set(Direction::Down);
        assert!(flags.contains(Direction::North));
        assert!(flags.contains(Direction::Down));
        assert!(!flags.contains(Direction::East));
    }

    #[test]
    fn movement_actions_map_to_directions() {
        for dir in Direction::ALL {
            let action = Action::ALL
                .iter()
                .find(|a| a.movement() == Some(dir))
                .copied();
            assert!(action.is_some(), "no action moves {:?}", dir);
        }
        assert!(Action::Hover.movement().is_none());
        assert!(Action::Charge.movement().is_none());
    }

    #[test]
    fn position_step_matches_delta() {
        let p = Position::new(5, 5, 3);
        assert_eq!(p.step(Direction::North), Position::new(5, 4, 3));
        assert_eq!(p.step(Direction::Up), Position::new(5, 5, 4));
        assert_eq!(p.manhattan(&Position::new(5, 4, 4)), 2);
    }
}
