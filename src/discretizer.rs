// src/discretizer.rs
//
// State discretizer: maps a PhysicalState onto the finite key space the
// tabular agent learns over. Pure, total, deterministic.
//
// Bucket granularity is the primary tuning lever: coarse enough that the
// reachable key space stays small relative to the training budget, fine
// enough that optimal actions still differ across buckets.

use serde::{Deserialize, Serialize};

use crate::config::DiscretizerConfig;
use crate::drone::PhysicalState;
use crate::types::WeatherKind;

/// Bump when the key layout changes; persisted tables carry this so a
/// stale snapshot is rejected instead of silently misread.
pub const KEY_VERSION: u32 = 1;

/// Immutable bucketed state key.
///
/// Two physical states with equal bucket values produce an identical key;
/// this is what lets the value table generalize within a bucket.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DiscreteStateKey {
    /// Position bucket (horizontal cells grouped by granularity; altitude
    /// kept at full resolution — it is already coarse).
    pub cell: (i16, i16, i16),
    /// Battery band, 0 = nearly empty.
    pub battery_band: u8,
    pub has_cargo: bool,
    pub weather: WeatherKind,
    /// Dominant-axis heading toward the current objective (0..=5 indexes
    /// Direction::ALL; 6 = objective reached).
    pub heading: u8,
    /// Obstacle-proximity bitmask.
    pub obstacles: u8,
}

/// Key heading value meaning "within reach of the objective".
pub const HEADING_AT_OBJECTIVE: u8 = 6;

#[derive(Debug, Clone)]
pub struct Discretizer {
    cfg: DiscretizerConfig,
}

impl Discretizer {
    pub fn new(cfg: DiscretizerConfig) -> Self {
        Self { cfg }
    }

    /// Bucket a physical state. Never fails; stable across calls on an
    /// unmodified state.
    pub fn discretize(&self, state: &PhysicalState) -> DiscreteStateKey {
        let g = self.cfg.cell_granularity.max(1);
        let p = state.position;

        let battery_band = self.battery_band(state.battery);

        let target = state.objective();
        let (dx, dy, dz) = (target.x - p.x, target.y - p.y, target.z - p.z);
        let heading = if dx.abs() <= 1 && dy.abs() <= 1 && dz.abs() <= 1 {
            HEADING_AT_OBJECTIVE
        } else if dx.abs() >= dy.abs() && dx.abs() >= dz.abs() {
            if dx > 0 {
                2 // east
            } else {
                3 // west
            }
        } else if dy.abs() >= dz.abs() {
            if dy > 0 {
                1 // south
            } else {
                0 // north
            }
        } else if dz > 0 {
            4 // up
        } else {
            5 // down
        };

        DiscreteStateKey {
            cell: ((p.x / g) as i16, (p.y / g) as i16, p.z as i16),
            battery_band,
            has_cargo: state.has_cargo,
            weather: state.weather,
            heading,
            obstacles: state.obstacles.0,
        }
    }

    fn battery_band(&self, battery: f64) -> u8 {
        let bands = self.cfg.battery_bands.max(1);
        let frac = (battery / 100.0).clamp(0.0, 1.0);
        ((frac * bands as f64) as u8).min(bands - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{DirectionFlags, Position};

    fn state_at(x: i32, y: i32, z: i32, battery: f64) -> PhysicalState {
        PhysicalState {
            position: Position::new(x, y, z),
            battery,
            has_cargo: false,
            pickup: Position::new(x, y, z),
            delivery: Position::new(25, 25, 4),
            weather: WeatherKind::Clear,
            wind_speed: 10.0,
            obstacles: DirectionFlags::EMPTY,
            no_fly_adjacent: DirectionFlags::EMPTY,
            on_charging_cell: false,
            elapsed_steps: 0,
            blocked_streak: 0,
            storm_exposure: 0,
        }
    }

    fn discretizer() -> Discretizer {
        Discretizer::new(Config::default().discretizer)
    }

    #[test]
    fn repeated_calls_yield_equal_keys() {
        let d = discretizer();
        let s = state_at(7, 12, 3, 63.0);
        assert_eq!(d.discretize(&s), d.discretize(&s));
    }

    #[test]
    fn equal_buckets_collapse_to_one_key() {
        let d = discretizer();
        // Same 5-cell bucket, same battery band, same everything else.
        let a = state_at(6, 11, 3, 63.0);
        let b = state_at(7, 12, 3, 68.0);
        assert_eq!(d.discretize(&a), d.discretize(&b));
    }

    #[test]
    fn battery_bands_cover_the_range() {
        let d = discretizer();
        assert_eq!(d.discretize(&state_at(0, 0, 1, 0.0)).battery_band, 0);
        assert_eq!(d.discretize(&state_at(0, 0, 1, 100.0)).battery_band, 4);
        assert_eq!(d.discretize(&state_at(0, 0, 1, 9.0)).battery_band, 0);
        assert_eq!(d.discretize(&state_at(0, 0, 1, 55.0)).battery_band, 2);
    }

    #[test]
    fn heading_tracks_the_objective() {
        let d = discretizer();
        let mut s = state_at(5, 5, 4, 80.0);
        s.has_cargo = true; // objective = delivery at (25, 25, 4)
        let key = d.discretize(&s);
        assert_eq!(key.heading, 2); // east dominates

        s.position = Position::new(25, 24, 4);
        assert_eq!(d.discretize(&s).heading, HEADING_AT_OBJECTIVE);
    }

    #[test]
    fn cargo_flag_splits_the_key() {
        let d = discretizer();
        let mut s = state_at(10, 10, 3, 80.0);
        let without = d.discretize(&s);
        s.has_cargo = true;
        let with = d.discretize(&s);
        assert_ne!(without, with);
    }
}
