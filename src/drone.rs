// src/drone.rs
//
// Physical drone state and the battery / cargo bookkeeping applied by
// the environment step function.

use serde::{Deserialize, Serialize};

use crate::config::DroneConfig;
use crate::types::{Direction, DirectionFlags, Position, WeatherKind};

/// Full physical state visible to the discretizer and rule engine.
///
/// Invariants maintained by the environment:
/// - `position` stays within grid bounds,
/// - `battery` stays within [0, 100],
/// - `has_cargo` is true only between a pickup and the matching delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalState {
    pub position: Position,
    /// Battery charge as a percentage of capacity.
    pub battery: f64,
    pub has_cargo: bool,
    /// Pickup origin cell for this mission.
    pub pickup: Position,
    /// Delivery destination cell for this mission.
    pub delivery: Position,
    pub weather: WeatherKind,
    /// Current wind speed in km/h.
    pub wind_speed: f64,
    /// Directions blocked by buildings, clearance margins, or grid bounds.
    pub obstacles: DirectionFlags,
    /// Horizontal directions leading into a no-fly zone.
    pub no_fly_adjacent: DirectionFlags,
    pub on_charging_cell: bool,
    pub elapsed_steps: u32,
    /// Consecutive blocked movement attempts.
    pub blocked_streak: u32,
    /// Consecutive steps spent inside a storm.
    pub storm_exposure: u32,
}

impl PhysicalState {
    /// Mission target tolerance: a cell counts as reached within one cell
    /// on each axis, matching the dispatch system's GPS envelope.
    fn within_reach(a: Position, b: Position) -> bool {
        (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1 && (a.z - b.z).abs() <= 1
    }

    pub fn at_pickup(&self) -> bool {
        Self::within_reach(self.position, self.pickup)
    }

    pub fn at_delivery(&self) -> bool {
        Self::within_reach(self.position, self.delivery)
    }

    /// The cell the mission currently steers toward.
    pub fn objective(&self) -> Position {
        if self.has_cargo {
            self.delivery
        } else {
            self.pickup
        }
    }

    pub fn distance_to_objective(&self) -> i32 {
        self.position.manhattan(&self.objective())
    }

    pub fn battery_fraction(&self) -> f64 {
        self.battery / 100.0
    }

    /// Drain `energy_mah`, converted to battery percentage and clamped at
    /// empty. Returns true if the battery is now exhausted.
    pub fn drain(&mut self, energy_mah: f64, cfg: &DroneConfig) -> bool {
        self.battery -= (energy_mah / cfg.battery_capacity) * 100.0;
        if self.battery <= 0.0 {
            self.battery = 0.0;
            return true;
        }
        false
    }

    /// One charge tick at a station.
    pub fn charge_tick(&mut self, cfg: &DroneConfig) {
        self.battery = (self.battery + (cfg.charge_rate / cfg.battery_capacity) * 100.0).min(100.0);
    }

    /// Energy cost of a one-cell move in `dir`, before weather scaling.
    /// Descent costs half of a climb; cargo adds a weight penalty to
    /// horizontal travel.
    pub fn movement_energy(&self, dir: Direction, cfg: &DroneConfig) -> f64 {
        let base = match dir {
            Direction::Up => cfg.energy_per_level,
            Direction::Down => cfg.energy_per_level * 0.5,
            _ => cfg.energy_per_cell,
        };
        if self.has_cargo && matches!(dir, Direction::North | Direction::South | Direction::East | Direction::West) {
            base * cfg.cargo_drain_factor
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> PhysicalState {
        PhysicalState {
            position: Position::new(5, 5, 3),
            battery: 100.0,
            has_cargo: false,
            pickup: Position::new(5, 5, 3),
            delivery: Position::new(20, 20, 3),
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

    #[test]
    fn objective_follows_cargo_flag() {
        let mut s = state();
        assert_eq!(s.objective(), s.pickup);
        s.has_cargo = true;
        assert_eq!(s.objective(), s.delivery);
    }

    #[test]
    fn reach_tolerance_is_one_cell() {
        let mut s = state();
        s.position = Position::new(6, 4, 4);
        assert!(s.at_pickup());
        s.position = Position::new(7, 5, 3);
        assert!(!s.at_pickup());
    }

    #[test]
    fn drain_clamps_at_zero() {
        let cfg = Config::default().drone;
        let mut s = state();
        s.battery = 0.5;
        let exhausted = s.drain(cfg.battery_capacity, &cfg);
        assert!(exhausted);
        assert_eq!(s.battery, 0.0);
    }

    #[test]
    fn charge_caps_at_full() {
        let cfg = Config::default().drone;
        let mut s = state();
        s.battery = 99.0;
        s.charge_tick(&cfg);
        assert_eq!(s.battery, 100.0);
    }

    #[test]
    fn cargo_increases_horizontal_drain_only() {
        let cfg = Config::default().drone;
        let mut s = state();
        let empty = s.movement_energy(Direction::North, &cfg);
        s.has_cargo = true;
        let loaded = s.movement_energy(Direction::North, &cfg);
        assert!(loaded > empty);
        assert_eq!(
            s.movement_energy(Direction::Up, &cfg),
            cfg.energy_per_level
        );
    }

    #[test]
    fn descent_is_cheaper_than_climb() {
        let cfg = Config::default().drone;
        let s = state();
        assert!(s.movement_energy(Direction::Down, &cfg) < s.movement_energy(Direction::Up, &cfg));
    }
}
