// src/env.rs
//
// Delivery environment: reset/step interface over the city, weather and
// drone state. All state transitions are deterministic given the seed.
//
// The step function owns every reward weight application and terminal
// condition; callers never mutate PhysicalState directly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::city::CityMap;
use crate::config::{Config, ConfigError};
use crate::drone::PhysicalState;
use crate::types::{Action, Position, TerminalCause, WeatherKind};
use crate::weather::WeatherSystem;

/// Result of a single environment step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// The physical state after the action resolved.
    pub state: PhysicalState,
    /// Scalar reward for this step.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Additional information about the step.
    pub info: StepInfo,
}

/// Step metadata surfaced to the metrics sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub step: u32,
    pub terminal_cause: Option<TerminalCause>,
    pub battery: f64,
    pub distance_to_objective: i32,
    pub weather: WeatherKind,
    pub wind_speed: f64,
    /// The attempted movement was blocked this step.
    pub blocked: bool,
}

/// Gridded-city delivery environment.
///
/// The city layout is fixed for the lifetime of the environment (one map
/// seed); `reset` re-rolls mission endpoints and weather for each episode.
pub struct DeliveryEnv {
    cfg: Config,
    city: CityMap,
    weather: WeatherSystem,
    state: PhysicalState,
    rng: ChaCha8Rng,
    seed: u64,
    done: bool,
    terminal: Option<TerminalCause>,
}

impl DeliveryEnv {
    /// Create an environment. Fails on an invalid configuration; this is
    /// the only fallible entry point — steps never fail.
    pub fn new(cfg: Config, map_seed: u64) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let city = CityMap::generate(&cfg, map_seed);
        let mut rng = ChaCha8Rng::seed_from_u64(map_seed);
        let weather = WeatherSystem::new(cfg.weather.clone(), &mut rng);

        let mut env = Self {
            state: placeholder_state(&city),
            cfg,
            city,
            weather,
            rng,
            seed: map_seed,
            done: false,
            terminal: None,
        };
        env.reset(Some(map_seed));
        Ok(env)
    }

    /// Reset for a new episode: fresh mission endpoints, full battery, no
    /// cargo, weather re-sampled from the scenario. Returns the initial
    /// state.
    pub fn reset(&mut self, seed: Option<u64>) -> PhysicalState {
        let seed = seed.unwrap_or_else(|| self.rng.gen());
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let origin = self.city.random_hospital(&mut rng);
        let destination = self.city.random_lab(&mut rng);
        self.reset_with_mission(seed, origin, destination)
    }

    /// Reset with externally designated mission endpoints (ground cells).
    /// The drone spawns at the origin's minimum safe altitude.
    pub fn reset_with_mission(
        &mut self,
        seed: u64,
        origin: (i32, i32),
        destination: (i32, i32),
    ) -> PhysicalState {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.weather.reset(&mut self.rng);

        let (hx, hy) = origin;
        let (lx, ly) = destination;
        let pickup = Position::new(hx, hy, self.city.min_safe_altitude(hx, hy));
        let delivery = Position::new(lx, ly, self.city.min_safe_altitude(lx, ly));

        self.state = PhysicalState {
            position: pickup,
            battery: 100.0,
            has_cargo: false,
            pickup,
            delivery,
            weather: self.weather.kind(),
            wind_speed: self.weather.wind_speed(),
            obstacles: Default::default(),
            no_fly_adjacent: Default::default(),
            on_charging_cell: false,
            elapsed_steps: 0,
            blocked_streak: 0,
            storm_exposure: 0,
        };
        self.done = false;
        self.terminal = None;
        self.refresh_senses();
        self.state.clone()
    }

    /// Execute one action. `(state, action) -> (next_state, reward, done)`.
    pub fn step(&mut self, action: Action) -> StepOutcome {
        if self.done {
            // Terminal echo: stepping a finished episode is a no-op.
            return StepOutcome {
                state: self.state.clone(),
                reward: 0.0,
                done: true,
                info: self.info(false),
            };
        }

        let rw = self.cfg.rewards.clone();
        let dr = self.cfg.drone.clone();

        self.state.elapsed_steps += 1;
        self.weather.update(&mut self.rng);
        self.state.weather = self.weather.kind();
        self.state.wind_speed = self.weather.wind_speed();
        let weather_mult = self.weather.energy_multiplier();

        // Airframe failure precedes everything else.
        if self.weather.is_extreme() {
            return self.finish(TerminalCause::StormCrash, rw.storm_crash, false);
        }

        let mut reward = 0.0;
        let mut blocked = false;
        let mut energy = dr.hover_energy;

        match action {
            _ if action.is_movement() => {
                let dir = action.movement().expect("movement action");
                let next = self.state.position.step(dir);
                if !self.city.in_bounds(next) || self.city.is_blocked(next) {
                    blocked = true;
                    reward += rw.collision;
                    self.state.blocked_streak += 1;
                    if self.state.blocked_streak > self.cfg.episode.collision_retry_limit {
                        return self.finish(TerminalCause::Collision, reward, blocked);
                    }
                } else {
                    self.state.blocked_streak = 0;
                    energy = self.state.movement_energy(dir, &dr);
                    self.state.position = next;
                    if self.city.in_no_fly_zone(next.x, next.y) {
                        // Security interception: the episode ends here.
                        reward += rw.no_fly_violation;
                        return self.finish(TerminalCause::NoFlyViolation, reward, blocked);
                    }
                }
            }
            Action::Hover => {}
            Action::Charge => {
                let p = self.state.position;
                if self.city.is_charging_cell(p.x, p.y) {
                    self.state.charge_tick(&dr);
                    reward += rw.charging;
                    energy = 0.0;
                } else {
                    reward += rw.invalid_action;
                }
            }
            Action::Pickup => {
                if !self.state.has_cargo && self.state.at_pickup() {
                    self.state.has_cargo = true;
                    reward += rw.pickup_success;
                } else {
                    reward += rw.invalid_action;
                }
            }
            Action::Deliver => {
                if self.state.has_cargo && self.state.at_delivery() {
                    self.state.has_cargo = false;
                    reward += rw.delivery_success;
                    let time_ratio =
                        self.state.elapsed_steps as f64 / self.cfg.episode.max_steps as f64;
                    reward += rw.fast_delivery_bonus * (1.0 - time_ratio).max(0.0);
                    reward += rw.battery_bonus * self.state.battery_fraction();
                    return self.finish(TerminalCause::Delivered, reward, blocked);
                }
                reward += rw.invalid_action;
            }
            _ => unreachable!("non-movement actions matched above"),
        }

        if self.state.drain(energy * weather_mult, &dr) {
            reward += rw.battery_depleted;
            return self.finish(TerminalCause::BatteryExhausted, reward, blocked);
        }

        if self.state.weather == WeatherKind::Storm {
            self.state.storm_exposure += 1;
            if self.state.storm_exposure >= self.cfg.weather.storm_exposure_limit {
                reward += rw.storm_crash;
                return self.finish(TerminalCause::StormCrash, reward, blocked);
            }
        } else {
            self.state.storm_exposure = 0;
        }

        if self.state.elapsed_steps >= self.cfg.episode.max_steps {
            reward += rw.step_limit;
            return self.finish(TerminalCause::StepLimit, reward, blocked);
        }

        reward += rw.time_penalty;
        self.refresh_senses();

        StepOutcome {
            state: self.state.clone(),
            reward,
            done: false,
            info: self.info(blocked),
        }
    }

    pub fn state(&self) -> &PhysicalState {
        &self.state
    }

    pub fn city(&self) -> &CityMap {
        &self.city
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn terminal_cause(&self) -> Option<TerminalCause> {
        self.terminal
    }

    /// Recompute the sensor summary fields after the position changed.
    fn refresh_senses(&mut self) {
        let p = self.state.position;
        self.state.obstacles = self
            .city
            .obstacle_flags(p, self.cfg.rules.clearance_margin);
        self.state.no_fly_adjacent = self.city.no_fly_flags(p);
        self.state.on_charging_cell = self.city.is_charging_cell(p.x, p.y);
    }

    fn finish(&mut self, cause: TerminalCause, reward: f64, blocked: bool) -> StepOutcome {
        self.done = true;
        self.terminal = Some(cause);
        self.refresh_senses();
        StepOutcome {
            state: self.state.clone(),
            reward,
            done: true,
            info: self.info(blocked),
        }
    }

    fn info(&self, blocked: bool) -> StepInfo {
        StepInfo {
            step: self.state.elapsed_steps,
            terminal_cause: self.terminal,
            battery: self.state.battery,
            distance_to_objective: self.state.distance_to_objective(),
            weather: self.state.weather,
            wind_speed: self.state.wind_speed,
            blocked,
        }
    }
}

fn placeholder_state(city: &CityMap) -> PhysicalState {
    let origin = Position::new(1, 1, city.min_safe_altitude(1, 1));
    PhysicalState {
        position: origin,
        battery: 100.0,
        has_cargo: false,
        pickup: origin,
        delivery: origin,
        weather: WeatherKind::Clear,
        wind_speed: 0.0,
        obstacles: Default::default(),
        no_fly_adjacent: Default::default(),
        on_charging_cell: false,
        elapsed_steps: 0,
        blocked_streak: 0,
        storm_exposure: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> DeliveryEnv {
        DeliveryEnv::new(Config::default(), 42).expect("default config")
    }

    #[test]
    fn reset_state_satisfies_invariants() {
        let mut e = env();
        let s = e.reset(Some(7));
        assert_eq!(s.battery, 100.0);
        assert!(!s.has_cargo);
        assert_eq!(s.elapsed_steps, 0);
        assert!(e.city().in_bounds(s.position));
        assert!(s.at_pickup());
    }

    #[test]
    fn hover_costs_battery_and_time() {
        let mut e = env();
        e.reset(Some(7));
        let before = e.state().battery;
        let out = e.step(Action::Hover);
        assert!(!out.done);
        assert!(out.state.battery < before);
        assert!(out.reward < 0.0);
    }

    #[test]
    fn step_after_done_is_a_noop() {
        let mut cfg = Config::default();
        cfg.episode.max_steps = 1;
        let mut e = DeliveryEnv::new(cfg, 42).unwrap();
        e.reset(Some(7));
        let first = e.step(Action::Hover);
        assert!(first.done);
        assert_eq!(first.info.terminal_cause, Some(TerminalCause::StepLimit));

        let echo = e.step(Action::Hover);
        assert!(echo.done);
        assert_eq!(echo.reward, 0.0);
        assert_eq!(echo.state, first.state);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = env();
        let mut b = env();
        a.reset(Some(123));
        b.reset(Some(123));
        for _ in 0..50 {
            let oa = a.step(Action::MoveEast);
            let ob = b.step(Action::MoveEast);
            assert_eq!(oa.state, ob.state);
            assert_eq!(oa.reward, ob.reward);
            if oa.done {
                break;
            }
        }
    }

    #[test]
    fn out_of_bounds_move_is_blocked_with_penalty() {
        let mut e = env();
        e.reset(Some(7));
        // Climb to the ceiling, then try to go higher.
        loop {
            let z = e.state().position.z;
            if z >= e.city().max_altitude() - 1 {
                break;
            }
            if e.step(Action::MoveUp).done {
                return; // battery ran out climbing; nothing left to assert
            }
        }
        let pos = e.state().position;
        let out = e.step(Action::MoveUp);
        assert!(out.info.blocked);
        assert_eq!(out.state.position, pos);
        assert!(out.reward <= e.config().rewards.collision);
    }
}
