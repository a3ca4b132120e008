// src/config.rs
//
// Central configuration for the Skycourier decision core.
// Single source of truth for grid geometry, drone physics, reward
// weights, learning hyperparameters, rule thresholds, and the
// discretizer's bucket boundaries.
//
// All numeric weights referenced by the environment and rule engine
// live here; components never hardcode them.

use thiserror::Error;

use crate::types::WeatherKind;

#[derive(Debug, Clone)]
pub struct Config {
    /// Human-readable config / release version.
    pub version: &'static str,
    /// Grid geometry and city generation parameters.
    pub grid: GridConfig,
    /// Drone physics: battery, energy model, charge rate.
    pub drone: DroneConfig,
    /// Weather dynamics and safety thresholds.
    pub weather: WeatherConfig,
    /// Reward weights for the environment step function.
    pub rewards: RewardConfig,
    /// Q-learning hyperparameters.
    pub learning: LearningConfig,
    /// Rule-engine thresholds.
    pub rules: RuleConfig,
    /// State discretizer bucket boundaries.
    pub discretizer: DiscretizerConfig,
    /// Episode limits (step cap, collision retries).
    pub episode: EpisodeLimits,
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Grid width in cells (x axis).
    pub width: i32,
    /// Grid height in cells (y axis).
    pub height: i32,
    /// Number of altitude levels (z in 0..max_altitude).
    pub max_altitude: i32,
    /// Minimum generated building height in levels.
    pub min_building_height: i32,
    /// Maximum generated building height in levels.
    pub max_building_height: i32,
    /// Per-cell building probability inside a block.
    pub building_density: f64,
    /// Number of hospital (pickup origin) cells.
    pub num_hospitals: usize,
    /// Number of lab (delivery destination) cells.
    pub num_labs: usize,
    /// Number of charging-station cells.
    pub num_charging_stations: usize,
    /// Number of circular no-fly zones.
    pub num_no_fly_zones: usize,
}

#[derive(Debug, Clone)]
pub struct DroneConfig {
    /// Battery capacity in mAh (energy costs below are in mAh).
    pub battery_capacity: f64,
    /// Energy per horizontal cell traversed.
    pub energy_per_cell: f64,
    /// Energy per altitude level climbed (descent costs half).
    pub energy_per_level: f64,
    /// Energy per step while hovering (also the zero-distance action cost).
    pub hover_energy: f64,
    /// Energy restored per charge step at a station.
    pub charge_rate: f64,
    /// Extra drain multiplier while carrying cargo.
    pub cargo_drain_factor: f64,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Weather category at episode start.
    pub initial: WeatherKind,
    /// Probability per step of a category transition.
    pub change_prob: f64,
    /// Wind speed (km/h) above which flight is unsafe.
    pub max_safe_wind: f64,
    /// Wind speed at which the airframe fails outright.
    pub extreme_wind: f64,
    /// Consecutive storm steps survivable before a crash.
    pub storm_exposure_limit: u32,
}

/// Reward weights. Positive values are bonuses, negative are penalties.
#[derive(Debug, Clone)]
pub struct RewardConfig {
    /// Terminal bonus for a successful delivery.
    pub delivery_success: f64,
    /// Max extra bonus for a fast delivery, scaled by remaining step budget.
    pub fast_delivery_bonus: f64,
    /// Max extra bonus for remaining battery at delivery.
    pub battery_bonus: f64,
    /// Reward for a successful pickup.
    pub pickup_success: f64,
    /// Penalty for a blocked movement attempt.
    pub collision: f64,
    /// Terminal penalty when the battery is exhausted.
    pub battery_depleted: f64,
    /// Terminal penalty for entering a no-fly cell.
    pub no_fly_violation: f64,
    /// Terminal penalty for a storm crash.
    pub storm_crash: f64,
    /// Terminal penalty when the step cap is exceeded.
    pub step_limit: f64,
    /// Per-step time penalty (negative).
    pub time_penalty: f64,
    /// Opportunity cost per charge step (negative).
    pub charging: f64,
    /// Penalty for a no-op pickup/deliver/charge attempt.
    pub invalid_action: f64,
}

#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// TD learning rate alpha.
    pub learning_rate: f64,
    /// Discount factor gamma.
    pub discount: f64,
    /// Initial exploration rate.
    pub epsilon_start: f64,
    /// Exploration floor.
    pub epsilon_floor: f64,
    /// Multiplicative decay applied once per episode.
    pub epsilon_decay: f64,
}

#[derive(Debug, Clone)]
pub struct RuleConfig {
    /// Battery percentage below which any flight action is forbidden.
    pub critical_battery: f64,
    /// Battery percentage below which climbing is forbidden.
    pub min_battery_to_fly: f64,
    /// Wind speed (km/h) above which the severe-weather rule grounds
    /// movement. Usually mirrors `WeatherConfig::max_safe_wind`.
    pub max_safe_wind: f64,
    /// Battery percentage below which energy-conserving actions are biased.
    pub conserve_battery: f64,
    /// Levels of clearance required above a building before the cell is
    /// treated as an obstacle by the proximity sensor.
    pub clearance_margin: i32,
}

#[derive(Debug, Clone)]
pub struct DiscretizerConfig {
    /// Cells per position bucket on the horizontal axes.
    pub cell_granularity: i32,
    /// Number of battery bands.
    pub battery_bands: u8,
    /// Radius (cells) of the obstacle-proximity sensor.
    pub obstacle_radius: i32,
}

#[derive(Debug, Clone)]
pub struct EpisodeLimits {
    /// Hard step cap per episode.
    pub max_steps: u32,
    /// Consecutive blocked movements tolerated before a terminal collision.
    pub collision_retry_limit: u32,
}

/// Scenario preset selected by the CLI / research harness.
///
/// Presets only tweak city difficulty and initial weather on top of the
/// default config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPreset {
    Easy,
    Medium,
    Hard,
    Storm,
}

impl ScenarioPreset {
    /// Stable lowercase name for the preset (used in logs/telemetry).
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioPreset::Easy => "easy",
            ScenarioPreset::Medium => "medium",
            ScenarioPreset::Hard => "hard",
            ScenarioPreset::Storm => "storm",
        }
    }

    /// Parse a preset name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<ScenarioPreset> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "e" => Some(ScenarioPreset::Easy),
            "medium" | "med" | "m" => Some(ScenarioPreset::Medium),
            "hard" | "h" => Some(ScenarioPreset::Hard),
            "storm" | "s" => Some(ScenarioPreset::Storm),
            _ => None,
        }
    }
}

/// Source of the effective scenario (for logging precedence).
///
/// Precedence order (highest to lowest):
/// 1. CLI argument (--scenario)
/// 2. Environment variable (SKYCOURIER_SCENARIO)
/// 3. Default (Medium)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioSource {
    Cli,
    Env,
    Default,
}

impl ScenarioSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioSource::Cli => "cli",
            ScenarioSource::Env => "env",
            ScenarioSource::Default => "default",
        }
    }
}

/// Resolved scenario with its source for logging.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveScenario {
    pub preset: ScenarioPreset,
    pub source: ScenarioSource,
}

impl EffectiveScenario {
    /// Log the effective scenario at startup (stderr).
    pub fn log_startup(&self) {
        eprintln!(
            "effective_scenario={} source={}",
            self.preset.as_str(),
            self.source.as_str()
        );
    }
}

/// Resolve the effective scenario using standard precedence rules.
pub fn resolve_effective_scenario(cli_scenario: Option<ScenarioPreset>) -> EffectiveScenario {
    if let Some(p) = cli_scenario {
        return EffectiveScenario {
            preset: p,
            source: ScenarioSource::Cli,
        };
    }

    if let Ok(env_val) = std::env::var("SKYCOURIER_SCENARIO") {
        if !env_val.is_empty() {
            if let Some(p) = ScenarioPreset::parse(&env_val) {
                return EffectiveScenario {
                    preset: p,
                    source: ScenarioSource::Env,
                };
            }
            eprintln!(
                "[config] WARN: invalid SKYCOURIER_SCENARIO={:?}; ignoring",
                env_val
            );
        }
    }

    EffectiveScenario {
        preset: ScenarioPreset::Medium,
        source: ScenarioSource::Default,
    }
}

/// Configuration errors detected at construction time.
///
/// These abort initialization; they can never surface mid-episode.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid too small: {width}x{height}x{altitude} (need at least 8x8x2)")]
    GridTooSmall {
        width: i32,
        height: i32,
        altitude: i32,
    },
    #[error("building heights must satisfy 0 < min <= max < max_altitude, got {min}..{max}")]
    BadBuildingHeights { min: i32, max: i32 },
    #[error("{name} must be within {low}..={high}, got {value}")]
    OutOfRange {
        name: &'static str,
        low: f64,
        high: f64,
        value: f64,
    },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("epsilon floor {floor} exceeds epsilon start {start}")]
    EpsilonFloorAboveStart { floor: f64, start: f64 },
    #[error("discretizer needs at least one battery band")]
    NoBatteryBands,
}

impl Default for Config {
    fn default() -> Self {
        // Balanced "medium" centre; scenario presets adjust city difficulty
        // and initial weather on top of these values.
        const GRID_SIZE: i32 = 30;
        const MAX_ALTITUDE: i32 = 12;
        const BATTERY_CAPACITY: f64 = 5_000.0;

        Config {
            version: "skycourier-0.1.0",
            grid: GridConfig {
                width: GRID_SIZE,
                height: GRID_SIZE,
                max_altitude: MAX_ALTITUDE,
                min_building_height: 2,
                max_building_height: 8,
                building_density: 0.15,
                num_hospitals: 3,
                num_labs: 3,
                num_charging_stations: 5,
                num_no_fly_zones: 4,
            },
            drone: DroneConfig {
                battery_capacity: BATTERY_CAPACITY,
                energy_per_cell: 50.0,
                energy_per_level: 10.0,
                hover_energy: 5.0,
                charge_rate: 500.0,
                cargo_drain_factor: 1.2,
            },
            weather: WeatherConfig {
                initial: WeatherKind::Clear,
                change_prob: 0.003,
                max_safe_wind: 40.0,
                extreme_wind: 70.0,
                storm_exposure_limit: 2,
            },
            rewards: RewardConfig {
                delivery_success: 1_000.0,
                fast_delivery_bonus: 100.0,
                battery_bonus: 50.0,
                pickup_success: 100.0,
                collision: -500.0,
                battery_depleted: -300.0,
                no_fly_violation: -800.0,
                storm_crash: -600.0,
                step_limit: -500.0,
                time_penalty: -1.0,
                charging: -5.0,
                invalid_action: -10.0,
            },
            learning: LearningConfig {
                learning_rate: 0.1,
                discount: 0.95,
                epsilon_start: 1.0,
                epsilon_floor: 0.01,
                epsilon_decay: 0.995,
            },
            rules: RuleConfig {
                critical_battery: 5.0,
                min_battery_to_fly: 15.0,
                max_safe_wind: 40.0,
                conserve_battery: 40.0,
                clearance_margin: 1,
            },
            discretizer: DiscretizerConfig {
                cell_granularity: 5,
                battery_bands: 5,
                obstacle_radius: 1,
            },
            episode: EpisodeLimits {
                max_steps: 1_000,
                collision_retry_limit: 3,
            },
        }
    }
}

impl Config {
    /// Default config adjusted for a scenario preset.
    pub fn for_scenario(preset: ScenarioPreset) -> Self {
        let mut cfg = Config::default();
        match preset {
            ScenarioPreset::Easy => {
                cfg.grid.building_density = 0.10;
                cfg.grid.num_no_fly_zones = 2;
                cfg.weather.initial = WeatherKind::Clear;
            }
            ScenarioPreset::Medium => {}
            ScenarioPreset::Hard => {
                cfg.grid.building_density = 0.25;
                cfg.grid.num_no_fly_zones = 6;
                cfg.weather.initial = WeatherKind::Wind;
                cfg.weather.change_prob = 0.01;
            }
            ScenarioPreset::Storm => {
                cfg.grid.building_density = 0.20;
                cfg.weather.initial = WeatherKind::Storm;
                cfg.weather.change_prob = 0.01;
            }
        }
        cfg
    }

    /// Validate the configuration. Called once at construction by the
    /// environment and training harness; a failure here aborts startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;
        if g.width < 8 || g.height < 8 || g.max_altitude < 2 {
            return Err(ConfigError::GridTooSmall {
                width: g.width,
                height: g.height,
                altitude: g.max_altitude,
            });
        }
        if g.min_building_height < 1
            || g.min_building_height > g.max_building_height
            || g.max_building_height >= g.max_altitude
        {
            return Err(ConfigError::BadBuildingHeights {
                min: g.min_building_height,
                max: g.max_building_height,
            });
        }

        check_unit("building_density", g.building_density)?;
        check_positive("battery_capacity", self.drone.battery_capacity)?;
        check_positive("energy_per_cell", self.drone.energy_per_cell)?;
        check_positive("charge_rate", self.drone.charge_rate)?;

        let l = &self.learning;
        check_range("learning_rate", l.learning_rate, 0.0, 1.0, true)?;
        check_range("discount", l.discount, 0.0, 1.0, false)?;
        check_range("epsilon_decay", l.epsilon_decay, 0.0, 1.0, true)?;
        if l.epsilon_floor > l.epsilon_start {
            return Err(ConfigError::EpsilonFloorAboveStart {
                floor: l.epsilon_floor,
                start: l.epsilon_start,
            });
        }

        let r = &self.rules;
        check_range("critical_battery", r.critical_battery, 0.0, 100.0, false)?;
        check_range(
            "min_battery_to_fly",
            r.min_battery_to_fly,
            0.0,
            100.0,
            false,
        )?;

        if self.discretizer.battery_bands == 0 {
            return Err(ConfigError::NoBatteryBands);
        }
        check_positive(
            "cell_granularity",
            self.discretizer.cell_granularity as f64,
        )?;
        check_positive("max_steps", self.episode.max_steps as f64)?;

        Ok(())
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::NonPositive { name, value });
    }
    Ok(())
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ConfigError> {
    check_range(name, value, 0.0, 1.0, false)
}

fn check_range(
    name: &'static str,
    value: f64,
    low: f64,
    high: f64,
    exclusive_low: bool,
) -> Result<(), ConfigError> {
    let below = if exclusive_low {
        value <= low
    } else {
        value < low
    };
    if below || value > high || !value.is_finite() {
        return Err(ConfigError::OutOfRange {
            name,
            low,
            high,
            value,
        });
    }
    Ok(())
}
