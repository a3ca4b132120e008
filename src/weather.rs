// src/weather.rs
//
// Dynamic weather for the delivery environment: category transitions,
// wind fluctuation, and the energy/safety effects consumed by the step
// function and the rule engine.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::WeatherConfig;
use crate::types::WeatherKind;

/// Per-category wind band (km/h) used when a category change resamples
/// the wind speed.
fn wind_band(kind: WeatherKind) -> (f64, f64) {
    match kind {
        WeatherKind::Clear => (5.0, 15.0),
        WeatherKind::Wind => (25.0, 40.0),
        WeatherKind::Rain => (15.0, 35.0),
        WeatherKind::Storm => (45.0, 65.0),
    }
}

/// Markov transition rows. Probabilities are cumulative-friendly: each row
/// sums to 1.0 and keeps bad weather short-lived so training episodes are
/// not dominated by grounded steps.
fn transitions(kind: WeatherKind) -> &'static [(WeatherKind, f64)] {
    match kind {
        WeatherKind::Clear => &[
            (WeatherKind::Clear, 0.85),
            (WeatherKind::Wind, 0.08),
            (WeatherKind::Rain, 0.07),
        ],
        WeatherKind::Wind => &[
            (WeatherKind::Clear, 0.50),
            (WeatherKind::Wind, 0.35),
            (WeatherKind::Storm, 0.15),
        ],
        WeatherKind::Rain => &[
            (WeatherKind::Clear, 0.45),
            (WeatherKind::Rain, 0.40),
            (WeatherKind::Storm, 0.15),
        ],
        WeatherKind::Storm => &[
            (WeatherKind::Rain, 0.45),
            (WeatherKind::Wind, 0.25),
            (WeatherKind::Storm, 0.30),
        ],
    }
}

/// Weather state owned by the environment.
#[derive(Debug, Clone)]
pub struct WeatherSystem {
    cfg: WeatherConfig,
    kind: WeatherKind,
    wind_speed: f64,
}

impl WeatherSystem {
    pub fn new(cfg: WeatherConfig, rng: &mut ChaCha8Rng) -> Self {
        let kind = cfg.initial;
        let (lo, hi) = wind_band(kind);
        Self {
            cfg,
            kind,
            wind_speed: rng.gen_range(lo..hi),
        }
    }

    /// Re-sample initial conditions for a new episode.
    pub fn reset(&mut self, rng: &mut ChaCha8Rng) {
        self.kind = self.cfg.initial;
        let (lo, hi) = wind_band(self.kind);
        self.wind_speed = rng.gen_range(lo..hi);
    }

    /// Advance one step: rare category transition plus wind jitter.
    pub fn update(&mut self, rng: &mut ChaCha8Rng) {
        if rng.gen_bool(self.cfg.change_prob) {
            let roll: f64 = rng.gen();
            let mut acc = 0.0;
            for &(next, p) in transitions(self.kind) {
                acc += p;
                if roll < acc {
                    if next != self.kind {
                        let (lo, hi) = wind_band(next);
                        self.wind_speed = rng.gen_range(lo..hi);
                    }
                    self.kind = next;
                    break;
                }
            }
        }

        self.wind_speed = (self.wind_speed + rng.gen_range(-2.0..2.0)).clamp(0.0, 80.0);
    }

    pub fn kind(&self) -> WeatherKind {
        self.kind
    }

    pub fn wind_speed(&self) -> f64 {
        self.wind_speed
    }

    /// Flight is unsafe in a storm or above the configured wind ceiling.
    pub fn is_safe_to_fly(&self) -> bool {
        self.kind != WeatherKind::Storm && self.wind_speed <= self.cfg.max_safe_wind
    }

    /// Wind at or above this level destroys the airframe outright.
    pub fn is_extreme(&self) -> bool {
        self.wind_speed >= self.cfg.extreme_wind
    }

    /// Energy-consumption multiplier applied to every battery drain.
    pub fn energy_multiplier(&self) -> f64 {
        let base = match self.kind {
            WeatherKind::Clear => 1.0,
            WeatherKind::Wind => 1.3,
            WeatherKind::Rain => 1.4,
            WeatherKind::Storm => 2.0,
        };
        // Wind adds up to +50% on top of the category multiplier.
        base * (1.0 + 0.5 * (self.wind_speed / 80.0))
    }
}
