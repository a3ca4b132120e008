// src/city.rs
//
// Static city layout: building heights, special zones, no-fly zones.
// Generated once per map seed; queried read-only by the environment.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::types::{Direction, DirectionFlags, Position};

/// What occupies a ground cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Empty,
    Building,
    Hospital,
    Lab,
    ChargingStation,
}

/// Circular no-fly zone (government, airport, military, restricted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoFlyZone {
    pub center: (i32, i32),
    pub radius: i32,
    pub reason: &'static str,
}

/// Immutable city map.
///
/// Buildings occupy altitude levels `1..=height` of their cell; level 0 is
/// the ground everywhere, so the flyable airspace over an empty cell starts
/// at level 1.
#[derive(Debug, Clone)]
pub struct CityMap {
    width: i32,
    height: i32,
    max_altitude: i32,
    height_map: Vec<i32>,
    zone_map: Vec<Zone>,
    hospitals: Vec<(i32, i32)>,
    labs: Vec<(i32, i32)>,
    charging_stations: Vec<(i32, i32)>,
    no_fly_zones: Vec<NoFlyZone>,
}

impl CityMap {
    /// Generate a city deterministically from the config and a map seed.
    pub fn generate(cfg: &Config, seed: u64) -> Self {
        let g = &cfg.grid;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = (g.width * g.height) as usize;

        let mut map = CityMap {
            width: g.width,
            height: g.height,
            max_altitude: g.max_altitude,
            height_map: vec![0; n],
            zone_map: vec![Zone::Empty; n],
            hospitals: Vec::new(),
            labs: Vec::new(),
            charging_stations: Vec::new(),
            no_fly_zones: Vec::new(),
        };

        map.place_buildings(cfg, &mut rng);
        map.place_zones(g.num_hospitals, Zone::Hospital, &mut rng);
        map.place_zones(g.num_labs, Zone::Lab, &mut rng);
        map.place_zones(g.num_charging_stations, Zone::ChargingStation, &mut rng);
        map.place_no_fly_zones(g.num_no_fly_zones, &mut rng);
        map
    }

    // Block pattern: built-up squares separated by streets, so the map has
    // flyable corridors at low altitude instead of uniform noise.
    fn place_buildings(&mut self, cfg: &Config, rng: &mut ChaCha8Rng) {
        const BLOCK: i32 = 4;
        const STREET: i32 = 3;
        let g = &cfg.grid;

        let mut x = 2;
        while x < self.width - 2 {
            let mut y = 2;
            while y < self.height - 2 {
                if rng.gen_bool(0.7) {
                    for bx in x..(x + BLOCK).min(self.width - 2) {
                        for by in y..(y + BLOCK).min(self.height - 2) {
                            if rng.gen_bool((g.building_density * 4.0).min(1.0)) {
                                let h = rng
                                    .gen_range(g.min_building_height..=g.max_building_height);
                                let idx = self.index(bx, by);
                                self.height_map[idx] = h;
                                self.zone_map[idx] = Zone::Building;
                            }
                        }
                    }
                }
                y += BLOCK + STREET;
            }
            x += BLOCK + STREET;
        }
    }

    fn place_zones(&mut self, count: usize, zone: Zone, rng: &mut ChaCha8Rng) {
        let mut placed = 0;
        let mut attempts = 0;
        let max_attempts = count * 20;

        while placed < count && attempts < max_attempts {
            let x = rng.gen_range(0..self.width);
            let y = rng.gen_range(0..self.height);
            let idx = self.index(x, y);
            if self.zone_map[idx] == Zone::Empty {
                self.zone_map[idx] = zone;
                // Special zones sit on low rooftops.
                self.height_map[idx] = rng.gen_range(1..4);
                match zone {
                    Zone::Hospital => self.hospitals.push((x, y)),
                    Zone::Lab => self.labs.push((x, y)),
                    Zone::ChargingStation => self.charging_stations.push((x, y)),
                    _ => {}
                }
                placed += 1;
            }
            attempts += 1;
        }
    }

    fn place_no_fly_zones(&mut self, count: usize, rng: &mut ChaCha8Rng) {
        const REASONS: [&str; 4] = ["government", "airport", "military", "restricted"];
        for i in 0..count {
            let x = rng.gen_range(5..self.width - 5);
            let y = rng.gen_range(5..self.height - 5);
            let radius = rng.gen_range(2..5);
            self.no_fly_zones.push(NoFlyZone {
                center: (x, y),
                radius,
                reason: REASONS[i % REASONS.len()],
            });
        }
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn max_altitude(&self) -> i32 {
        self.max_altitude
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.x < self.width
            && pos.y >= 0
            && pos.y < self.height
            && pos.z >= 0
            && pos.z < self.max_altitude
    }

    /// Building height at a cell; out-of-bounds cells report zero.
    pub fn building_height(&self, x: i32, y: i32) -> i32 {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return 0;
        }
        self.height_map[self.index(x, y)]
    }

    /// A position is blocked when it sits at or below the cell's solid
    /// envelope (the building, or the ground at level 0).
    pub fn is_blocked(&self, pos: Position) -> bool {
        pos.z <= self.building_height(pos.x, pos.y)
    }

    pub fn zone(&self, x: i32, y: i32) -> Zone {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return Zone::Empty;
        }
        self.zone_map[self.index(x, y)]
    }

    pub fn is_charging_cell(&self, x: i32, y: i32) -> bool {
        self.zone(x, y) == Zone::ChargingStation
    }

    pub fn in_no_fly_zone(&self, x: i32, y: i32) -> bool {
        self.no_fly_zones.iter().any(|z| {
            let dx = (x - z.center.0) as f64;
            let dy = (y - z.center.1) as f64;
            (dx * dx + dy * dy).sqrt() <= z.radius as f64
        })
    }

    /// Lowest altitude level clear of the cell's building.
    pub fn min_safe_altitude(&self, x: i32, y: i32) -> i32 {
        self.building_height(x, y) + 1
    }

    /// Directions whose adjacent cell is unflyable from `pos`: out of
    /// bounds, inside a building envelope, or within `clearance_margin`
    /// levels of a rooftop.
    pub fn obstacle_flags(&self, pos: Position, clearance_margin: i32) -> DirectionFlags {
        let mut flags = DirectionFlags::EMPTY;
        for dir in Direction::ALL {
            let next = pos.step(dir);
            if !self.in_bounds(next) {
                flags.set(dir);
                continue;
            }
            let clearance = next.z - self.building_height(next.x, next.y);
            if clearance < 1 || (dir != Direction::Up && clearance <= clearance_margin) {
                flags.set(dir);
            }
        }
        flags
    }

    /// Horizontal directions whose adjacent cell lies inside a no-fly zone.
    pub fn no_fly_flags(&self, pos: Position) -> DirectionFlags {
        let mut flags = DirectionFlags::EMPTY;
        for dir in Direction::HORIZONTAL {
            let next = pos.step(dir);
            if self.in_no_fly_zone(next.x, next.y) {
                flags.set(dir);
            }
        }
        flags
    }

    /// Nearest charging station by horizontal Manhattan distance.
    pub fn nearest_charging_station(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        self.charging_stations
            .iter()
            .copied()
            .min_by_key(|(sx, sy)| (x - sx).abs() + (y - sy).abs())
    }

    /// Random pickup origin. Falls back to a corner if generation placed
    /// no hospitals (degenerate configs only).
    pub fn random_hospital(&self, rng: &mut ChaCha8Rng) -> (i32, i32) {
        pick(&self.hospitals, rng).unwrap_or((1, 1))
    }

    /// Random delivery destination.
    pub fn random_lab(&self, rng: &mut ChaCha8Rng) -> (i32, i32) {
        pick(&self.labs, rng).unwrap_or((self.width - 2, self.height - 2))
    }

    pub fn charging_stations(&self) -> &[(i32, i32)] {
        &self.charging_stations
    }

    pub fn no_fly_zones(&self) -> &[NoFlyZone] {
        &self.no_fly_zones
    }
}

fn pick(cells: &[(i32, i32)], rng: &mut ChaCha8Rng) -> Option<(i32, i32)> {
    if cells.is_empty() {
        return None;
    }
    Some(cells[rng.gen_range(0..cells.len())])
}
