// src/agent.rs
//
// Tabular Q-learning agent: sparse value table, epsilon-greedy selection
// with deterministic tie-breaking, TD updates, and JSON persistence of
// the table at process boundaries.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::LearningConfig;
use crate::discretizer::{DiscreteStateKey, KEY_VERSION};
use crate::types::Action;

/// One persisted table entry. The sparse map is serialized as a flat
/// record list; tuple keys do not survive JSON object keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub key: DiscreteStateKey,
    pub action: Action,
    pub value: f64,
}

/// Durable snapshot of the agent's learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Key schema version; load rejects a mismatch.
    pub key_version: u32,
    pub epsilon: f64,
    pub episodes_trained: u64,
    pub total_updates: u64,
    pub entries: Vec<TableEntry>,
}

/// Q-learning agent. Owns its value table exclusively; there is no
/// locking because there is no second writer.
pub struct QLearningAgent {
    table: HashMap<(DiscreteStateKey, Action), f64>,
    learning_rate: f64,
    discount: f64,
    epsilon: f64,
    epsilon_floor: f64,
    epsilon_decay: f64,
    rng: ChaCha8Rng,
    total_updates: u64,
    episodes_trained: u64,
}

impl QLearningAgent {
    pub fn new(cfg: &LearningConfig, seed: u64) -> Self {
        Self {
            table: HashMap::new(),
            learning_rate: cfg.learning_rate,
            discount: cfg.discount,
            epsilon: cfg.epsilon_start,
            epsilon_floor: cfg.epsilon_floor,
            epsilon_decay: cfg.epsilon_decay,
            rng: ChaCha8Rng::seed_from_u64(seed),
            total_updates: 0,
            episodes_trained: 0,
        }
    }

    /// Reseed the exploration RNG (deterministic episode sequences).
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Stored estimate for (key, action); unvisited pairs are zero.
    pub fn q_value(&self, key: &DiscreteStateKey, action: Action) -> f64 {
        self.table.get(&(*key, action)).copied().unwrap_or(0.0)
    }

    /// Greedy action for `key`. Ties break toward the earliest entry in
    /// `Action::ALL`, never randomly, so behavior is reproducible for a
    /// fixed table.
    pub fn best_action(&self, key: &DiscreteStateKey) -> Action {
        self.best_among(key, &Action::ALL)
    }

    /// Greedy action restricted to `candidates` (same tie-break contract).
    /// `candidates` must be non-empty; an empty slice is a caller bug.
    pub fn best_among(&self, key: &DiscreteStateKey, candidates: &[Action]) -> Action {
        debug_assert!(!candidates.is_empty(), "empty candidate set");
        let mut best = candidates[0];
        let mut best_value = self.q_value(key, best);
        for &action in &candidates[1..] {
            let value = self.q_value(key, action);
            if value > best_value {
                best = action;
                best_value = value;
            }
        }
        best
    }

    /// Highest stored value over all actions at `key`.
    pub fn best_value(&self, key: &DiscreteStateKey) -> f64 {
        Action::ALL
            .iter()
            .map(|&a| self.q_value(key, a))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Epsilon-greedy selection. With `explore` false this is pure greedy
    /// exploitation (evaluation / demo mode).
    pub fn select_action(&mut self, key: &DiscreteStateKey, explore: bool) -> Action {
        if explore && self.rng.gen::<f64>() < self.epsilon {
            return Action::ALL[self.rng.gen_range(0..Action::COUNT)];
        }
        self.best_action(key)
    }

    /// Temporal-difference update:
    /// `Q(s,a) += alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`,
    /// with the bootstrap term dropped on terminal transitions.
    pub fn update(
        &mut self,
        key: &DiscreteStateKey,
        action: Action,
        reward: f64,
        next_key: &DiscreteStateKey,
        done: bool,
    ) {
        let current = self.q_value(key, action);
        let bootstrap = if done {
            0.0
        } else {
            self.discount * self.best_value(next_key)
        };
        let updated = current + self.learning_rate * (reward + bootstrap - current);
        self.table.insert((*key, action), updated);
        self.total_updates += 1;
    }

    /// Multiplicative epsilon decay, floored. Called once per completed
    /// episode so exploration is front-loaded.
    pub fn decay_exploration(&mut self) {
        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.epsilon_floor);
        self.episodes_trained += 1;
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn table_len(&self) -> usize {
        self.table.len()
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn episodes_trained(&self) -> u64 {
        self.episodes_trained
    }

    /// Snapshot for the persistence collaborator. Entries are sorted so
    /// the serialized form is byte-stable for a given table.
    pub fn snapshot(&self) -> TableSnapshot {
        let mut entries: Vec<TableEntry> = self
            .table
            .iter()
            .map(|(&(key, action), &value)| TableEntry { key, action, value })
            .collect();
        entries.sort_by(|a, b| (a.key, a.action).cmp(&(b.key, b.action)));
        TableSnapshot {
            key_version: KEY_VERSION,
            epsilon: self.epsilon,
            episodes_trained: self.episodes_trained,
            total_updates: self.total_updates,
            entries,
        }
    }

    /// Restore from a snapshot. A key-version mismatch is rejected: the
    /// table would be silently meaningless under a different bucketing.
    pub fn restore(&mut self, snapshot: TableSnapshot) -> io::Result<()> {
        if snapshot.key_version != KEY_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "table key version {} does not match current {}",
                    snapshot.key_version, KEY_VERSION
                ),
            ));
        }
        self.table = snapshot
            .entries
            .into_iter()
            .map(|e| ((e.key, e.action), e.value))
            .collect();
        self.epsilon = snapshot.epsilon.max(self.epsilon_floor);
        self.episodes_trained = snapshot.episodes_trained;
        self.total_updates = snapshot.total_updates;
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &self.snapshot())?;
        Ok(())
    }

    pub fn load_from(&mut self, path: &Path) -> io::Result<()> {
        let file = File::open(path)?;
        let snapshot: TableSnapshot = serde_json::from_reader(BufReader::new(file))?;
        self.restore(snapshot)
    }
}
