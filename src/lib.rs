//! Skycourier core library.
//!
//! A hybrid decision core for simulated autonomous grid delivery: a
//! tabular Q-learning agent proposes actions, a symbolic rule engine
//! constrains them, and a fusion step merges both into one safe action
//! per control step. The binary (`src/main.rs`) is a thin training /
//! research harness around these components.
//!
//! # Architecture
//!
//! The codebase separates the decision core from its collaborators:
//!
//! - **Environment** (`env`, `city`, `weather`, `drone`): the gridded
//!   city simulation behind the `reset`/`step` interface. Deterministic
//!   given seeds.
//!
//! - **Discretizer** (`discretizer`): pure bucketing of the physical
//!   state into the finite key space the agent learns over.
//!
//! - **Agent** (`agent`): sparse Q-table, epsilon-greedy selection with
//!   deterministic tie-breaking, TD updates, JSON persistence.
//!
//! - **Rules** (`rules`): immutable priority-ordered rule set producing
//!   admissibility verdicts. A triggered safety-forbid is absolute; the
//!   admissible set is never empty.
//!
//! - **Fusion** (`fusion`): the per-step state machine combining agent
//!   preference and rule constraints, with an explainable decision trace.
//!
//! - **Harness** (`trainer`, `telemetry`, `metrics`): episode loop,
//!   record sinks, and online statistics. All I/O lives out here, never
//!   inside a step.
//!
//! Design principle: the policy learns decisions, the rules enforce
//! safety.

pub mod agent;
pub mod city;
pub mod config;
pub mod discretizer;
pub mod drone;
pub mod env;
pub mod fusion;
pub mod metrics;
pub mod rules;
pub mod telemetry;
pub mod trainer;
pub mod types;
pub mod weather;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{
    resolve_effective_scenario, Config, ConfigError, EffectiveScenario, ScenarioPreset,
    ScenarioSource,
};

pub use agent::{QLearningAgent, TableEntry, TableSnapshot};
pub use city::{CityMap, NoFlyZone, Zone};
pub use discretizer::{DiscreteStateKey, Discretizer, KEY_VERSION};
pub use drone::PhysicalState;
pub use env::{DeliveryEnv, StepInfo, StepOutcome};
pub use fusion::{Decision, HybridController};
pub use metrics::{OnlineStats, RollingRate};
pub use rules::{
    Rule, RuleCategory, RuleCondition, RuleEngine, TriggeredRule, Verdict, VerdictKind,
};
pub use telemetry::{EpisodeRecord, FileSink, MemorySink, NoopSink, RecordSink, StepRecord};
pub use trainer::{EpisodeSummary, RunConfig, RunSummary, Trainer};
pub use types::{
    Action, DecisionPath, Direction, DirectionFlags, Position, TerminalCause, WeatherKind,
};
pub use weather::WeatherSystem;
