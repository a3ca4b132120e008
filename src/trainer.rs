// src/trainer.rs
//
// Episode loop around the decision core: fusion chooses, the environment
// steps, the agent updates, the sink observes. Persistence and logging
// happen only at episode boundaries, never inside a step.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::env::DeliveryEnv;
use crate::fusion::HybridController;
use crate::metrics::{OnlineStats, RollingRate};
use crate::telemetry::{EpisodeRecord, RecordSink, StepRecord};
use crate::types::{DecisionPath, TerminalCause};

/// Window for the rolling success-rate gauge.
const SUCCESS_WINDOW: usize = 100;

/// Configuration for one training or evaluation run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of episodes to run.
    pub episodes: u64,
    /// Base seed; episode i runs with seed + i.
    pub seed: u64,
    /// Epsilon-greedy exploration plus TD updates when true; pure greedy
    /// evaluation (no learning) when false.
    pub explore: bool,
    /// Print a progress line every N episodes (0 = quiet).
    pub log_interval: u64,
    /// Save the value table every N episodes (0 = never).
    pub checkpoint_interval: u64,
    /// Where checkpoints go.
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            episodes: 1_000,
            seed: 0,
            explore: true,
            log_interval: 0,
            checkpoint_interval: 0,
            checkpoint_path: None,
        }
    }
}

impl RunConfig {
    pub fn with_episodes(mut self, episodes: u64) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_explore(mut self, explore: bool) -> Self {
        self.explore = explore;
        self
    }

    pub fn with_log_interval(mut self, interval: u64) -> Self {
        self.log_interval = interval;
        self
    }

    pub fn with_checkpoint(mut self, interval: u64, path: PathBuf) -> Self {
        self.checkpoint_interval = interval;
        self.checkpoint_path = Some(path);
        self
    }
}

/// Summary of a completed episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub episode_id: u64,
    pub seed: u64,
    pub steps: u32,
    pub total_reward: f64,
    pub terminal_cause: TerminalCause,
    pub success: bool,
    pub safety_overrides: u32,
    pub final_battery: f64,
    pub epsilon_after: f64,
}

/// Aggregate summary of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub episodes: u64,
    pub successes: u64,
    /// Success rate over the last `SUCCESS_WINDOW` episodes.
    pub recent_success_rate: f64,
    pub mean_reward: f64,
    pub reward_std_dev: f64,
    pub mean_steps: f64,
    pub best_reward: f64,
    pub final_epsilon: f64,
    pub table_entries: usize,
    pub total_overrides: u64,
}

/// Training/evaluation harness. Owns the environment and controller for
/// the duration of a run; the sink observes every step and episode.
pub struct Trainer<S: RecordSink> {
    env: DeliveryEnv,
    controller: HybridController,
    sink: S,
}

impl<S: RecordSink> Trainer<S> {
    pub fn new(cfg: Config, map_seed: u64, sink: S) -> Result<Self, ConfigError> {
        let env = DeliveryEnv::new(cfg.clone(), map_seed)?;
        let controller = HybridController::new(&cfg, map_seed);
        Ok(Self {
            env,
            controller,
            sink,
        })
    }

    /// Run a full training or evaluation session.
    pub fn run(&mut self, run: &RunConfig) -> RunSummary {
        let mut rewards = OnlineStats::default();
        let mut steps = OnlineStats::default();
        let mut recent = RollingRate::new(SUCCESS_WINDOW);
        let mut successes = 0u64;
        let mut best_reward = f64::NEG_INFINITY;

        for i in 0..run.episodes {
            let summary = self.run_episode(i, run.seed.wrapping_add(i), run.explore);

            rewards.push(summary.total_reward);
            steps.push(summary.steps as f64);
            recent.push(summary.success);
            if summary.success {
                successes += 1;
            }
            best_reward = best_reward.max(summary.total_reward);

            if run.log_interval > 0 && (i + 1) % run.log_interval == 0 {
                eprintln!(
                    "episode {}/{} | reward {:.1} | steps {} | cause {} | \
                     recent_success {:.1}% | epsilon {:.3}",
                    i + 1,
                    run.episodes,
                    summary.total_reward,
                    summary.steps,
                    summary.terminal_cause.as_str(),
                    recent.rate() * 100.0,
                    summary.epsilon_after,
                );
            }

            if run.checkpoint_interval > 0 && (i + 1) % run.checkpoint_interval == 0 {
                if let Some(path) = &run.checkpoint_path {
                    if let Err(err) = self.controller.agent().save_to(path) {
                        eprintln!("[trainer] WARN: checkpoint failed: {err}");
                    }
                }
            }
        }

        RunSummary {
            episodes: run.episodes,
            successes,
            recent_success_rate: recent.rate(),
            mean_reward: rewards.mean(),
            reward_std_dev: rewards.std_dev(),
            mean_steps: steps.mean(),
            best_reward: if rewards.count() == 0 {
                0.0
            } else {
                best_reward
            },
            final_epsilon: self.controller.agent().epsilon(),
            table_entries: self.controller.agent().table_len(),
            total_overrides: self.controller.overrides(),
        }
    }

    /// Run one episode to termination.
    pub fn run_episode(&mut self, episode_id: u64, seed: u64, explore: bool) -> EpisodeSummary {
        let mut state = self.env.reset(Some(seed));
        let mut total_reward = 0.0;
        let mut overrides = 0u32;
        let terminal_cause;

        loop {
            let decision = self.controller.decide(&state, explore);
            let outcome = self.env.step(decision.action);

            if explore {
                let next_key = self.controller.discretize(&outcome.state);
                self.controller.agent_mut().update(
                    &decision.key,
                    decision.action,
                    outcome.reward,
                    &next_key,
                    outcome.done,
                );
            }

            total_reward += outcome.reward;
            if decision.path != DecisionPath::Exploit {
                overrides += 1;
            }

            self.sink.record_step(&StepRecord::new(
                episode_id,
                &decision,
                outcome.reward,
                outcome.done,
                &outcome.info,
            ));

            state = outcome.state;
            if outcome.done {
                terminal_cause = outcome
                    .info
                    .terminal_cause
                    .unwrap_or(TerminalCause::StepLimit);
                break;
            }
        }

        if explore {
            self.controller.agent_mut().decay_exploration();
        }

        let summary = EpisodeSummary {
            episode_id,
            seed,
            steps: state.elapsed_steps,
            total_reward,
            terminal_cause,
            success: terminal_cause.is_success(),
            safety_overrides: overrides,
            final_battery: state.battery,
            epsilon_after: self.controller.agent().epsilon(),
        };

        self.sink.record_episode(&EpisodeRecord {
            episode_id,
            seed,
            steps: summary.steps,
            total_reward,
            terminal_cause,
            success: summary.success,
            safety_overrides: overrides,
            final_battery: summary.final_battery,
            epsilon: summary.epsilon_after,
        });

        summary
    }

    pub fn controller(&self) -> &HybridController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut HybridController {
        &mut self.controller
    }

    pub fn env(&self) -> &DeliveryEnv {
        &self.env
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
