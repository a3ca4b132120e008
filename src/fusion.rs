// src/fusion.rs
//
// Decision fusion: one step of the hybrid controller.
//
// Per-step state machine, terminal on "action chosen":
//   discretize -> agent preference -> verdict -> exploit,
//   else admissible set -> best-valued admissible -> override / fail-safe.
//
// Fusion cannot fail: the rule engine guarantees a non-empty admissible
// set, so every path ends with an action.

use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::QLearningAgent;
use crate::config::Config;
use crate::discretizer::{DiscreteStateKey, Discretizer};
use crate::drone::PhysicalState;
use crate::rules::{RuleEngine, TriggeredRule, VerdictKind};
use crate::types::{Action, DecisionPath};

/// Per-step decision trace. A small immutable value returned to the
/// caller; the core keeps no log state of its own.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    /// The action to execute.
    pub action: Action,
    /// The agent's unconstrained preference.
    pub proposed: Action,
    pub path: DecisionPath,
    /// Discretized key the agent was consulted with.
    pub key: DiscreteStateKey,
    /// On the exploit path, the rules that matched the proposal; on an
    /// override, the safety rejections that forced it.
    pub triggered: Vec<TriggeredRule>,
    /// Size of the admissible set when an override was needed.
    pub admissible_count: usize,
}

impl Decision {
    /// Human-readable explanation for the policy-query interface.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "action={} path={} proposed={}",
            self.action.as_str(),
            self.path.as_str(),
            self.proposed.as_str()
        );
        for rule in &self.triggered {
            let _ = write!(
                out,
                "; {}[{}/{}]: {}",
                rule.name,
                rule.category.as_str(),
                rule.priority,
                rule.explanation
            );
        }
        out
    }
}

/// Hybrid controller: owns the discretizer, the learning agent, and the
/// rule engine, and fuses their outputs into one safe action per step.
pub struct HybridController {
    discretizer: Discretizer,
    agent: QLearningAgent,
    engine: RuleEngine,
    decisions: u64,
    overrides: u64,
}

impl HybridController {
    pub fn new(cfg: &Config, seed: u64) -> Self {
        Self::with_engine(cfg, RuleEngine::standard(&cfg.rules), seed)
    }

    /// Construct with an injected rule engine (tests swap rule sets).
    pub fn with_engine(cfg: &Config, engine: RuleEngine, seed: u64) -> Self {
        Self {
            discretizer: Discretizer::new(cfg.discretizer.clone()),
            agent: QLearningAgent::new(&cfg.learning, seed),
            engine,
            decisions: 0,
            overrides: 0,
        }
    }

    /// Choose one action. `explore` enables epsilon-greedy proposals
    /// (training); evaluation and demo callers pass false for pure
    /// exploitation.
    pub fn decide(&mut self, state: &PhysicalState, explore: bool) -> Decision {
        self.decisions += 1;
        let key = self.discretizer.discretize(state);
        let proposed = self.agent.select_action(&key, explore);
        let verdict = self.engine.evaluate(state, proposed);

        if verdict.admissible {
            return Decision {
                action: proposed,
                proposed,
                path: DecisionPath::Exploit,
                key,
                triggered: verdict.triggered,
                admissible_count: 0,
            };
        }

        self.overrides += 1;
        let admissible = self.engine.admissible_actions(state);
        let fail_safe = admissible.len() == 1 && admissible[0] == self.engine.fail_safe(state);
        let action = self.pick_admissible(state, &key, &admissible);

        Decision {
            action,
            proposed,
            path: if fail_safe {
                DecisionPath::FailSafe
            } else {
                DecisionPath::Override
            },
            key,
            triggered: rejections(&verdict.triggered),
            admissible_count: admissible.len(),
        }
    }

    /// Highest agent-valued admissible action; rule bias breaks exact
    /// value ties, canonical action order breaks the rest.
    fn pick_admissible(
        &self,
        state: &PhysicalState,
        key: &DiscreteStateKey,
        admissible: &[Action],
    ) -> Action {
        let mut best = admissible[0];
        let mut best_value = self.agent.q_value(key, best);
        let mut best_bias = self.engine.bias_score(state, best);

        for &action in &admissible[1..] {
            let value = self.agent.q_value(key, action);
            let bias = self.engine.bias_score(state, action);
            if value > best_value || (value == best_value && bias > best_bias) {
                best = action;
                best_value = value;
                best_bias = bias;
            }
        }
        best
    }

    /// Policy-query interface: greedy action plus explanation, for demo
    /// and GUI callers outside training.
    pub fn policy_action(&mut self, state: &PhysicalState) -> (Action, String) {
        let decision = self.decide(state, false);
        let explanation = decision.explain();
        (decision.action, explanation)
    }

    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut QLearningAgent {
        &mut self.agent
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn discretize(&self, state: &PhysicalState) -> DiscreteStateKey {
        self.discretizer.discretize(state)
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn overrides(&self) -> u64 {
        self.overrides
    }

    pub fn override_rate(&self) -> f64 {
        if self.decisions == 0 {
            0.0
        } else {
            self.overrides as f64 / self.decisions as f64
        }
    }
}

/// Safety rejections only: the part of the verdict that explains why the
/// proposal was overridden.
fn rejections(triggered: &[TriggeredRule]) -> Vec<TriggeredRule> {
    triggered
        .iter()
        .filter(|r| r.verdict == VerdictKind::Forbid)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirectionFlags, Position, WeatherKind};

    fn controller() -> HybridController {
        HybridController::new(&Config::default(), 42)
    }

    fn state() -> PhysicalState {
        PhysicalState {
            position: Position::new(10, 10, 5),
            battery: 80.0,
            has_cargo: false,
            pickup: Position::new(10, 10, 5),
            delivery: Position::new(20, 20, 4),
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
    fn admissible_proposal_takes_the_exploit_path() {
        let mut c = controller();
        let s = state();
        let key = c.discretize(&s);
        // Teach the agent a clear preference for an admissible action.
        c.agent_mut().update(&key, Action::MoveEast, 50.0, &key, true);

        let d = c.decide(&s, false);
        assert_eq!(d.action, Action::MoveEast);
        assert_eq!(d.path, DecisionPath::Exploit);
        assert!(d.triggered.is_empty());
    }

    #[test]
    fn storm_override_falls_back_to_hover() {
        let mut c = controller();
        let mut s = state();
        s.weather = WeatherKind::Storm;
        // En route: away from the pickup cell so no mission rule biases
        // the tie-break.
        s.pickup = Position::new(2, 2, 5);
        let key = c.discretize(&s);
        c.agent_mut().update(&key, Action::MoveNorth, 50.0, &key, true);

        let d = c.decide(&s, false);
        assert_eq!(d.proposed, Action::MoveNorth);
        assert_ne!(d.path, DecisionPath::Exploit);
        assert!(!d.action.is_movement());
        assert_eq!(d.action, Action::Hover);
        assert!(d.triggered.iter().any(|r| r.name == "severe_weather"));
    }

    #[test]
    fn override_picks_highest_valued_admissible() {
        let mut c = controller();
        let mut s = state();
        s.weather = WeatherKind::Storm;
        let key = c.discretize(&s);
        c.agent_mut().update(&key, Action::MoveNorth, 80.0, &key, true);
        c.agent_mut().update(&key, Action::Charge, 30.0, &key, true);

        let d = c.decide(&s, false);
        assert_eq!(d.action, Action::Charge);
        assert_eq!(d.path, DecisionPath::Override);
    }

    #[test]
    fn explanation_names_the_blocking_rule() {
        let mut c = controller();
        let mut s = state();
        s.battery = 4.0;
        let (_, explanation) = c.policy_action(&s);
        assert!(explanation.contains("critical_battery") || explanation.contains("exploit"));
    }

    #[test]
    fn override_rate_tracks_decisions() {
        let mut c = controller();
        let s = state();
        c.decide(&s, false);
        assert_eq!(c.decisions(), 1);
        assert_eq!(c.override_rate(), 0.0);
    }
}
