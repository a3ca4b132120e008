// src/rules.rs
//
// Symbolic rule engine: an immutable, priority-ordered collection of
// condition -> verdict rules evaluated against (state, candidate action).
//
// Resolution contract: a triggered safety-forbid is absolute. Mission and
// efficiency rules only contribute bias information for tie-breaking among
// admissible alternatives; they never change admissibility.

use serde::Serialize;

use crate::config::RuleConfig;
use crate::drone::PhysicalState;
use crate::types::{Action, Direction, WeatherKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleCategory {
    Safety,
    Mission,
    Efficiency,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Safety => "safety",
            RuleCategory::Mission => "mission",
            RuleCategory::Efficiency => "efficiency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictKind {
    /// The action must not be taken (absolute when category is Safety).
    Forbid,
    /// The action is what the rule wants taken here (strong bias).
    Require,
    /// Soft preference for or against the action.
    Bias,
}

/// Rule predicate as a tagged variant carrying its thresholds, so the
/// evaluation loop is a uniform fold over one data shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RuleCondition {
    /// Matches every (state, action) pair. Used by lockdown rule sets
    /// (ground the fleet) and by tests exercising the fail-safe path.
    Always,
    /// Battery below the hard floor: every battery-consuming flight action
    /// is forbidden; only descent, charging, and delivery remain.
    CriticalBattery { threshold: f64 },
    /// Battery too low to climb.
    LowBatteryClimb { threshold: f64 },
    /// Storm or over-limit wind forbids all movement.
    SevereWeather { max_wind: f64 },
    /// Movement into a cell flagged by the obstacle-proximity sensor
    /// (building envelope plus clearance margin, or a grid bound).
    BuildingClearance,
    /// Horizontal movement into an adjacent no-fly cell.
    NoFlyEntry,
    /// Pickup is possible right here.
    PickupReady,
    /// Delivery is possible right here.
    DeliverReady,
    /// On a charging cell with battery below the threshold.
    ChargeOpportunity { threshold: f64 },
    /// Discourage climbing when conserving energy.
    ConserveEnergy { threshold: f64 },
}

impl RuleCondition {
    /// Does this rule apply to `(state, action)`?
    pub fn matches(&self, state: &PhysicalState, action: Action) -> bool {
        match *self {
            RuleCondition::Always => true,
            RuleCondition::CriticalBattery { threshold } => {
                state.battery < threshold
                    && (matches!(action, Action::Hover)
                        || matches!(
                            action.movement(),
                            Some(
                                Direction::North
                                    | Direction::South
                                    | Direction::East
                                    | Direction::West
                                    | Direction::Up
                            )
                        ))
            }
            RuleCondition::LowBatteryClimb { threshold } => {
                state.battery < threshold && action == Action::MoveUp
            }
            RuleCondition::SevereWeather { max_wind } => {
                (state.weather == WeatherKind::Storm || state.wind_speed > max_wind)
                    && action.is_movement()
            }
            RuleCondition::BuildingClearance => action
                .movement()
                .is_some_and(|dir| state.obstacles.contains(dir)),
            RuleCondition::NoFlyEntry => action
                .movement()
                .is_some_and(|dir| state.no_fly_adjacent.contains(dir)),
            RuleCondition::PickupReady => {
                action == Action::Pickup && !state.has_cargo && state.at_pickup()
            }
            RuleCondition::DeliverReady => {
                action == Action::Deliver && state.has_cargo && state.at_delivery()
            }
            RuleCondition::ChargeOpportunity { threshold } => {
                action == Action::Charge && state.on_charging_cell && state.battery < threshold
            }
            RuleCondition::ConserveEnergy { threshold } => {
                action == Action::MoveUp && state.battery < threshold
            }
        }
    }
}

/// A registered rule. Immutable once the engine is constructed.
#[derive(Debug, Clone, Serialize)]
pub struct Rule {
    pub name: &'static str,
    pub category: RuleCategory,
    /// Higher wins; explanations are reported in descending priority.
    pub priority: i32,
    pub condition: RuleCondition,
    pub verdict: VerdictKind,
    /// Tie-break weight among admissible alternatives. Positive favors
    /// the action, negative disfavors it. Zero for forbid rules.
    pub bias: f64,
    pub explanation: &'static str,
}

/// One triggered rule, as surfaced in the decision trace.
#[derive(Debug, Clone, Serialize)]
pub struct TriggeredRule {
    pub name: &'static str,
    pub category: RuleCategory,
    pub priority: i32,
    pub verdict: VerdictKind,
    pub explanation: &'static str,
}

/// Aggregate result of evaluating all rules for one (state, action).
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub admissible: bool,
    /// Triggered rules, descending priority.
    pub triggered: Vec<TriggeredRule>,
}

/// Rule engine. Owns a dependency-injected rule collection; produces
/// verdicts and never mutates state.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    critical_battery: f64,
}

impl RuleEngine {
    /// Build an engine from an explicit rule collection. Rules are sorted
    /// by descending priority once, here; registration order breaks
    /// priority ties (stable sort).
    pub fn new(mut rules: Vec<Rule>, cfg: &RuleConfig) -> Self {
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
        Self {
            rules,
            critical_battery: cfg.critical_battery,
        }
    }

    /// The standard rule set, thresholds injected from config.
    pub fn standard(cfg: &RuleConfig) -> Self {
        let rules = vec![
            Rule {
                name: "critical_battery",
                category: RuleCategory::Safety,
                priority: 100,
                condition: RuleCondition::CriticalBattery {
                    threshold: cfg.critical_battery,
                },
                verdict: VerdictKind::Forbid,
                bias: 0.0,
                explanation: "battery below the hard floor; descend or charge",
            },
            Rule {
                name: "severe_weather",
                category: RuleCategory::Safety,
                priority: 95,
                condition: RuleCondition::SevereWeather {
                    max_wind: cfg.max_safe_wind,
                },
                verdict: VerdictKind::Forbid,
                bias: 0.0,
                explanation: "storm or over-limit wind grounds all movement",
            },
            Rule {
                name: "low_battery_climb",
                category: RuleCategory::Safety,
                priority: 90,
                condition: RuleCondition::LowBatteryClimb {
                    threshold: cfg.min_battery_to_fly,
                },
                verdict: VerdictKind::Forbid,
                bias: 0.0,
                explanation: "battery too low to climb",
            },
            Rule {
                name: "building_clearance",
                category: RuleCategory::Safety,
                priority: 88,
                condition: RuleCondition::BuildingClearance,
                verdict: VerdictKind::Forbid,
                bias: 0.0,
                explanation: "destination cell inside a building envelope or clearance margin",
            },
            Rule {
                name: "no_fly_entry",
                category: RuleCategory::Safety,
                priority: 85,
                condition: RuleCondition::NoFlyEntry,
                verdict: VerdictKind::Forbid,
                bias: 0.0,
                explanation: "destination cell lies inside a no-fly zone",
            },
            Rule {
                name: "deliver_cargo",
                category: RuleCategory::Mission,
                priority: 65,
                condition: RuleCondition::DeliverReady,
                verdict: VerdictKind::Require,
                bias: 10.0,
                explanation: "cargo aboard and destination reached",
            },
            Rule {
                name: "pickup_cargo",
                category: RuleCategory::Mission,
                priority: 60,
                condition: RuleCondition::PickupReady,
                verdict: VerdictKind::Require,
                bias: 10.0,
                explanation: "at the pickup origin without cargo",
            },
            Rule {
                name: "charge_when_low",
                category: RuleCategory::Efficiency,
                priority: 40,
                condition: RuleCondition::ChargeOpportunity {
                    threshold: cfg.conserve_battery,
                },
                verdict: VerdictKind::Bias,
                bias: 5.0,
                explanation: "on a charging cell with a low battery",
            },
            Rule {
                name: "conserve_energy",
                category: RuleCategory::Efficiency,
                priority: 30,
                condition: RuleCondition::ConserveEnergy {
                    threshold: cfg.conserve_battery,
                },
                verdict: VerdictKind::Bias,
                bias: -2.0,
                explanation: "climbing wastes energy on a low battery",
            },
        ];
        Self::new(rules, cfg)
    }

    /// Evaluate every registered rule against `(state, action)`.
    pub fn evaluate(&self, state: &PhysicalState, action: Action) -> Verdict {
        let mut admissible = true;
        let mut triggered = Vec::new();

        // Rules are pre-sorted by descending priority, so the triggered
        // list comes out ordered for free.
        for rule in &self.rules {
            if !rule.condition.matches(state, action) {
                continue;
            }
            if rule.category == RuleCategory::Safety && rule.verdict == VerdictKind::Forbid {
                admissible = false;
            }
            triggered.push(TriggeredRule {
                name: rule.name,
                category: rule.category,
                priority: rule.priority,
                verdict: rule.verdict,
                explanation: rule.explanation,
            });
        }

        Verdict {
            admissible,
            triggered,
        }
    }

    /// All admissible actions for this state, in canonical action order.
    /// Never empty: collapses to the fail-safe singleton when every
    /// action is forbidden.
    pub fn admissible_actions(&self, state: &PhysicalState) -> Vec<Action> {
        let admissible: Vec<Action> = Action::ALL
            .iter()
            .copied()
            .filter(|&a| self.evaluate(state, a).admissible)
            .collect();
        if admissible.is_empty() {
            vec![self.fail_safe(state)]
        } else {
            admissible
        }
    }

    /// The designated fail-safe: emergency descent when the battery is
    /// critically low and the cell below is clear, hover otherwise.
    pub fn fail_safe(&self, state: &PhysicalState) -> Action {
        if state.battery < self.critical_battery && !state.obstacles.contains(Direction::Down) {
            Action::MoveDown
        } else {
            Action::Hover
        }
    }

    /// Summed tie-break weight of the matching non-forbid rules.
    pub fn bias_score(&self, state: &PhysicalState, action: Action) -> f64 {
        self.rules
            .iter()
            .filter(|r| r.verdict != VerdictKind::Forbid && r.condition.matches(state, action))
            .map(|r| r.bias)
            .sum()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
