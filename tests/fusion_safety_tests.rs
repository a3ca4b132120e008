//! Fusion safety tests.
//!
//! The safety contract under test:
//! - a triggered safety-forbid is absolute: fusion never returns that
//!   action, whatever the agent prefers or values;
//! - the admissible set is never empty for any reachable state;
//! - the fail-safe action is the landing/hover default when everything
//!   else is forbidden.

use skycourier::types::{Direction, DirectionFlags, Position, WeatherKind};
use skycourier::{
    Action, Config, DecisionPath, HybridController, PhysicalState, RuleEngine,
};

fn cruising_state() -> PhysicalState {
    PhysicalState {
        position: Position::new(12, 12, 6),
        battery: 70.0,
        has_cargo: true,
        pickup: Position::new(3, 3, 3),
        delivery: Position::new(25, 25, 4),
        weather: WeatherKind::Clear,
        wind_speed: 12.0,
        obstacles: DirectionFlags::EMPTY,
        no_fly_adjacent: DirectionFlags::EMPTY,
        on_charging_cell: false,
        elapsed_steps: 40,
        blocked_streak: 0,
        storm_exposure: 0,
    }
}

/// Battery at 4% (below the 5% cannot-fly floor), agent prefers
/// MOVE_NORTH: fusion must return a landing-capable action instead.
#[test]
fn critical_battery_overrides_preferred_move() {
    let cfg = Config::default();
    let mut controller = HybridController::new(&cfg, 1);
    let mut state = cruising_state();
    state.battery = 4.0;

    // Teach the agent a strong (unsafe) preference first.
    let key = controller.discretize(&state);
    controller
        .agent_mut()
        .update(&key, Action::MoveNorth, 500.0, &key, true);

    let decision = controller.decide(&state, false);
    assert_eq!(decision.proposed, Action::MoveNorth);
    assert_ne!(decision.action, Action::MoveNorth);
    assert!(
        matches!(decision.action, Action::MoveDown | Action::Charge | Action::Deliver),
        "expected a grounded action, got {:?}",
        decision.action
    );
    assert!(decision
        .triggered
        .iter()
        .any(|r| r.name == "critical_battery"));
}

/// Storm: every movement proposal is inadmissible; fusion falls back to
/// hover (battery is healthy, so hover itself is not forbidden).
#[test]
fn storm_grounds_all_movement_proposals() {
    let cfg = Config::default();
    let mut state = cruising_state();
    state.weather = WeatherKind::Storm;

    for unsafe_action in [
        Action::MoveNorth,
        Action::MoveSouth,
        Action::MoveEast,
        Action::MoveWest,
        Action::MoveUp,
        Action::MoveDown,
    ] {
        let mut controller = HybridController::new(&cfg, 1);
        let key = controller.discretize(&state);
        controller
            .agent_mut()
            .update(&key, unsafe_action, 300.0, &key, true);

        let decision = controller.decide(&state, false);
        assert_eq!(decision.proposed, unsafe_action);
        assert_eq!(decision.action, Action::Hover);
        assert_ne!(decision.path, DecisionPath::Exploit);
    }
}

/// Safety absoluteness, swept: whenever the engine forbids the agent's
/// proposal, the fused action differs from it and is itself admissible.
#[test]
fn fused_action_is_always_admissible() {
    let cfg = Config::default();
    let engine = RuleEngine::standard(&cfg.rules);
    let mut controller = HybridController::new(&cfg, 3);

    let batteries = [2.0, 4.9, 10.0, 30.0, 90.0];
    let weathers = [
        WeatherKind::Clear,
        WeatherKind::Wind,
        WeatherKind::Rain,
        WeatherKind::Storm,
    ];
    let obstacle_masks = [0u8, 0b0000_0001, 0b0010_0000, 0b0011_1111];

    for &battery in &batteries {
        for &weather in &weathers {
            for &mask in &obstacle_masks {
                let mut state = cruising_state();
                state.battery = battery;
                state.weather = weather;
                state.obstacles = DirectionFlags(mask);

                let decision = controller.decide(&state, false);
                let verdict = engine.evaluate(&state, decision.action);
                let fail_safe = engine.fail_safe(&state);
                assert!(
                    verdict.admissible || decision.action == fail_safe,
                    "inadmissible fused action {:?} (battery={battery}, \
                     weather={weather:?}, mask={mask:#08b})",
                    decision.action,
                );
            }
        }
    }
}

/// Non-empty admissibility across a hostile sweep of states.
#[test]
fn admissible_set_never_empty() {
    let cfg = Config::default();
    let engine = RuleEngine::standard(&cfg.rules);

    for battery in [0.5, 4.0, 5.0, 15.0, 50.0, 100.0] {
        for weather in [WeatherKind::Clear, WeatherKind::Storm] {
            for mask in 0u8..=0b0011_1111 {
                let mut state = cruising_state();
                state.battery = battery;
                state.weather = weather;
                state.obstacles = DirectionFlags(mask);
                state.no_fly_adjacent = DirectionFlags(mask & 0b0000_1111);

                let actions = engine.admissible_actions(&state);
                assert!(
                    !actions.is_empty(),
                    "empty admissible set (battery={battery}, weather={weather:?}, \
                     mask={mask:#08b})"
                );
            }
        }
    }
}

/// No-fly adjacency forbids exactly the entering move; fusion routes
/// around it.
#[test]
fn no_fly_adjacency_redirects_the_route() {
    let cfg = Config::default();
    let mut controller = HybridController::new(&cfg, 5);
    let mut state = cruising_state();
    state.no_fly_adjacent.set(Direction::East);

    let key = controller.discretize(&state);
    controller
        .agent_mut()
        .update(&key, Action::MoveEast, 400.0, &key, true);
    controller
        .agent_mut()
        .update(&key, Action::MoveSouth, 100.0, &key, true);

    let decision = controller.decide(&state, false);
    assert_eq!(decision.proposed, Action::MoveEast);
    assert_eq!(decision.action, Action::MoveSouth);
    assert_eq!(decision.path, DecisionPath::Override);
    assert!(decision.triggered.iter().any(|r| r.name == "no_fly_entry"));
}

/// A lockdown rule set (everything forbidden) collapses the admissible
/// set to the fail-safe singleton, and fusion reports the fail-safe
/// path.
#[test]
fn lockdown_collapses_to_the_fail_safe() {
    use skycourier::{HybridController as Controller, Rule, RuleCategory, RuleCondition, VerdictKind};

    let cfg = Config::default();
    let lockdown = RuleEngine::new(
        vec![Rule {
            name: "fleet_grounded",
            category: RuleCategory::Safety,
            priority: 200,
            condition: RuleCondition::Always,
            verdict: VerdictKind::Forbid,
            bias: 0.0,
            explanation: "operator lockdown grounds the fleet",
        }],
        &cfg.rules,
    );

    let state = cruising_state();
    let admissible = lockdown.admissible_actions(&state);
    assert_eq!(admissible, vec![lockdown.fail_safe(&state)]);
    assert_eq!(admissible, vec![Action::Hover]);

    let mut controller = Controller::with_engine(&cfg, lockdown, 8);
    let decision = controller.decide(&state, false);
    assert_eq!(decision.action, Action::Hover);
    assert_eq!(decision.path, DecisionPath::FailSafe);
    assert!(decision.triggered.iter().any(|r| r.name == "fleet_grounded"));
}

/// Decision explanations carry the blocking rule names for the
/// policy-query interface.
#[test]
fn explanations_surface_triggering_rules() {
    let cfg = Config::default();
    let mut controller = HybridController::new(&cfg, 2);
    let mut state = cruising_state();
    state.weather = WeatherKind::Storm;

    let key = controller.discretize(&state);
    controller
        .agent_mut()
        .update(&key, Action::MoveWest, 200.0, &key, true);

    let (action, explanation) = controller.policy_action(&state);
    assert!(!action.is_movement());
    assert!(explanation.contains("severe_weather"));
    assert!(explanation.contains("path=override") || explanation.contains("path=fail_safe"));
}
