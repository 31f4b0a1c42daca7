use rust_decimal::Decimal;
use sim_config::GameConfig;
use sim_core::{Round, SelectedDecision};
use sim_valuation::ProjectionEngine;

fn setup() -> (GameConfig, ProjectionEngine) {
    let cfg = GameConfig::builtin().unwrap();
    let engine = ProjectionEngine::new(&cfg).unwrap();
    (cfg, engine)
}

#[test]
fn single_grow_decision_costs_cash_then_adds_revenue() {
    let (cfg, engine) = setup();
    // cost 500, 10% five-year growth, available from round 1
    let card = cfg.catalog.get(&sim_core::DecisionId::new("grow-1-2")).unwrap();
    assert_eq!(card.cost, Decimal::new(500, 0));
    let scenarios = cfg.scenarios.neutralized();
    let picks = [SelectedDecision::new("grow-1-2", 1)];
    let team = engine.project_team(&picks, &scenarios, &[], 10).unwrap();
    let bau = engine.project_team(&[], &scenarios, &[], 10).unwrap();
    assert!(team[0].operating_fcf < bau[0].operating_fcf);
    let team_revenue: Decimal = team[2..].iter().map(|m| m.revenue).sum();
    let bau_revenue: Decimal = bau[2..].iter().map(|m| m.revenue).sum();
    assert!(team_revenue > bau_revenue);
}

#[test]
fn later_decisions_never_change_earlier_snapshots() {
    let (cfg, engine) = setup();
    let round_one = vec![
        SelectedDecision::new("grow-1-1", 1),
        SelectedDecision::new("optimize-1-3", 1),
    ];
    let before = engine
        .round_snapshot(&round_one, &cfg.scenarios, &cfg.events, Round(1), 10)
        .unwrap();
    let mut all = round_one.clone();
    all.push(SelectedDecision::new("grow-2-5", 2));
    all.push(SelectedDecision::new("sustain-2-4", 2));
    let after = engine
        .round_snapshot(&all, &cfg.scenarios, &cfg.events, Round(1), 10)
        .unwrap();
    assert_eq!(before, after);
    let history = engine.project_team(&all, &cfg.scenarios, &cfg.events, 10).unwrap();
    assert_eq!(history[0], before);
    assert_ne!(history[1], before);
}

#[test]
fn cash_rolls_forward_between_rounds() {
    let (cfg, engine) = setup();
    let picks = [SelectedDecision::new("sustain-1-3", 1)];
    let history = engine.project_team(&picks, &cfg.scenarios, &[], 10).unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].beginning_cash, cfg.baseline.beginning_cash);
    assert_eq!(
        history[0].ending_cash,
        history[0].beginning_cash + history[0].operating_fcf
    );
    // later rounds only reveal conditions for later years, so cash chains exactly
    for pair in history.windows(2) {
        assert_eq!(pair[1].beginning_cash, pair[0].ending_cash);
    }
}

#[test]
fn cancelled_program_returns_nothing_unless_shielded() {
    let (cfg, engine) = setup();
    let event = cfg.event("oem_program_cancellation").unwrap().clone();
    let exposed = [SelectedDecision::new("grow-2-5", 2)];
    let hit = engine
        .project(&exposed, &cfg.scenarios, std::slice::from_ref(&event), 10)
        .unwrap();
    let bau = engine.project(&[], &cfg.scenarios, &[], 10).unwrap();
    assert_eq!(hit.year(3).unwrap().revenue, bau.year(3).unwrap().revenue);
    let calm = engine.project(&exposed, &cfg.scenarios, &[], 10).unwrap();
    assert!(hit.share_price < calm.share_price);

    let shielded = [
        SelectedDecision::new("grow-2-5", 2),
        SelectedDecision::new("grow-2-4", 2),
    ];
    let with_event = engine
        .project(&shielded, &cfg.scenarios, std::slice::from_ref(&event), 10)
        .unwrap();
    let without = engine.project(&shielded, &cfg.scenarios, &[], 10).unwrap();
    assert_eq!(with_event, without);
}

#[test]
fn technology_shift_bonus_raises_value() {
    let (cfg, engine) = setup();
    let event = cfg.event("technology_shift").unwrap().clone();
    let picks = [SelectedDecision::new("grow-1-1", 1)];
    let boosted = engine
        .project(&picks, &cfg.scenarios, std::slice::from_ref(&event), 10)
        .unwrap();
    let plain = engine.project(&picks, &cfg.scenarios, &[], 10).unwrap();
    assert_eq!(boosted.year(1), plain.year(1));
    assert!(boosted.year(2).unwrap().revenue > plain.year(2).unwrap().revenue);
    assert!(boosted.enterprise_value > plain.enterprise_value);
}

#[test]
fn final_simulation_extends_horizon() {
    let (cfg, engine) = setup();
    let picks = [
        SelectedDecision::new("grow-1-2", 1),
        SelectedDecision::new("optimize-2-2", 2),
    ];
    let standard = engine
        .project_as_of(&picks, &cfg.scenarios, &[], 10, Round(5))
        .unwrap();
    let fin = engine.final_simulation(&picks, &cfg.scenarios, &[]).unwrap();
    assert_eq!(fin.revenue, standard.year(10).unwrap().revenue);
    assert_ne!(fin.share_price, standard.share_price);
}
