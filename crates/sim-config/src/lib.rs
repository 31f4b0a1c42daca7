#![deny(warnings)]

//! Game configuration bundle: baseline, valuation constants, game rules,
//! scenario schedule, special-event library and the decision catalog.
//!
//! Every game owns its own [`GameConfig`]. [`GameConfig::builtin`] reproduces
//! the standard game; [`GameConfig::load`] reads a full bundle from YAML.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core as core;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

const CATALOG_YAML: &str = include_str!("../assets/decisions.yaml");
const SCENARIOS_YAML: &str = include_str!("../assets/scenarios.yaml");
const EVENTS_YAML: &str = include_str!("../assets/events.yaml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("yaml error: {0}")]
    Yaml(String),
    #[error("invalid config: {0}")]
    Invalid(#[from] core::ValidationError),
    #[error("invalid rules: {0}")]
    Rules(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e.to_string())
    }
}

/// Rules of play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    pub total_rounds: u8,
    pub max_teams: usize,
    /// Decisions a team may take per lever per round.
    pub picks_per_category: usize,
    /// Cash a team may commit to card costs in each round (USD millions).
    pub investment_budget_per_round: Decimal,
    /// Years projected after the last round for the final simulation.
    pub simulation_years: u8,
    /// Standard projection horizon in years.
    pub horizon_years: u8,
    /// Seed for the market-outlook statement picker.
    pub outlook_seed: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            max_teams: 20,
            picks_per_category: 1,
            investment_budget_per_round: Decimal::new(1200, 0),
            simulation_years: 5,
            horizon_years: 10,
            outlook_seed: 2026,
        }
    }
}

impl GameRules {
    /// Horizon of the post-game simulation.
    pub fn final_horizon_years(&self) -> u8 {
        self.horizon_years.saturating_add(self.simulation_years)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Assumed dividend yield added to every round's TSR.
    pub dividend_yield: Decimal,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            dividend_yield: Decimal::new(25, 3),
        }
    }
}

/// Full configuration of one game instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub baseline: core::BaselineFinancials,
    pub constants: core::ModelConstants,
    pub bau: core::BauAssumptions,
    #[serde(default)]
    pub rules: GameRules,
    #[serde(default)]
    pub scoring: ScoringRules,
    #[serde(default)]
    pub scenarios: core::ScenarioSchedule,
    #[serde(default)]
    pub events: Vec<core::SpecialEvent>,
    #[serde(default)]
    pub catalog: core::DecisionCatalog,
}

/// Year-0 statement of the standard game (USD millions).
pub fn builtin_baseline() -> core::BaselineFinancials {
    core::BaselineFinancials {
        revenue: Decimal::new(42836, 0),
        cogs: Decimal::new(-37037, 0),
        sga: Decimal::new(-2061, 0),
        ebitda: Decimal::new(3738, 0),
        depreciation: Decimal::new(-1510, 0),
        amortization: Decimal::new(-112, 0),
        ebit: Decimal::new(2116, 0),
        cash_taxes: Decimal::new(-466, 0),
        capex: Decimal::new(-1713, 0),
        operating_fcf: Decimal::new(1559, 0),
        beginning_cash: Decimal::new(1247, 0),
        invested_capital: Decimal::new(1_582_772, 2),
        npv: Decimal::new(22738, 0),
        equity_value: Decimal::new(14555, 0),
        shares_outstanding: Decimal::new(28734, 2),
        share_price: Decimal::new(5067, 2),
    }
}

pub fn builtin_constants() -> core::ModelConstants {
    core::ModelConstants {
        wacc: Decimal::new(8, 2),
        terminal_growth: Decimal::new(2, 2),
        tax_rate: Decimal::new(22, 2),
        capex_revenue_ratio: Decimal::new(4, 2),
        net_debt: Decimal::new(7765, 0),
        minority_interest: Decimal::new(418, 0),
        shares_outstanding: Decimal::new(28734, 2),
    }
}

pub fn builtin_bau() -> core::BauAssumptions {
    core::BauAssumptions {
        organic_growth: Decimal::new(2, 2),
        sga_growth: Decimal::new(2, 2),
        capital_turnover_lock_year: 5,
        topline_erosion_per_skip: Decimal::new(1, 3),
        // 2029 recession, 2030 recovery
        growth_shocks: vec![
            core::GrowthShock {
                year: 4,
                from_round: core::Round(4),
                growth: Decimal::new(-15, 2),
            },
            core::GrowthShock {
                year: 5,
                from_round: core::Round(5),
                growth: Decimal::new(18, 2),
            },
        ],
        cost_pressure: Some(core::CostPressure {
            from_year: 3,
            from_round: core::Round(3),
            cogs_ratio_uplift: Decimal::new(5, 3),
        }),
    }
}

/// Parses the embedded 75-card catalog.
pub fn builtin_catalog() -> Result<core::DecisionCatalog, ConfigError> {
    let decisions: Vec<core::Decision> = serde_yaml::from_str(CATALOG_YAML)?;
    Ok(core::DecisionCatalog::new(decisions))
}

pub fn builtin_scenarios() -> Result<core::ScenarioSchedule, ConfigError> {
    Ok(serde_yaml::from_str(SCENARIOS_YAML)?)
}

pub fn builtin_events() -> Result<Vec<core::SpecialEvent>, ConfigError> {
    Ok(serde_yaml::from_str(EVENTS_YAML)?)
}

impl GameConfig {
    /// The standard game, validated.
    pub fn builtin() -> Result<Self, ConfigError> {
        let cfg = Self {
            baseline: builtin_baseline(),
            constants: builtin_constants(),
            bau: builtin_bau(),
            rules: GameRules::default(),
            scoring: ScoringRules::default(),
            scenarios: builtin_scenarios()?,
            events: builtin_events()?,
            catalog: builtin_catalog()?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses and validates a YAML bundle.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let cfg = Self::from_yaml_str(&text)?;
        info!(
            path = %path.as_ref().display(),
            decisions = cfg.catalog.len(),
            events = cfg.events.len(),
            "loaded game config"
        );
        Ok(cfg)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks every invariant the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        core::validate_constants(&self.constants)?;
        core::validate_baseline(&self.baseline)?;
        core::validate_bau(&self.bau)?;
        let rounds = self.rules.total_rounds;
        if rounds == 0 {
            return Err(ConfigError::Rules("total_rounds must be >= 1".into()));
        }
        if self.rules.horizon_years < rounds {
            return Err(ConfigError::Rules(format!(
                "horizon of {} years does not cover {} rounds",
                self.rules.horizon_years, rounds
            )));
        }
        if self.rules.picks_per_category == 0 || self.rules.max_teams == 0 {
            return Err(ConfigError::Rules(
                "picks_per_category and max_teams must be >= 1".into(),
            ));
        }
        if self.rules.investment_budget_per_round < Decimal::ZERO
            || self.scoring.dividend_yield < Decimal::ZERO
        {
            return Err(ConfigError::Rules(
                "budget and dividend yield must be >= 0".into(),
            ));
        }
        core::validate_catalog(&self.catalog, rounds)?;
        core::validate_scenarios(&self.scenarios, rounds)?;
        core::validate_events(&self.events, &self.catalog, rounds)?;
        Ok(())
    }

    pub fn event(&self, key: &str) -> Option<&core::SpecialEvent> {
        self.events.iter().find(|e| e.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{Category, DecisionId, EventEffect, Round};

    #[test]
    fn builtin_is_valid() {
        let cfg = GameConfig::builtin().unwrap();
        assert_eq!(cfg.catalog.len(), 75);
        assert_eq!(cfg.events.len(), 6);
        assert_eq!(cfg.rules.final_horizon_years(), 15);
    }

    #[test]
    fn catalog_layout_is_five_per_lever_per_round() {
        let catalog = builtin_catalog().unwrap();
        for r in 1..=5u8 {
            for cat in Category::ALL {
                let n = catalog
                    .introduced_in(Round(r))
                    .filter(|d| d.category() == cat)
                    .count();
                assert_eq!(n, 5, "round {r} {cat}");
            }
        }
        let numbers: Vec<u16> = catalog.iter().map(|d| d.number).collect();
        assert_eq!(numbers, (1..=75).collect::<Vec<u16>>());
    }

    #[test]
    fn ids_encode_category_and_round() {
        for d in builtin_catalog().unwrap().iter() {
            let prefix = format!("{}-{}-", d.category(), d.introduced_round.0);
            assert!(d.id.0.starts_with(&prefix), "{}", d.id);
        }
    }

    #[test]
    fn topline_cards_are_tagged_per_round() {
        let catalog = builtin_catalog().unwrap();
        let per_round: Vec<usize> = (1..=5u8)
            .map(|r| {
                catalog
                    .introduced_in(Round(r))
                    .filter(|d| d.sustains_topline)
                    .count()
            })
            .collect();
        assert_eq!(per_round, vec![2, 2, 1, 2, 3]);
        for d in catalog.iter().filter(|d| d.sustains_topline) {
            assert_eq!(d.category(), Category::Sustain);
            assert_eq!(d.subcategory, "Sustain Topline", "{}", d.id);
        }
    }

    #[test]
    fn builtin_macro_path() {
        let bau = builtin_bau();
        assert_eq!(bau.shock_in(4, Round(3)), None);
        assert_eq!(
            bau.shock_in(4, Round(4)).map(|s| s.growth),
            Some(Decimal::new(-15, 2))
        );
        assert_eq!(bau.cogs_uplift_in(3, Round(3)), Decimal::new(5, 3));
        assert_eq!(bau.cogs_uplift_in(2, Round(5)), Decimal::ZERO);
    }

    #[test]
    fn scenario_multipliers_by_round() {
        let s = builtin_scenarios().unwrap();
        assert_eq!(s.modifiers_for(Round(3)).optimize, Decimal::new(12, 1));
        assert_eq!(s.modifiers_for(Round(4)).sustain, Decimal::new(15, 1));
        assert_eq!(s.modifiers_for(Round(5)).grow, Decimal::new(13, 1));
    }

    #[test]
    fn oem_cancellation_zeroes_concentrated_capacity() {
        let cfg = GameConfig::builtin().unwrap();
        let e = cfg.event("oem_program_cancellation").unwrap();
        assert_eq!(e.round, Round(3));
        assert_eq!(
            e.effect_on(&DecisionId::new("grow-2-5")),
            Some(&EventEffect::ZeroReturns)
        );
        assert_eq!(e.shielded_by, vec![DecisionId::new("grow-2-4")]);
    }

    #[test]
    fn rejects_growth_at_wacc() {
        let mut cfg = GameConfig::builtin().unwrap();
        cfg.constants.terminal_growth = cfg.constants.wacc;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_short_horizon() {
        let mut cfg = GameConfig::builtin().unwrap();
        cfg.rules.horizon_years = 4;
        assert!(matches!(cfg.validate(), Err(ConfigError::Rules(_))));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        assert!(matches!(
            GameConfig::from_yaml_str("baseline: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
