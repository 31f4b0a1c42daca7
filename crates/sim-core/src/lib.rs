#![deny(warnings)]

//! Core domain models and invariants for the Value Creation simulation.
//!
//! This crate defines serializable types shared by the valuation engine,
//! the scoring engine and the game runtime, plus validation helpers that
//! reject malformed configuration before any projection runs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub mod decision;
pub mod financials;
pub mod scenario;

pub use decision::{
    ramp_factor, Category, Decision, DecisionCatalog, DecisionId, DecisionKind, DecisionMetrics,
    GrowMetrics, SavingsMetrics, SelectedDecision,
};
pub use financials::{
    BaselineFinancials, BauAssumptions, CostPressure, FinancialMetrics, GrowthShock,
    ModelConstants, SnapshotRatios,
};
pub use scenario::{
    EventEffect, Scenario, ScenarioKind, ScenarioModifiers, ScenarioSchedule, SpecialEvent,
};

/// First fiscal year of the projection window is `BASE_FISCAL_YEAR + 1`.
pub const BASE_FISCAL_YEAR: i32 = 2025;

/// Team number as shown to players (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team {}", self.0)
    }
}

/// Game round; round `r` is played in fiscal year `2025 + r` (projection year `r`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Round(pub u8);

impl Round {
    /// Projection year index (1-based) in which decisions of this round are taken.
    pub fn year(self) -> u32 {
        u32::from(self.0)
    }

    /// Calendar fiscal year of the round.
    pub fn fiscal_year(self) -> i32 {
        BASE_FISCAL_YEAR + i32::from(self.0)
    }

    /// The following round.
    pub fn next(self) -> Round {
        Round(self.0.saturating_add(1))
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Round {}", self.0)
    }
}

/// Validation errors for configuration invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// WACC must lie strictly between 0 and 1.
    #[error("WACC {0} must be within (0, 1)")]
    WaccOutOfRange(Decimal),
    /// Terminal growth must be non-negative and strictly below WACC.
    #[error("terminal growth {growth} must be >= 0 and < WACC {wacc}")]
    TerminalGrowthNotBelowWacc { wacc: Decimal, growth: Decimal },
    /// Tax rate must be within [0, 1).
    #[error("tax rate {0} must be within [0, 1)")]
    TaxRateOutOfRange(Decimal),
    /// Ratios such as capex/revenue must be within [0, 1).
    #[error("ratio `{0}` must be within [0, 1)")]
    RatioOutOfRange(&'static str),
    /// Share count must be strictly positive.
    #[error("shares outstanding must be > 0")]
    NonPositiveShares,
    /// Monetary value that must be non-negative was negative.
    #[error("negative monetary value for `{0}`")]
    NegativeMoney(String),
    /// Baseline revenue and invested capital must be strictly positive.
    #[error("baseline `{0}` must be > 0")]
    NonPositiveBaseline(&'static str),
    /// Baseline line items do not add up.
    #[error("baseline identity violated: {0}")]
    BaselineIdentity(&'static str),
    /// Round number outside the playable range.
    #[error("round {0} is out of range")]
    RoundOutOfRange(u8),
    /// Investment period must be at least one year.
    #[error("decision {0}: investment period must be >= 1")]
    InvalidPeriod(String),
    /// Ramp-up must be 1, 2 or 3 years.
    #[error("decision {0}: ramp-up years must be 1..=3")]
    InvalidRamp(String),
    /// EBIT margin on new revenue must lie in (-1, 1).
    #[error("decision {0}: EBIT margin out of range")]
    InvalidMargin(String),
    /// Decision ids must be unique across the catalog.
    #[error("duplicate decision id: {0}")]
    DuplicateDecision(String),
    /// A scenario multiplier was negative.
    #[error("round {0}: scenario multipliers must be >= 0")]
    NegativeMultiplier(u8),
    /// Two scenarios were configured for the same round.
    #[error("round {0}: duplicate scenario")]
    DuplicateScenario(u8),
    /// An event references a decision that is not in the catalog.
    #[error("event {event}: unknown decision {decision}")]
    UnknownDecision { event: String, decision: String },
    /// Event keys must be unique.
    #[error("duplicate event key: {0}")]
    DuplicateEvent(String),
    /// Only sustain cards can protect the topline.
    #[error("decision {0}: only sustain cards can sustain the topline")]
    ToplineNotSustain(String),
    /// Two growth shocks target the same projection year.
    #[error("year {0}: duplicate growth shock")]
    DuplicateShock(u32),
    /// Bonus and penalty factors must be non-negative.
    #[error("event {0}: effect factor must be >= 0")]
    InvalidEventFactor(String),
}

/// Validate model constants. WACC must exceed terminal growth for the
/// continuing-value formula to converge.
pub fn validate_constants(c: &ModelConstants) -> Result<(), ValidationError> {
    if c.wacc <= Decimal::ZERO || c.wacc >= Decimal::ONE {
        return Err(ValidationError::WaccOutOfRange(c.wacc));
    }
    if c.terminal_growth < Decimal::ZERO || c.terminal_growth >= c.wacc {
        return Err(ValidationError::TerminalGrowthNotBelowWacc {
            wacc: c.wacc,
            growth: c.terminal_growth,
        });
    }
    if c.tax_rate < Decimal::ZERO || c.tax_rate >= Decimal::ONE {
        return Err(ValidationError::TaxRateOutOfRange(c.tax_rate));
    }
    if c.capex_revenue_ratio < Decimal::ZERO || c.capex_revenue_ratio >= Decimal::ONE {
        return Err(ValidationError::RatioOutOfRange("capex_revenue_ratio"));
    }
    if c.shares_outstanding <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveShares);
    }
    if c.minority_interest < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney("minority_interest".into()));
    }
    Ok(())
}

/// Validate the baseline statement, including its accounting identities.
pub fn validate_baseline(b: &BaselineFinancials) -> Result<(), ValidationError> {
    if b.revenue <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveBaseline("revenue"));
    }
    if b.invested_capital <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveBaseline("invested_capital"));
    }
    if b.shares_outstanding <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveShares);
    }
    if b.cogs > Decimal::ZERO || b.sga > Decimal::ZERO {
        // Cost lines are carried signed (negative).
        return Err(ValidationError::BaselineIdentity("cogs and sga must be <= 0"));
    }
    if -b.cogs >= b.revenue {
        return Err(ValidationError::RatioOutOfRange("cogs/revenue"));
    }
    if b.ebitda != b.revenue + b.cogs + b.sga {
        return Err(ValidationError::BaselineIdentity("ebitda = revenue + cogs + sga"));
    }
    if b.ebit != b.ebitda + b.depreciation + b.amortization {
        return Err(ValidationError::BaselineIdentity(
            "ebit = ebitda + depreciation + amortization",
        ));
    }
    Ok(())
}

/// Validate BAU growth assumptions.
pub fn validate_bau(a: &BauAssumptions) -> Result<(), ValidationError> {
    if a.organic_growth <= -Decimal::ONE || a.sga_growth <= -Decimal::ONE {
        return Err(ValidationError::RatioOutOfRange("growth"));
    }
    if a.capital_turnover_lock_year == 0 {
        return Err(ValidationError::RoundOutOfRange(0));
    }
    if a.topline_erosion_per_skip < Decimal::ZERO {
        return Err(ValidationError::RatioOutOfRange("topline_erosion_per_skip"));
    }
    let mut years: BTreeSet<u32> = BTreeSet::new();
    for shock in &a.growth_shocks {
        if shock.year == 0 || shock.from_round.0 == 0 {
            return Err(ValidationError::RoundOutOfRange(0));
        }
        if shock.growth <= -Decimal::ONE {
            return Err(ValidationError::RatioOutOfRange("growth_shocks.growth"));
        }
        if !years.insert(shock.year) {
            return Err(ValidationError::DuplicateShock(shock.year));
        }
    }
    if let Some(c) = &a.cost_pressure {
        if c.cogs_ratio_uplift < Decimal::ZERO || c.cogs_ratio_uplift >= Decimal::ONE {
            return Err(ValidationError::RatioOutOfRange("cost_pressure.cogs_ratio_uplift"));
        }
    }
    Ok(())
}

/// Validate a single decision card against its category-specific block.
pub fn validate_decision(d: &Decision, total_rounds: u8) -> Result<(), ValidationError> {
    let id = || d.id.0.clone();
    if d.introduced_round.0 == 0 || d.introduced_round.0 > total_rounds {
        return Err(ValidationError::RoundOutOfRange(d.introduced_round.0));
    }
    if !(1..=3).contains(&d.ramp_up_years) {
        return Err(ValidationError::InvalidRamp(id()));
    }
    if d.cost < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(id()));
    }
    if d.sustains_topline && d.category() != Category::Sustain {
        return Err(ValidationError::ToplineNotSustain(id()));
    }
    if d.metrics.investment_period() == 0 {
        return Err(ValidationError::InvalidPeriod(id()));
    }
    match &d.metrics {
        DecisionMetrics::Grow(g) => {
            if g.investment_total < Decimal::ZERO || g.revenue_first_year < Decimal::ZERO {
                return Err(ValidationError::NegativeMoney(id()));
            }
            if g.ebit_margin <= -Decimal::ONE || g.ebit_margin >= Decimal::ONE {
                return Err(ValidationError::InvalidMargin(id()));
            }
            if g.five_year_growth <= -Decimal::ONE {
                return Err(ValidationError::InvalidMargin(id()));
            }
        }
        DecisionMetrics::Optimize(s) | DecisionMetrics::Sustain(s) => {
            if s.implementation_cost < Decimal::ZERO
                || s.investment < Decimal::ZERO
                || s.annual_saving < Decimal::ZERO
            {
                return Err(ValidationError::NegativeMoney(id()));
            }
        }
    }
    Ok(())
}

/// Validate the whole catalog: every card, and id uniqueness.
pub fn validate_catalog(c: &DecisionCatalog, total_rounds: u8) -> Result<(), ValidationError> {
    let mut ids: BTreeSet<&DecisionId> = BTreeSet::new();
    for d in c.iter() {
        validate_decision(d, total_rounds)?;
        if !ids.insert(&d.id) {
            return Err(ValidationError::DuplicateDecision(d.id.0.clone()));
        }
    }
    Ok(())
}

/// Validate the scenario schedule.
pub fn validate_scenarios(s: &ScenarioSchedule, total_rounds: u8) -> Result<(), ValidationError> {
    let mut seen: BTreeSet<Round> = BTreeSet::new();
    for sc in s.iter() {
        if sc.round.0 == 0 || sc.round.0 > total_rounds {
            return Err(ValidationError::RoundOutOfRange(sc.round.0));
        }
        if !seen.insert(sc.round) {
            return Err(ValidationError::DuplicateScenario(sc.round.0));
        }
        let m = &sc.modifiers;
        if m.grow < Decimal::ZERO || m.optimize < Decimal::ZERO || m.sustain < Decimal::ZERO {
            return Err(ValidationError::NegativeMultiplier(sc.round.0));
        }
    }
    Ok(())
}

/// Validate special events, including cross-references into the catalog.
pub fn validate_events(
    events: &[SpecialEvent],
    catalog: &DecisionCatalog,
    total_rounds: u8,
) -> Result<(), ValidationError> {
    let mut keys: BTreeSet<&str> = BTreeSet::new();
    for e in events {
        if !keys.insert(e.key.as_str()) {
            return Err(ValidationError::DuplicateEvent(e.key.clone()));
        }
        if e.round.0 == 0 || e.round.0 > total_rounds {
            return Err(ValidationError::RoundOutOfRange(e.round.0));
        }
        for (id, effect) in &e.effects {
            if catalog.get(id).is_none() {
                return Err(ValidationError::UnknownDecision {
                    event: e.key.clone(),
                    decision: id.0.clone(),
                });
            }
            if let EventEffect::Penalty(f) | EventEffect::Bonus(f) = effect {
                if *f < Decimal::ZERO {
                    return Err(ValidationError::InvalidEventFactor(e.key.clone()));
                }
            }
        }
        for id in &e.shielded_by {
            if catalog.get(id).is_none() {
                return Err(ValidationError::UnknownDecision {
                    event: e.key.clone(),
                    decision: id.0.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn constants() -> ModelConstants {
        ModelConstants {
            wacc: Decimal::new(8, 2),
            terminal_growth: Decimal::new(2, 2),
            tax_rate: Decimal::new(22, 2),
            capex_revenue_ratio: Decimal::new(4, 2),
            net_debt: Decimal::new(7765, 0),
            minority_interest: Decimal::new(418, 0),
            shares_outstanding: Decimal::new(28734, 2),
        }
    }

    fn grow_card(id: &str) -> Decision {
        Decision {
            id: DecisionId(id.to_string()),
            number: 1,
            name: "Plant".to_string(),
            subcategory: "Capacity".to_string(),
            brief: String::new(),
            cost: Decimal::new(500, 0),
            introduced_round: Round(1),
            kind: DecisionKind::Organic,
            ramp_up_years: 2,
            sustains_topline: false,
            metrics: DecisionMetrics::Grow(GrowMetrics {
                investment_total: Decimal::new(500, 0),
                investment_period: 2,
                revenue_first_year: Decimal::new(300, 0),
                five_year_growth: Decimal::new(10, 2),
                ebit_margin: Decimal::new(11, 2),
            }),
        }
    }

    #[test]
    fn constants_ok() {
        assert!(validate_constants(&constants()).is_ok());
    }

    #[test]
    fn wacc_must_exceed_growth() {
        let mut c = constants();
        c.terminal_growth = c.wacc;
        assert!(matches!(
            validate_constants(&c),
            Err(ValidationError::TerminalGrowthNotBelowWacc { .. })
        ));
    }

    #[test]
    fn shares_must_be_positive() {
        let mut c = constants();
        c.shares_outstanding = Decimal::new(-1, 0);
        assert_eq!(validate_constants(&c), Err(ValidationError::NonPositiveShares));
    }

    #[test]
    fn builtin_style_baseline_identities_hold() {
        let b = BaselineFinancials {
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
            invested_capital: Decimal::new(1582772, 2),
            npv: Decimal::new(22738, 0),
            equity_value: Decimal::new(14555, 0),
            shares_outstanding: Decimal::new(28734, 2),
            share_price: Decimal::new(5067, 2),
        };
        assert!(validate_baseline(&b).is_ok());
        let mut broken = b.clone();
        broken.ebitda += Decimal::ONE;
        assert!(matches!(
            validate_baseline(&broken),
            Err(ValidationError::BaselineIdentity(_))
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let catalog = DecisionCatalog::new(vec![grow_card("grow-1-1"), grow_card("grow-1-1")]);
        assert_eq!(
            validate_catalog(&catalog, 5),
            Err(ValidationError::DuplicateDecision("grow-1-1".into()))
        );
    }

    #[test]
    fn ramp_must_be_in_range() {
        let mut d = grow_card("grow-1-1");
        d.ramp_up_years = 4;
        assert!(matches!(
            validate_decision(&d, 5),
            Err(ValidationError::InvalidRamp(_))
        ));
    }

    #[test]
    fn only_sustain_cards_hold_the_topline() {
        let mut d = grow_card("grow-1-1");
        d.sustains_topline = true;
        assert_eq!(
            validate_decision(&d, 5),
            Err(ValidationError::ToplineNotSustain("grow-1-1".into()))
        );
    }

    #[test]
    fn event_must_reference_known_decisions() {
        let catalog = DecisionCatalog::new(vec![grow_card("grow-1-1")]);
        let mut e = SpecialEvent {
            key: "oem".into(),
            description: String::new(),
            round: Round(3),
            effects: Default::default(),
            shielded_by: vec![],
        };
        e.effects
            .insert(DecisionId("grow-9-9".into()), EventEffect::ZeroReturns);
        assert!(matches!(
            validate_events(&[e], &catalog, 5),
            Err(ValidationError::UnknownDecision { .. })
        ));
    }

    #[test]
    fn round_labels() {
        assert_eq!(Round(1).fiscal_year(), 2026);
        assert_eq!(Round(5).next(), Round(6));
        assert_eq!(TeamId(3).to_string(), "Team 3");
    }

    proptest! {
        #[test]
        fn growth_below_wacc_is_valid(w in 1i64..99, g_off in 1i64..99) {
            prop_assume!(g_off < w);
            let mut c = constants();
            c.wacc = Decimal::new(w, 2);
            c.terminal_growth = Decimal::new(w - g_off, 2);
            prop_assert!(validate_constants(&c).is_ok());
        }
    }
}
