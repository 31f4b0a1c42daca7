#![deny(warnings)]

//! Projection engine: multi-year projection, DCF valuation, equity bridge and
//! per-round snapshots for one team.
//!
//! The engine is a pure function of its inputs. Every amount is a
//! [`Decimal`]; discount factors are built by repeated division so results
//! are reproducible bit-for-bit across runs.

use rust_decimal::Decimal;
use sim_config::{ConfigError, GameConfig};
use sim_core::{
    BaselineFinancials, BauAssumptions, Decision, DecisionCatalog, DecisionId, FinancialMetrics,
    ModelConstants, Round, ScenarioSchedule, SelectedDecision, SpecialEvent, BASE_FISCAL_YEAR,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

pub mod bau;
pub mod events;
pub mod flows;

use bau::{BauConditions, BauTrajectory};
use events::EventResolver;
use flows::{decision_flows, DecisionFlows, FlowContext};

/// Projections whose continuing value cannot be computed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DegenerateProjection {
    #[error("terminal growth {growth} is not below WACC {wacc}")]
    GrowthNotBelowWacc { wacc: Decimal, growth: Decimal },
    #[error("terminal ROIC {roic} does not exceed terminal growth {growth}")]
    NonConvergentTerminal { roic: Decimal, growth: Decimal },
    #[error("invested capital {invested_capital} in year {year} is not positive")]
    NonPositiveInvestedCapital {
        year: u32,
        invested_capital: Decimal,
    },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("unknown decision: {0}")]
    UnknownDecision(DecisionId),
    #[error("decision {id} is introduced in round {introduced}, selected in round {selected}")]
    NotYetIntroduced {
        id: DecisionId,
        introduced: u8,
        selected: u8,
    },
    #[error("decision {0} selected more than once")]
    DuplicateSelection(DecisionId),
    #[error("round {0} is out of range")]
    RoundOutOfRange(u8),
    #[error("horizon of {horizon} years is shorter than the {required} years required")]
    HorizonTooShort { horizon: u8, required: u32 },
    #[error("degenerate projection: {0}")]
    Degenerate(#[from] DegenerateProjection),
}

/// One projected fiscal year. Costs are negative; outlays
/// (`implementation_cost`, `investment`, `acquisitions`) are positive.
#[derive(Clone, Debug, PartialEq)]
pub struct YearLine {
    pub year: u32,
    pub fiscal_year: i32,
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub sga: Decimal,
    pub savings: Decimal,
    pub ebitda: Decimal,
    pub depreciation: Decimal,
    pub amortization: Decimal,
    pub ebit: Decimal,
    pub implementation_cost: Decimal,
    pub cash_taxes: Decimal,
    pub capex: Decimal,
    pub investment: Decimal,
    pub acquisitions: Decimal,
    pub invested_capital_begin: Decimal,
    pub invested_capital_end: Decimal,
    pub free_cash_flow: Decimal,
    pub roic: Option<Decimal>,
    /// Non-zero only in the final year.
    pub continuing_value: Decimal,
    pub discount_factor: Decimal,
    pub discounted_cash_flow: Decimal,
}

/// Full projection and valuation of one decision set.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    pub years: Vec<YearLine>,
    pub continuing_value: Decimal,
    pub terminal_roic: Decimal,
    pub enterprise_value: Decimal,
    pub equity_value: Decimal,
    pub share_price: Decimal,
}

impl Projection {
    /// Line items of projection year `year` (1-based).
    pub fn year(&self, year: u32) -> Option<&YearLine> {
        year.checked_sub(1).and_then(|i| self.years.get(i as usize))
    }
}

/// Values a team's decisions against the baseline company.
#[derive(Clone, Debug)]
pub struct ProjectionEngine {
    baseline: BaselineFinancials,
    constants: ModelConstants,
    bau: BauAssumptions,
    catalog: DecisionCatalog,
    total_rounds: u8,
    horizon_years: u8,
    final_horizon_years: u8,
}

impl ProjectionEngine {
    /// Builds an engine for a validated copy of `cfg`.
    pub fn new(cfg: &GameConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            baseline: cfg.baseline.clone(),
            constants: cfg.constants.clone(),
            bau: cfg.bau.clone(),
            catalog: cfg.catalog.clone(),
            total_rounds: cfg.rules.total_rounds,
            horizon_years: cfg.rules.horizon_years,
            final_horizon_years: cfg.rules.final_horizon_years(),
        })
    }

    pub fn horizon_years(&self) -> u8 {
        self.horizon_years
    }

    pub fn total_rounds(&self) -> u8 {
        self.total_rounds
    }

    pub fn catalog(&self) -> &DecisionCatalog {
        &self.catalog
    }

    /// Checks selections against the catalog and returns the decisions in
    /// selection order.
    fn resolve(&self, selections: &[SelectedDecision]) -> Result<Vec<&Decision>, EngineError> {
        let mut seen: BTreeSet<&DecisionId> = BTreeSet::new();
        let mut out = Vec::with_capacity(selections.len());
        for sel in selections {
            if sel.round.0 == 0 || sel.round.0 > self.total_rounds {
                return Err(EngineError::RoundOutOfRange(sel.round.0));
            }
            let decision = self
                .catalog
                .get(&sel.decision_id)
                .ok_or_else(|| EngineError::UnknownDecision(sel.decision_id.clone()))?;
            if !decision.is_available_in(sel.round) {
                return Err(EngineError::NotYetIntroduced {
                    id: decision.id.clone(),
                    introduced: decision.introduced_round.0,
                    selected: sel.round.0,
                });
            }
            if !seen.insert(&decision.id) {
                return Err(EngineError::DuplicateSelection(decision.id.clone()));
            }
            out.push(decision);
        }
        Ok(out)
    }

    /// Growth erosion per round: topline cards of round `q` that were not
    /// taken by the end of round `q`.
    fn bau_conditions(&self, selections: &[SelectedDecision], as_of: Round) -> BauConditions {
        let erosion_by_round = (1..=as_of.0)
            .map(Round)
            .map(|round| {
                let skipped = self
                    .catalog
                    .introduced_in(round)
                    .filter(|d| d.sustains_topline)
                    .filter(|d| {
                        !selections
                            .iter()
                            .any(|s| s.decision_id == d.id && s.round <= round)
                    })
                    .count();
                self.bau.topline_erosion_per_skip * Decimal::from(skipped)
            })
            .collect();
        BauConditions {
            as_of,
            erosion_by_round,
        }
    }

    /// Projects `horizon` years of the plain BAU plan plus the given
    /// decisions, and values them.
    pub fn project(
        &self,
        selections: &[SelectedDecision],
        scenarios: &ScenarioSchedule,
        events: &[SpecialEvent],
        horizon: u8,
    ) -> Result<Projection, EngineError> {
        self.project_as_of(selections, scenarios, events, horizon, Round(0))
    }

    /// Like [`ProjectionEngine::project`], with the BAU business exposed to
    /// the macro path and topline erosion revealed by the end of `as_of`.
    pub fn project_as_of(
        &self,
        selections: &[SelectedDecision],
        scenarios: &ScenarioSchedule,
        events: &[SpecialEvent],
        horizon: u8,
        as_of: Round,
    ) -> Result<Projection, EngineError> {
        let latest_round = selections.iter().map(|s| s.round.year()).max().unwrap_or(0);
        if horizon == 0 || u32::from(horizon) < latest_round {
            return Err(EngineError::HorizonTooShort {
                horizon,
                required: latest_round.max(1),
            });
        }
        let decisions = self.resolve(selections)?;
        let horizon = u32::from(horizon);
        let c = &self.constants;
        let conditions = self.bau_conditions(selections, as_of);
        let trajectory = BauTrajectory::build(&self.baseline, &self.bau, horizon, &conditions);
        let resolver = EventResolver::new(events, selections);
        let ctx = FlowContext {
            organic_growth: self.bau.organic_growth,
            capex_revenue_ratio: c.capex_revenue_ratio,
        };
        let multipliers: Vec<Decimal> = selections
            .iter()
            .zip(&decisions)
            .map(|(sel, d)| scenarios.modifiers_for(sel.round).for_category(d.category()))
            .collect();

        let one_plus_wacc = Decimal::ONE + c.wacc;
        let mut discount_factor = Decimal::ONE;
        let mut invested_capital = self.baseline.invested_capital;
        let mut years = Vec::with_capacity(horizon as usize);
        for y in 1..=horizon {
            let Some(base) = trajectory.year(y) else {
                break;
            };
            let mut flows = DecisionFlows::default();
            for ((sel, d), multiplier) in selections.iter().zip(&decisions).zip(&multipliers) {
                let factor = *multiplier * resolver.factor(&d.id, y);
                flows.accumulate(&decision_flows(&ctx, d, sel.round.year(), y, factor));
            }

            let revenue = base.revenue + flows.revenue;
            let cogs = base.cogs + flows.cogs;
            let ebitda = revenue + cogs + base.sga + flows.savings;
            let depreciation = -(c.capex_revenue_ratio * revenue);
            let amortization = Decimal::ZERO;
            let ebit = ebitda + depreciation + amortization;
            let capex = depreciation;
            let taxable = ebit - flows.implementation_cost;
            let cash_taxes = if taxable > Decimal::ZERO {
                -(taxable * c.tax_rate)
            } else {
                Decimal::ZERO
            };
            let begin = invested_capital;
            let end = begin + trajectory.investment(y) + flows.investment + flows.acquisition;
            let free_cash_flow =
                ebitda + cash_taxes + capex - flows.implementation_cost - (end - begin);
            let nopat = ebit * (Decimal::ONE - c.tax_rate);
            let roic = (begin > Decimal::ZERO).then(|| nopat / begin);
            discount_factor /= one_plus_wacc;
            invested_capital = end;

            years.push(YearLine {
                year: y,
                fiscal_year: BASE_FISCAL_YEAR + y as i32,
                revenue,
                cogs,
                sga: base.sga,
                savings: flows.savings,
                ebitda,
                depreciation,
                amortization,
                ebit,
                implementation_cost: flows.implementation_cost,
                cash_taxes,
                capex,
                investment: trajectory.investment(y) + flows.investment,
                acquisitions: flows.acquisition,
                invested_capital_begin: begin,
                invested_capital_end: end,
                free_cash_flow,
                roic,
                continuing_value: Decimal::ZERO,
                discount_factor,
                discounted_cash_flow: free_cash_flow * discount_factor,
            });
        }

        let (continuing_value, terminal_roic) = match years.last_mut() {
            Some(last) => {
                let (cv, roic) = self.continuing_value(last)?;
                last.continuing_value = cv;
                last.discounted_cash_flow = (last.free_cash_flow + cv) * last.discount_factor;
                (cv, roic)
            }
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let enterprise_value: Decimal = years.iter().map(|l| l.discounted_cash_flow).sum();
        let equity_value = enterprise_value - c.net_debt - c.minority_interest;
        let share_price = equity_value / c.shares_outstanding;
        debug!(
            decisions = selections.len(),
            as_of = as_of.0,
            events = events.len(),
            horizon,
            %enterprise_value,
            %share_price,
            "projection valued"
        );
        Ok(Projection {
            years,
            continuing_value,
            terminal_roic,
            enterprise_value,
            equity_value,
            share_price,
        })
    }

    /// Value-driver continuing value at the end of `last`, with the ROIC it
    /// was computed from.
    fn continuing_value(&self, last: &YearLine) -> Result<(Decimal, Decimal), DegenerateProjection> {
        let c = &self.constants;
        let g = c.terminal_growth;
        if c.wacc - g <= Decimal::ZERO {
            return Err(DegenerateProjection::GrowthNotBelowWacc {
                wacc: c.wacc,
                growth: g,
            });
        }
        if last.invested_capital_end <= Decimal::ZERO {
            return Err(DegenerateProjection::NonPositiveInvestedCapital {
                year: last.year,
                invested_capital: last.invested_capital_end,
            });
        }
        let after_tax = Decimal::ONE - c.tax_rate;
        let operating_margin = last.ebitda - c.capex_revenue_ratio * last.revenue;
        let roic = operating_margin * after_tax / last.invested_capital_end;
        if roic <= g {
            return Err(DegenerateProjection::NonConvergentTerminal { roic, growth: g });
        }
        let nopat_next = last.ebit * (Decimal::ONE + g) * after_tax;
        let reinvestment_rate = g / roic;
        let cv = nopat_next * (Decimal::ONE - reinvestment_rate) / (c.wacc - g);
        Ok((cv, roic))
    }

    /// Year-0 snapshot: baseline line items with the BAU valuation.
    pub fn compute_baseline(&self) -> Result<FinancialMetrics, EngineError> {
        let p = self.project(&[], &ScenarioSchedule::default(), &[], self.horizon_years)?;
        let b = &self.baseline;
        let mut m = FinancialMetrics::from_baseline(b);
        m.npv = p.enterprise_value;
        m.equity_value = p.equity_value;
        m.shares_outstanding = self.constants.shares_outstanding;
        m.share_price = p.share_price;
        m.roic = (b.invested_capital > Decimal::ZERO)
            .then(|| b.ebit * (Decimal::ONE - self.constants.tax_rate) / b.invested_capital);
        Ok(m)
    }

    /// Snapshot of `year`'s line items from `p`.
    fn snapshot(&self, p: &Projection, year: u32) -> Result<FinancialMetrics, EngineError> {
        let line = p.year(year).ok_or(EngineError::HorizonTooShort {
            horizon: u8::try_from(p.years.len()).unwrap_or(u8::MAX),
            required: year,
        })?;
        let beginning_cash = self.baseline.beginning_cash
            + p.years
                .iter()
                .take_while(|l| l.year < year)
                .map(|l| l.free_cash_flow)
                .sum::<Decimal>();
        let ebit_margin = if line.revenue.is_zero() {
            Decimal::ZERO
        } else {
            line.ebit / line.revenue
        };
        Ok(FinancialMetrics {
            revenue: line.revenue,
            cogs: line.cogs,
            sga: line.sga,
            ebitda: line.ebitda,
            depreciation: line.depreciation,
            amortization: line.amortization,
            ebit: line.ebit,
            cash_taxes: line.cash_taxes,
            capex: line.capex,
            operating_fcf: line.free_cash_flow,
            beginning_cash,
            ending_cash: beginning_cash + line.free_cash_flow,
            invested_capital: line.invested_capital_end,
            npv: p.enterprise_value,
            equity_value: p.equity_value,
            shares_outstanding: self.constants.shares_outstanding,
            share_price: p.share_price,
            ebit_margin,
            roic: line.roic,
        })
    }

    /// Snapshot of `round` as known at its close: only decisions and events
    /// of that round or earlier count.
    pub fn round_snapshot(
        &self,
        selections: &[SelectedDecision],
        scenarios: &ScenarioSchedule,
        events: &[SpecialEvent],
        round: Round,
        horizon: u8,
    ) -> Result<FinancialMetrics, EngineError> {
        if round.0 == 0 || round.0 > self.total_rounds {
            return Err(EngineError::RoundOutOfRange(round.0));
        }
        let known: Vec<SelectedDecision> = selections
            .iter()
            .filter(|s| s.round <= round)
            .cloned()
            .collect();
        let triggered: Vec<SpecialEvent> = events
            .iter()
            .filter(|e| e.round <= round)
            .cloned()
            .collect();
        let p = self.project_as_of(&known, scenarios, &triggered, horizon, round)?;
        self.snapshot(&p, round.year())
    }

    /// One snapshot per round, in round order.
    pub fn project_team(
        &self,
        selections: &[SelectedDecision],
        scenarios: &ScenarioSchedule,
        events: &[SpecialEvent],
        horizon: u8,
    ) -> Result<Vec<FinancialMetrics>, EngineError> {
        if u32::from(horizon) < u32::from(self.total_rounds) {
            return Err(EngineError::HorizonTooShort {
                horizon,
                required: u32::from(self.total_rounds),
            });
        }
        (1..=self.total_rounds)
            .map(|r| self.round_snapshot(selections, scenarios, events, Round(r), horizon))
            .collect()
    }

    /// Post-game simulation over the extended horizon, reporting the line
    /// items of the last standard-horizon year.
    pub fn final_simulation(
        &self,
        selections: &[SelectedDecision],
        scenarios: &ScenarioSchedule,
        events: &[SpecialEvent],
    ) -> Result<FinancialMetrics, EngineError> {
        let p = self.project_as_of(
            selections,
            scenarios,
            events,
            self.final_horizon_years,
            Round(self.total_rounds),
        )?;
        self.snapshot(&p, u32::from(self.horizon_years))
    }
}
