//! Baseline statement, model constants and per-round financial snapshots.
//!
//! Cost lines (COGS, SG&A, depreciation, amortization, taxes, capex) are
//! carried signed, i.e. negative, so every subtotal is a plain sum.

use crate::Round;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Year-0 financial statement of the company (USD millions unless noted).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineFinancials {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub sga: Decimal,
    pub ebitda: Decimal,
    pub depreciation: Decimal,
    pub amortization: Decimal,
    pub ebit: Decimal,
    pub cash_taxes: Decimal,
    pub capex: Decimal,
    pub operating_fcf: Decimal,
    pub beginning_cash: Decimal,
    pub invested_capital: Decimal,
    /// Reported enterprise value of the year-0 valuation.
    pub npv: Decimal,
    pub equity_value: Decimal,
    /// Millions of shares.
    pub shares_outstanding: Decimal,
    /// USD per share.
    pub share_price: Decimal,
}

impl BaselineFinancials {
    /// COGS as a positive share of revenue.
    pub fn cogs_ratio(&self) -> Decimal {
        if self.revenue.is_zero() {
            return Decimal::ZERO;
        }
        -self.cogs / self.revenue
    }
}

/// Valuation constants fixed for the life of a game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConstants {
    pub wacc: Decimal,
    pub terminal_growth: Decimal,
    pub tax_rate: Decimal,
    /// Maintenance capex (and depreciation) as a share of revenue.
    pub capex_revenue_ratio: Decimal,
    pub net_debt: Decimal,
    pub minority_interest: Decimal,
    /// Millions of shares.
    pub shares_outstanding: Decimal,
}

/// Growth assumptions of the business-as-usual trajectory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BauAssumptions {
    pub organic_growth: Decimal,
    pub sga_growth: Decimal,
    /// Projection year through which invested capital is held flat; capital
    /// turnover is frozen at that year's level afterwards.
    pub capital_turnover_lock_year: u8,
    /// Revenue growth lost for every topline-sustaining card a team leaves
    /// unselected in its round. Each round's loss applies from the next year on.
    #[serde(default)]
    pub topline_erosion_per_skip: Decimal,
    /// One-year growth shocks, such as a recession.
    #[serde(default)]
    pub growth_shocks: Vec<GrowthShock>,
    #[serde(default)]
    pub cost_pressure: Option<CostPressure>,
}

/// Replaces the BAU growth rate of projection `year` once `from_round` has
/// been reached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowthShock {
    pub year: u32,
    pub from_round: Round,
    pub growth: Decimal,
}

/// Raises the BAU COGS/revenue ratio by `cogs_ratio_uplift` from projection
/// `from_year` on, once `from_round` has been reached.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostPressure {
    pub from_year: u32,
    pub from_round: Round,
    pub cogs_ratio_uplift: Decimal,
}

impl BauAssumptions {
    /// Growth shock active in `year` when projecting as of round `as_of`.
    pub fn shock_in(&self, year: u32, as_of: Round) -> Option<&GrowthShock> {
        self.growth_shocks
            .iter()
            .find(|s| s.year == year && s.from_round <= as_of)
    }

    /// COGS ratio uplift active in `year` when projecting as of round `as_of`.
    pub fn cogs_uplift_in(&self, year: u32, as_of: Round) -> Decimal {
        match &self.cost_pressure {
            Some(c) if c.from_round <= as_of && year >= c.from_year => c.cogs_ratio_uplift,
            _ => Decimal::ZERO,
        }
    }
}

/// Snapshot of one team's financials at the close of a round.
///
/// Line items describe the round's fiscal year; the valuation fields describe
/// the whole projection as seen at that round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub sga: Decimal,
    pub ebitda: Decimal,
    pub depreciation: Decimal,
    pub amortization: Decimal,
    pub ebit: Decimal,
    pub cash_taxes: Decimal,
    pub capex: Decimal,
    pub operating_fcf: Decimal,
    pub beginning_cash: Decimal,
    pub ending_cash: Decimal,
    pub invested_capital: Decimal,
    /// Enterprise value (sum of discounted cash flows incl. continuing value).
    pub npv: Decimal,
    pub equity_value: Decimal,
    pub shares_outstanding: Decimal,
    pub share_price: Decimal,
    pub ebit_margin: Decimal,
    /// NOPAT over beginning invested capital; `None` when capital is not positive.
    pub roic: Option<Decimal>,
}

/// Derived ratios for the round debrief.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRatios {
    /// `None` when there is no prior revenue to compare against.
    pub revenue_growth: Option<Decimal>,
    pub ebitda_margin: Decimal,
    pub ebit_margin: Decimal,
    pub cogs_to_revenue: Decimal,
    pub sga_to_revenue: Decimal,
}

impl FinancialMetrics {
    /// Builds the year-0 snapshot straight from the baseline statement.
    pub fn from_baseline(b: &BaselineFinancials) -> Self {
        let ebit_margin = share(b.ebit, b.revenue);
        Self {
            revenue: b.revenue,
            cogs: b.cogs,
            sga: b.sga,
            ebitda: b.ebitda,
            depreciation: b.depreciation,
            amortization: b.amortization,
            ebit: b.ebit,
            cash_taxes: b.cash_taxes,
            capex: b.capex,
            operating_fcf: b.operating_fcf,
            beginning_cash: b.beginning_cash,
            ending_cash: b.beginning_cash + b.operating_fcf,
            invested_capital: b.invested_capital,
            npv: b.npv,
            equity_value: b.equity_value,
            shares_outstanding: b.shares_outstanding,
            share_price: b.share_price,
            ebit_margin,
            roic: None,
        }
    }

    pub fn ratios(&self, previous_revenue: Option<Decimal>) -> SnapshotRatios {
        let revenue_growth = previous_revenue
            .filter(|p| !p.is_zero())
            .map(|p| (self.revenue - p) / p);
        SnapshotRatios {
            revenue_growth,
            ebitda_margin: share(self.ebitda, self.revenue),
            ebit_margin: share(self.ebit, self.revenue),
            cogs_to_revenue: share(-self.cogs, self.revenue),
            sga_to_revenue: share(-self.sga, self.revenue),
        }
    }
}

fn share(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole
    }
}
