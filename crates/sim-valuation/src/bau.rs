//! Business-as-usual trajectory: the company as it evolves without any decisions.

use rust_decimal::Decimal;
use sim_core::{BaselineFinancials, BauAssumptions, Round};

/// One BAU year. Index 0 of [`BauTrajectory::years`] is the baseline year.
#[derive(Clone, Debug, PartialEq)]
pub struct BauYear {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub sga: Decimal,
    pub invested_capital: Decimal,
}

/// What the market has revealed by the time a projection is made.
///
/// Macro shocks and cost pressure count once their round is reached.
/// Topline erosion from a round starts the following year and is permanent.
#[derive(Clone, Debug, PartialEq)]
pub struct BauConditions {
    pub as_of: Round,
    /// Growth lost per round, indexed by `round - 1`.
    pub erosion_by_round: Vec<Decimal>,
}

impl BauConditions {
    /// No round played yet: the plain BAU plan.
    pub fn baseline() -> Self {
        Self {
            as_of: Round(0),
            erosion_by_round: Vec::new(),
        }
    }

    /// Cumulative growth erosion applying to `year`.
    pub fn erosion_in(&self, year: u32) -> Decimal {
        self.erosion_by_round
            .iter()
            .take(year.saturating_sub(1) as usize)
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BauTrajectory {
    pub years: Vec<BauYear>,
}

impl BauTrajectory {
    /// Builds years `0..=horizon`.
    pub fn build(
        baseline: &BaselineFinancials,
        bau: &BauAssumptions,
        horizon: u32,
        conditions: &BauConditions,
    ) -> Self {
        let cogs_ratio = baseline.cogs_ratio();
        let lock_year = u32::from(bau.capital_turnover_lock_year);
        let mut years = Vec::with_capacity(horizon as usize + 1);
        let mut revenue = baseline.revenue;
        let mut sga = baseline.sga;
        let mut lock_turnover: Option<Decimal> = None;
        years.push(BauYear {
            revenue,
            cogs: baseline.cogs,
            sga,
            invested_capital: baseline.invested_capital,
        });
        for y in 1..=horizon {
            let growth = bau
                .shock_in(y, conditions.as_of)
                .map_or(bau.organic_growth, |s| s.growth)
                - conditions.erosion_in(y);
            revenue *= Decimal::ONE + growth;
            sga *= Decimal::ONE + bau.sga_growth;
            let invested_capital = match lock_turnover {
                Some(turnover) => revenue / turnover,
                None => baseline.invested_capital,
            };
            if y == lock_year {
                lock_turnover = Some(revenue / baseline.invested_capital);
            }
            years.push(BauYear {
                revenue,
                cogs: -revenue * (cogs_ratio + bau.cogs_uplift_in(y, conditions.as_of)),
                sga,
                invested_capital,
            });
        }
        Self { years }
    }

    pub fn year(&self, y: u32) -> Option<&BauYear> {
        self.years.get(y as usize)
    }

    /// Capital the BAU business must add in year `y` to keep its turnover.
    pub fn investment(&self, y: u32) -> Decimal {
        match (self.year(y), y.checked_sub(1).and_then(|p| self.year(p))) {
            (Some(cur), Some(prev)) => cur.invested_capital - prev.invested_capital,
            _ => Decimal::ZERO,
        }
    }
}
