//! Incremental cash-flow lines contributed by a single decision.

use rust_decimal::Decimal;
use sim_core::{ramp_factor, Decision, DecisionKind, DecisionMetrics};

/// Contribution of one decision to one projection year. Revenue, savings and
/// outlays are positive; `cogs` is signed like the statement line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecisionFlows {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub savings: Decimal,
    pub implementation_cost: Decimal,
    pub investment: Decimal,
    pub acquisition: Decimal,
}

impl DecisionFlows {
    pub fn accumulate(&mut self, other: &DecisionFlows) {
        self.revenue += other.revenue;
        self.cogs += other.cogs;
        self.savings += other.savings;
        self.implementation_cost += other.implementation_cost;
        self.investment += other.investment;
        self.acquisition += other.acquisition;
    }
}

/// Inputs shared by every decision of a projection.
pub struct FlowContext {
    pub organic_growth: Decimal,
    pub capex_revenue_ratio: Decimal,
}

/// Computes `decision`'s flows in projection `year` when selected in
/// `selection_year`. `payoff_factor` scales revenue and savings only;
/// committed spending is never scaled.
pub fn decision_flows(
    ctx: &FlowContext,
    decision: &Decision,
    selection_year: u32,
    year: u32,
    payoff_factor: Decimal,
) -> DecisionFlows {
    let mut out = DecisionFlows::default();
    if year < selection_year {
        return out;
    }
    let k = year - selection_year;
    let ramp = ramp_factor(decision.ramp_up_years, k);
    match &decision.metrics {
        DecisionMetrics::Grow(g) => {
            match decision.kind {
                DecisionKind::Inorganic if k == 0 => out.acquisition = g.investment_total,
                DecisionKind::Inorganic => {}
                DecisionKind::Organic => {
                    if k < u32::from(g.investment_period.max(1)) {
                        out.investment = g.in_year_investment();
                    }
                }
            }
            if k >= 1 {
                let growth_years = k.min(5) - 1;
                let tail_years = k.saturating_sub(5);
                let revenue = g.revenue_first_year
                    * compound(g.five_year_growth, growth_years)
                    * compound(ctx.organic_growth, tail_years)
                    * ramp
                    * payoff_factor;
                out.revenue = revenue;
                out.cogs = -revenue * (Decimal::ONE - g.ebit_margin - ctx.capex_revenue_ratio);
            }
        }
        DecisionMetrics::Optimize(s) | DecisionMetrics::Sustain(s) => {
            if k == 0 {
                out.implementation_cost = s.implementation_cost;
            }
            if k < u32::from(s.investment_period.max(1)) {
                out.investment = s.in_year_investment();
            }
            if k >= 1 {
                out.savings = s.annual_saving * ramp * payoff_factor;
            }
        }
    }
    out
}

/// `(1 + rate)^years` by repeated multiplication.
pub(crate) fn compound(rate: Decimal, years: u32) -> Decimal {
    let base = Decimal::ONE + rate;
    (0..years).fold(Decimal::ONE, |acc, _| acc * base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{DecisionId, GrowMetrics, Round, SavingsMetrics};

    fn ctx() -> FlowContext {
        FlowContext {
            organic_growth: Decimal::new(2, 2),
            capex_revenue_ratio: Decimal::new(4, 2),
        }
    }

    fn grow(kind: DecisionKind) -> Decision {
        Decision {
            id: DecisionId::new("grow-1-2"),
            number: 2,
            name: "Market entry".into(),
            subcategory: String::new(),
            brief: String::new(),
            cost: Decimal::new(500, 0),
            introduced_round: Round(1),
            kind,
            ramp_up_years: 2,
            sustains_topline: false,
            metrics: DecisionMetrics::Grow(GrowMetrics {
                investment_total: Decimal::new(500, 0),
                investment_period: 2,
                revenue_first_year: Decimal::new(100, 0),
                five_year_growth: Decimal::new(10, 2),
                ebit_margin: Decimal::new(11, 2),
            }),
        }
    }

    fn saving() -> Decision {
        Decision {
            id: DecisionId::new("optimize-1-1"),
            number: 6,
            name: "ERP".into(),
            subcategory: String::new(),
            brief: String::new(),
            cost: Decimal::new(180, 0),
            introduced_round: Round(1),
            kind: DecisionKind::Organic,
            ramp_up_years: 3,
            sustains_topline: false,
            metrics: DecisionMetrics::Optimize(SavingsMetrics {
                implementation_cost: Decimal::new(60, 0),
                investment: Decimal::new(120, 0),
                investment_period: 2,
                annual_saving: Decimal::new(50, 0),
            }),
        }
    }

    #[test]
    fn organic_grow_spreads_investment_and_ramps_revenue() {
        let d = grow(DecisionKind::Organic);
        let y1 = decision_flows(&ctx(), &d, 1, 1, Decimal::ONE);
        assert_eq!(y1.investment, Decimal::new(250, 0));
        assert_eq!(y1.revenue, Decimal::ZERO);
        let y2 = decision_flows(&ctx(), &d, 1, 2, Decimal::ONE);
        assert_eq!(y2.investment, Decimal::new(250, 0));
        assert_eq!(y2.revenue, Decimal::new(50, 0));
        // EBIT margin 11% after 4% depreciation leaves 15% EBITDA margin
        assert_eq!(y2.cogs, Decimal::new(-425, 1));
        let y3 = decision_flows(&ctx(), &d, 1, 3, Decimal::ONE);
        assert_eq!(y3.investment, Decimal::ZERO);
        assert_eq!(y3.revenue, Decimal::new(110, 0));
    }

    #[test]
    fn growth_switches_to_organic_after_five_payoff_years() {
        let d = grow(DecisionKind::Organic);
        let k5 = decision_flows(&ctx(), &d, 1, 6, Decimal::ONE).revenue;
        let k6 = decision_flows(&ctx(), &d, 1, 7, Decimal::ONE).revenue;
        assert_eq!(k5, Decimal::new(100, 0) * compound(Decimal::new(10, 2), 4));
        assert_eq!(k6, k5 * Decimal::new(102, 2));
    }

    #[test]
    fn acquisition_charged_once_in_selection_year() {
        let d = grow(DecisionKind::Inorganic);
        let y2 = decision_flows(&ctx(), &d, 2, 2, Decimal::ONE);
        assert_eq!(y2.acquisition, Decimal::new(500, 0));
        assert_eq!(y2.investment, Decimal::ZERO);
        assert_eq!(decision_flows(&ctx(), &d, 2, 3, Decimal::ONE).acquisition, Decimal::ZERO);
        assert_eq!(decision_flows(&ctx(), &d, 2, 1, Decimal::ONE), DecisionFlows::default());
    }

    #[test]
    fn savings_expense_implementation_then_ramp() {
        let d = saving();
        let y1 = decision_flows(&ctx(), &d, 1, 1, Decimal::ONE);
        assert_eq!(y1.implementation_cost, Decimal::new(60, 0));
        assert_eq!(y1.investment, Decimal::new(60, 0));
        assert_eq!(y1.savings, Decimal::ZERO);
        let y2 = decision_flows(&ctx(), &d, 1, 2, Decimal::new(12, 1));
        assert_eq!(y2.implementation_cost, Decimal::ZERO);
        assert_eq!(y2.savings, Decimal::new(18, 0));
        let y4 = decision_flows(&ctx(), &d, 1, 4, Decimal::ONE);
        assert_eq!(y4.savings, Decimal::new(50, 0));
    }

    #[test]
    fn zero_factor_keeps_spending() {
        let d = grow(DecisionKind::Organic);
        let y2 = decision_flows(&ctx(), &d, 1, 2, Decimal::ZERO);
        assert_eq!(y2.revenue, Decimal::ZERO);
        assert_eq!(y2.investment, Decimal::new(250, 0));
    }
}
