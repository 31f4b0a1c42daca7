//! Decision cards, their category-specific payoff parameters and team selections.

use crate::Round;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a decision card, e.g. "grow-2-5".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub String);

impl DecisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capital allocation lever.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Expansionary investment.
    Grow,
    /// Efficiency and cost-saving investment.
    Optimize,
    /// Risk-mitigation and maintenance investment.
    Sustain,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Grow, Category::Optimize, Category::Sustain];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Grow => "grow",
            Category::Optimize => "optimize",
            Category::Sustain => "sustain",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Organic build-out vs. acquisition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    #[default]
    Organic,
    /// Charged as a one-time acquisition outlay in the selection year.
    Inorganic,
}

/// Payoff parameters of a grow card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowMetrics {
    /// Total investment (USD millions, >= 0).
    pub investment_total: Decimal,
    /// Years over which the investment is spread (>= 1).
    pub investment_period: u8,
    /// Incremental revenue in the first payoff year at full ramp (USD millions).
    pub revenue_first_year: Decimal,
    /// Annual growth of the new revenue over its first five years (0.10 = 10%).
    pub five_year_growth: Decimal,
    /// EBIT margin earned on the new revenue (0.11 = 11%).
    pub ebit_margin: Decimal,
}

impl GrowMetrics {
    /// Investment charged in each year of the investment period.
    pub fn in_year_investment(&self) -> Decimal {
        self.investment_total / Decimal::from(self.investment_period.max(1))
    }
}

/// Payoff parameters shared by optimize and sustain cards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavingsMetrics {
    /// One-time implementation cost, expensed in the selection year.
    pub implementation_cost: Decimal,
    /// Capitalized investment (USD millions).
    pub investment: Decimal,
    /// Years over which the investment is spread (>= 1).
    pub investment_period: u8,
    /// Recurring annual cost saving at full ramp (USD millions).
    pub annual_saving: Decimal,
}

impl SavingsMetrics {
    /// Investment charged in each year of the investment period.
    pub fn in_year_investment(&self) -> Decimal {
        self.investment / Decimal::from(self.investment_period.max(1))
    }
}

/// Category-specific metric block. The category of a card is the variant of
/// this enum, so a card can never carry a block for the wrong category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum DecisionMetrics {
    Grow(GrowMetrics),
    Optimize(SavingsMetrics),
    Sustain(SavingsMetrics),
}

impl DecisionMetrics {
    pub fn category(&self) -> Category {
        match self {
            DecisionMetrics::Grow(_) => Category::Grow,
            DecisionMetrics::Optimize(_) => Category::Optimize,
            DecisionMetrics::Sustain(_) => Category::Sustain,
        }
    }

    /// Years of cost commitment.
    pub fn investment_period(&self) -> u8 {
        match self {
            DecisionMetrics::Grow(g) => g.investment_period,
            DecisionMetrics::Optimize(s) | DecisionMetrics::Sustain(s) => s.investment_period,
        }
    }
}

/// A decision card from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique id, e.g. "optimize-3-2".
    pub id: DecisionId,
    /// Card number (1-75) for reference in facilitator material.
    pub number: u16,
    /// Short title.
    pub name: String,
    /// Subcategory within the lever, e.g. "Acquire a Business".
    #[serde(default)]
    pub subcategory: String,
    /// One-sentence brief for the front of the card.
    #[serde(default)]
    pub brief: String,
    /// One-time cost charged against the team's round budget (USD millions).
    pub cost: Decimal,
    /// Round in which the card becomes available.
    pub introduced_round: Round,
    /// Organic build-out or acquisition.
    #[serde(default)]
    pub kind: DecisionKind,
    /// Years until full payoff (1, 2 or 3).
    pub ramp_up_years: u8,
    /// Skipping this card in its round erodes BAU revenue growth.
    #[serde(default)]
    pub sustains_topline: bool,
    /// Category-specific payoff parameters.
    pub metrics: DecisionMetrics,
}

impl Decision {
    pub fn category(&self) -> Category {
        self.metrics.category()
    }

    /// Whether the card may be selected in `round`.
    pub fn is_available_in(&self, round: Round) -> bool {
        self.introduced_round <= round
    }
}

/// Share of full payoff realized in the `k`-th payoff year (1-based).
///
/// One-year ramps pay in full immediately, two-year ramps pay half in the
/// first year, three-year ramps follow 30% / 70% / 100%.
pub fn ramp_factor(ramp_up_years: u8, k: u32) -> Decimal {
    if k == 0 {
        return Decimal::ZERO;
    }
    match (ramp_up_years, k) {
        (2, 1) => Decimal::new(5, 1),
        (3, 1) => Decimal::new(3, 1),
        (3, 2) => Decimal::new(7, 1),
        _ => Decimal::ONE,
    }
}

/// Ordered, immutable set of decision cards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionCatalog {
    decisions: Vec<Decision>,
}

impl DecisionCatalog {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self { decisions }
    }

    pub fn get(&self, id: &DecisionId) -> Option<&Decision> {
        self.decisions.iter().find(|d| &d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Cards introduced exactly in `round`, i.e. the round's new hand.
    pub fn introduced_in(&self, round: Round) -> impl Iterator<Item = &Decision> {
        self.decisions
            .iter()
            .filter(move |d| d.introduced_round == round)
    }
}

/// A decision a team took in a given round.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SelectedDecision {
    pub decision_id: DecisionId,
    pub round: Round,
}

impl SelectedDecision {
    pub fn new(decision_id: impl Into<String>, round: u8) -> Self {
        Self {
            decision_id: DecisionId(decision_id.into()),
            round: Round(round),
        }
    }
}
