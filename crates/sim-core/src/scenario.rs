//! Per-round market scenarios and facilitator-triggered special events.

use crate::{Category, DecisionId, Round};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Market regime of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    BusinessAsUsual,
    CostPressure,
    Recession,
    Recovery,
}

/// Payoff multipliers per lever category, applied to decisions selected in
/// the scenario's round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioModifiers {
    pub grow: Decimal,
    pub optimize: Decimal,
    pub sustain: Decimal,
}

impl ScenarioModifiers {
    /// All multipliers at 1.0.
    pub fn neutral() -> Self {
        Self {
            grow: Decimal::ONE,
            optimize: Decimal::ONE,
            sustain: Decimal::ONE,
        }
    }

    pub fn for_category(&self, category: Category) -> Decimal {
        match category {
            Category::Grow => self.grow,
            Category::Optimize => self.optimize,
            Category::Sustain => self.sustain,
        }
    }
}

impl Default for ScenarioModifiers {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub round: Round,
    pub kind: ScenarioKind,
    /// Briefing read out when the round opens.
    #[serde(default)]
    pub narrative: String,
    pub modifiers: ScenarioModifiers,
}

/// Scenarios keyed by round. Rounds without an entry are neutral.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioSchedule {
    scenarios: Vec<Scenario>,
}

impl ScenarioSchedule {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter()
    }

    pub fn get(&self, round: Round) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.round == round)
    }

    pub fn modifiers_for(&self, round: Round) -> ScenarioModifiers {
        self.get(round)
            .map(|s| s.modifiers.clone())
            .unwrap_or_default()
    }

    /// Same schedule with every multiplier set to 1.0.
    pub fn neutralized(&self) -> Self {
        Self {
            scenarios: self
                .scenarios
                .iter()
                .map(|s| Scenario {
                    modifiers: ScenarioModifiers::neutral(),
                    ..s.clone()
                })
                .collect(),
        }
    }
}

/// Effect of a special event on one decision's realized payoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "factor", rename_all = "snake_case")]
pub enum EventEffect {
    /// Payoff drops to zero.
    ZeroReturns,
    /// Payoff scaled down by the factor.
    Penalty(Decimal),
    /// Payoff scaled up by the factor.
    Bonus(Decimal),
    /// Shields the decision from zero-return and penalty effects.
    Protected,
}

/// A facilitator-triggered market event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecialEvent {
    pub key: String,
    #[serde(default)]
    pub description: String,
    /// Round the event may be triggered in; it affects payoff years from
    /// that round's year onwards.
    pub round: Round,
    #[serde(default)]
    pub effects: BTreeMap<DecisionId, EventEffect>,
    /// Holding any of these decisions protects all of a team's decisions
    /// from this event's zero-return and penalty effects.
    #[serde(default)]
    pub shielded_by: Vec<DecisionId>,
}

impl SpecialEvent {
    /// Whether the event is in force in projection year `year`.
    pub fn applies_in(&self, year: u32) -> bool {
        year >= self.round.year()
    }

    pub fn effect_on(&self, id: &DecisionId) -> Option<&EventEffect> {
        self.effects.get(id)
    }
}
