//! Resolution of special-event effects into a payoff factor per decision and year.

use rust_decimal::Decimal;
use sim_core::{DecisionId, EventEffect, SelectedDecision, SpecialEvent};

/// Combines the effects in force on one decision in one year.
///
/// `Protected` cancels every `ZeroReturns` and `Penalty`. Otherwise any
/// `ZeroReturns` yields zero. Bonus and penalty factors multiply, so the
/// result does not depend on the order of `effects`.
pub fn combine(effects: &[EventEffect]) -> Decimal {
    let protected = effects.iter().any(|e| matches!(e, EventEffect::Protected));
    if !protected && effects.iter().any(|e| matches!(e, EventEffect::ZeroReturns)) {
        return Decimal::ZERO;
    }
    effects.iter().fold(Decimal::ONE, |acc, e| match e {
        EventEffect::Bonus(f) => acc * *f,
        EventEffect::Penalty(f) if !protected => acc * *f,
        _ => acc,
    })
}

/// Looks up event effects for one team's selections.
pub struct EventResolver<'a> {
    events: &'a [SpecialEvent],
    selections: &'a [SelectedDecision],
}

impl<'a> EventResolver<'a> {
    pub fn new(events: &'a [SpecialEvent], selections: &'a [SelectedDecision]) -> Self {
        Self { events, selections }
    }

    /// A decision is held from the year of the round it was selected in.
    fn holds(&self, id: &DecisionId, year: u32) -> bool {
        self.selections
            .iter()
            .any(|s| &s.decision_id == id && s.round.year() <= year)
    }

    fn shielded(&self, event: &SpecialEvent, year: u32) -> bool {
        event.shielded_by.iter().any(|id| self.holds(id, year))
    }

    /// Effects in force on `id` in projection year `year`, in event order.
    pub fn effects_on(&self, id: &DecisionId, year: u32) -> Vec<EventEffect> {
        let mut out = Vec::new();
        for event in self.events.iter().filter(|e| e.applies_in(year)) {
            let Some(effect) = event.effect_on(id) else {
                continue;
            };
            let harmful = matches!(effect, EventEffect::ZeroReturns | EventEffect::Penalty(_));
            if harmful && self.shielded(event, year) {
                out.push(EventEffect::Protected);
            }
            out.push(effect.clone());
        }
        out
    }

    /// Payoff multiplier for `id` in `year`; 1 when no event touches it.
    pub fn factor(&self, id: &DecisionId, year: u32) -> Decimal {
        combine(&self.effects_on(id, year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sim_core::Round;
    use std::collections::BTreeMap;

    fn event(key: &str, round: u8, effects: &[(&str, EventEffect)], shield: &[&str]) -> SpecialEvent {
        SpecialEvent {
            key: key.into(),
            description: String::new(),
            round: Round(round),
            effects: effects
                .iter()
                .map(|(id, e)| (DecisionId::new(*id), e.clone()))
                .collect::<BTreeMap<_, _>>(),
            shielded_by: shield.iter().map(|s| DecisionId::new(*s)).collect(),
        }
    }

    #[test]
    fn zero_returns_from_event_year() {
        let events = [event("oem", 3, &[("grow-2-5", EventEffect::ZeroReturns)], &["grow-2-4"])];
        let picks = [SelectedDecision::new("grow-2-5", 2)];
        let r = EventResolver::new(&events, &picks);
        let id = DecisionId::new("grow-2-5");
        assert_eq!(r.factor(&id, 2), Decimal::ONE);
        assert_eq!(r.factor(&id, 3), Decimal::ZERO);
        assert_eq!(r.factor(&id, 9), Decimal::ZERO);
    }

    #[test]
    fn shield_protects_once_held() {
        let events = [event("oem", 3, &[("grow-2-5", EventEffect::ZeroReturns)], &["grow-2-4"])];
        let picks = [
            SelectedDecision::new("grow-2-5", 2),
            SelectedDecision::new("grow-2-4", 4),
        ];
        let r = EventResolver::new(&events, &picks);
        let id = DecisionId::new("grow-2-5");
        assert_eq!(r.factor(&id, 3), Decimal::ZERO);
        assert_eq!(r.factor(&id, 4), Decimal::ONE);
    }

    #[test]
    fn protection_ignores_penalty_but_keeps_bonus() {
        let effects = [
            EventEffect::Penalty(Decimal::new(5, 1)),
            EventEffect::Protected,
            EventEffect::Bonus(Decimal::new(12, 1)),
            EventEffect::ZeroReturns,
        ];
        assert_eq!(combine(&effects), Decimal::new(12, 1));
    }

    #[test]
    fn bonus_and_penalty_multiply() {
        let effects = [
            EventEffect::Bonus(Decimal::new(12, 1)),
            EventEffect::Penalty(Decimal::new(5, 1)),
        ];
        assert_eq!(combine(&effects), Decimal::new(6, 1));
        assert_eq!(combine(&[]), Decimal::ONE);
    }

    fn effect_strategy() -> impl Strategy<Value = EventEffect> {
        prop_oneof![
            Just(EventEffect::ZeroReturns),
            Just(EventEffect::Protected),
            (1i64..30).prop_map(|f| EventEffect::Penalty(Decimal::new(f, 1))),
            (1i64..30).prop_map(|f| EventEffect::Bonus(Decimal::new(f, 1))),
        ]
    }

    proptest! {
        #[test]
        fn combine_is_order_independent(mut effects in prop::collection::vec(effect_strategy(), 0..6)) {
            let forward = combine(&effects);
            effects.reverse();
            prop_assert_eq!(forward, combine(&effects));
            let mid = effects.len() / 2;
            effects.rotate_left(mid);
            prop_assert_eq!(forward, combine(&effects));
        }
    }
}
