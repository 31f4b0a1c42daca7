#![deny(warnings)]

//! Total shareholder return, cumulative TSR and team rankings.
//!
//! Scoring is a pure function of the teams' snapshot histories. Results of
//! round `k` read only the first `k` snapshots of every history, so adding
//! later rounds never changes published results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{FinancialMetrics, Round, TeamId};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoringError {
    #[error("no team histories to score")]
    EmptyHistory,
    #[error("{team} has {found} snapshots, expected {expected}")]
    RaggedHistory {
        team: TeamId,
        expected: usize,
        found: usize,
    },
    #[error("{team} has a non-positive share price before {round}")]
    NonPositivePrice { team: TeamId, round: Round },
    #[error("{0} rounds exceed the round counter")]
    TooManyRounds(usize),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamRoundResult {
    pub team_id: TeamId,
    pub round: Round,
    pub share_price: Decimal,
    pub share_price_change: Decimal,
    pub round_tsr: Decimal,
    pub cumulative_tsr: Decimal,
    /// 1-based.
    pub rank: u32,
    /// Share price at the close of every round so far.
    pub prices_by_round: Vec<Decimal>,
}

/// Standings after one round, best team first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundResults {
    pub round: Round,
    pub team_results: Vec<TeamRoundResult>,
}

impl RoundResults {
    pub fn for_team(&self, team: TeamId) -> Option<&TeamRoundResult> {
        self.team_results.iter().find(|r| r.team_id == team)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalTeamResult {
    pub team_id: TeamId,
    pub starting_share_price: Decimal,
    pub final_share_price: Decimal,
    pub cumulative_tsr: Decimal,
    pub rank: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    pub leaderboard: Vec<FinalTeamResult>,
    pub winner: Option<TeamId>,
}

/// Scoring rules shared by every team of a game.
#[derive(Clone, Debug, PartialEq)]
pub struct Scorer {
    starting_price: Decimal,
    dividend_yield: Decimal,
}

/// Per-team TSR path over a history prefix.
struct TsrPath {
    prices: Vec<Decimal>,
    last_change: Decimal,
    last_tsr: Decimal,
    cumulative: Decimal,
}

impl Scorer {
    /// `starting_price` is the year-0 share price every team starts from.
    pub fn new(starting_price: Decimal, dividend_yield: Decimal) -> Self {
        Self {
            starting_price,
            dividend_yield,
        }
    }

    /// `(p - prev) / prev + dividend_yield`.
    pub fn round_tsr(&self, prev: Decimal, price: Decimal) -> Option<Decimal> {
        (prev > Decimal::ZERO).then(|| (price - prev) / prev + self.dividend_yield)
    }

    fn path(
        &self,
        team: TeamId,
        history: &[FinancialMetrics],
    ) -> Result<TsrPath, ScoringError> {
        let mut prev = self.starting_price;
        let mut growth = Decimal::ONE;
        let mut path = TsrPath {
            prices: Vec::with_capacity(history.len()),
            last_change: Decimal::ZERO,
            last_tsr: Decimal::ZERO,
            cumulative: Decimal::ZERO,
        };
        for (i, snapshot) in history.iter().enumerate() {
            let round = u8::try_from(i + 1)
                .map(Round)
                .map_err(|_| ScoringError::TooManyRounds(history.len()))?;
            let price = snapshot.share_price;
            let tsr = self
                .round_tsr(prev, price)
                .ok_or(ScoringError::NonPositivePrice { team, round })?;
            growth *= Decimal::ONE + tsr;
            path.prices.push(price);
            path.last_change = price - prev;
            path.last_tsr = tsr;
            prev = price;
        }
        path.cumulative = growth - Decimal::ONE;
        Ok(path)
    }

    fn check_lengths(
        histories: &BTreeMap<TeamId, Vec<FinancialMetrics>>,
        expected: usize,
    ) -> Result<(), ScoringError> {
        if histories.is_empty() || expected == 0 {
            return Err(ScoringError::EmptyHistory);
        }
        for (team, history) in histories {
            if history.len() < expected {
                return Err(ScoringError::RaggedHistory {
                    team: *team,
                    expected,
                    found: history.len(),
                });
            }
        }
        Ok(())
    }

    /// Standings after `round`, using the first `round` snapshots of each history.
    pub fn score_round(
        &self,
        histories: &BTreeMap<TeamId, Vec<FinancialMetrics>>,
        round: Round,
    ) -> Result<RoundResults, ScoringError> {
        let k = usize::from(round.0);
        Self::check_lengths(histories, k)?;
        let mut rows = Vec::with_capacity(histories.len());
        for (team, history) in histories {
            let path = self.path(*team, &history[..k])?;
            rows.push(TeamRoundResult {
                team_id: *team,
                round,
                share_price: history[k - 1].share_price,
                share_price_change: path.last_change,
                round_tsr: path.last_tsr,
                cumulative_tsr: path.cumulative,
                rank: 0,
                prices_by_round: path.prices,
            });
        }
        rows.sort_by(|a, b| {
            standing_order(
                (a.cumulative_tsr, a.share_price, a.team_id),
                (b.cumulative_tsr, b.share_price, b.team_id),
            )
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = rank_of(i);
        }
        debug!(%round, teams = rows.len(), "round scored");
        Ok(RoundResults {
            round,
            team_results: rows,
        })
    }

    /// Final leaderboard over complete histories; the last snapshot of each
    /// history supplies the final share price.
    pub fn final_results(
        &self,
        histories: &BTreeMap<TeamId, Vec<FinancialMetrics>>,
    ) -> Result<FinalResults, ScoringError> {
        let expected = histories.values().map(Vec::len).max().unwrap_or(0);
        Self::check_lengths(histories, expected)?;
        let mut rows = Vec::with_capacity(histories.len());
        for (team, history) in histories {
            let path = self.path(*team, history)?;
            rows.push(FinalTeamResult {
                team_id: *team,
                starting_share_price: self.starting_price,
                final_share_price: history[expected - 1].share_price,
                cumulative_tsr: path.cumulative,
                rank: 0,
            });
        }
        rows.sort_by(|a, b| {
            standing_order(
                (a.cumulative_tsr, a.final_share_price, a.team_id),
                (b.cumulative_tsr, b.final_share_price, b.team_id),
            )
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = rank_of(i);
        }
        Ok(FinalResults {
            winner: rows.first().map(|r| r.team_id),
            leaderboard: rows,
        })
    }

    /// Round results for every round in the histories plus the final leaderboard.
    pub fn score(
        &self,
        histories: &BTreeMap<TeamId, Vec<FinancialMetrics>>,
    ) -> Result<(Vec<RoundResults>, FinalResults), ScoringError> {
        let rounds = histories.values().map(Vec::len).max().unwrap_or(0);
        let rounds = u8::try_from(rounds).map_err(|_| ScoringError::TooManyRounds(rounds))?;
        let per_round = (1..=rounds)
            .map(|r| self.score_round(histories, Round(r)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((per_round, self.final_results(histories)?))
    }
}

/// Cumulative TSR descending, then share price descending, then team id ascending.
fn standing_order(a: (Decimal, Decimal, TeamId), b: (Decimal, Decimal, TeamId)) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.2.cmp(&b.2))
}

fn rank_of(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
