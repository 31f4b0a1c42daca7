#![deny(warnings)]

//! Headless game session: teams, round phases, selection rules, special
//! events, round close and the final simulation.
//!
//! Transport, timers and persistence live outside this crate; callers drive
//! the session through its methods and read published results back.

use rust_decimal::Decimal;
use sim_config::{ConfigError, GameConfig};
use sim_core::{
    Category, DecisionId, FinancialMetrics, Round, SelectedDecision, SnapshotRatios,
    SpecialEvent, TeamId,
};
use sim_scoring::{FinalResults, RoundResults, Scorer, ScoringError};
use sim_valuation::{DegenerateProjection, EngineError, ProjectionEngine};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

pub mod outlook;

pub use outlook::{MarketOutlook, OutlookContext, OutlookGenerator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    RoundOpen(Round),
    RoundClosed(Round),
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lobby => f.write_str("lobby"),
            Phase::RoundOpen(r) => write!(f, "{r} open"),
            Phase::RoundClosed(r) => write!(f, "{r} closed"),
            Phase::Finished => f.write_str("finished"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not allowed while {0}")]
    WrongPhase(Phase),
    #[error("game is full ({0} teams)")]
    TooManyTeams(usize),
    #[error("no teams registered")]
    NoTeams,
    #[error("unknown team {0}")]
    UnknownTeam(TeamId),
    #[error("unknown decision {0}")]
    UnknownDecision(DecisionId),
    #[error("decision {id} is not available before round {introduced}")]
    NotYetIntroduced { id: DecisionId, introduced: u8 },
    #[error("decision {0} already selected")]
    AlreadySelected(DecisionId),
    #[error("at most {limit} {category} decision(s) per round")]
    CategoryLimit { category: Category, limit: usize },
    #[error("selection costs {cost}, budget is {budget}")]
    OverBudget { cost: Decimal, budget: Decimal },
    #[error("unknown event {0}")]
    UnknownEvent(String),
    #[error("event {key} belongs to round {round}")]
    EventNotInRound { key: String, round: u8 },
    #[error("starting share price {0} is not positive")]
    NonPositiveStartingPrice(Decimal),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// A registered team and everything it has committed to.
#[derive(Clone, Debug)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Decisions frozen at earlier round closes.
    pub selections: Vec<SelectedDecision>,
    /// Picks for the open round, replaced on every submit.
    pub pending: Vec<DecisionId>,
    /// Budget left in the open round.
    pub cash_available: Decimal,
    /// One snapshot per closed round.
    pub history: Vec<FinancialMetrics>,
    pub outlook: Option<MarketOutlook>,
}

impl Team {
    fn holds(&self, id: &DecisionId) -> bool {
        self.selections.iter().any(|s| &s.decision_id == id)
    }
}

/// Why a team's new snapshot was not published.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SnapshotIssue {
    #[error(transparent)]
    Degenerate(#[from] DegenerateProjection),
    #[error("share price {0} is not positive")]
    NonPositivePrice(Decimal),
}

/// Splits a valuation into a usable snapshot or a per-team issue. Other
/// engine errors abort the caller.
fn screen(
    valued: Result<FinancialMetrics, EngineError>,
) -> Result<Result<FinancialMetrics, SnapshotIssue>, EngineError> {
    match valued {
        Ok(m) if m.share_price <= Decimal::ZERO => {
            Ok(Err(SnapshotIssue::NonPositivePrice(m.share_price)))
        }
        Ok(m) => Ok(Ok(m)),
        Err(EngineError::Degenerate(d)) => Ok(Err(d.into())),
        Err(e) => Err(e),
    }
}

/// Result of closing a round.
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    pub results: RoundResults,
    /// Teams that keep their previous snapshot, with the reason.
    pub flagged: Vec<(TeamId, SnapshotIssue)>,
}

/// A team's state after a round close, before it is committed.
struct ClosedTeam {
    id: TeamId,
    selections: Vec<SelectedDecision>,
    history: Vec<FinancialMetrics>,
    outlook: MarketOutlook,
}

pub struct GameSession {
    config: GameConfig,
    engine: ProjectionEngine,
    scorer: Scorer,
    outlooks: OutlookGenerator,
    baseline: FinancialMetrics,
    phase: Phase,
    teams: BTreeMap<TeamId, Team>,
    triggered: Vec<SpecialEvent>,
    published: Vec<RoundResults>,
    final_results: Option<FinalResults>,
}

impl GameSession {
    /// Creates a session in the lobby. `config` is validated first.
    pub fn new(config: GameConfig) -> Result<Self, SessionError> {
        let engine = ProjectionEngine::new(&config)?;
        let baseline = engine.compute_baseline()?;
        if baseline.share_price <= Decimal::ZERO {
            return Err(SessionError::NonPositiveStartingPrice(baseline.share_price));
        }
        let scorer = Scorer::new(baseline.share_price, config.scoring.dividend_yield);
        info!(
            share_price = %baseline.share_price,
            decisions = config.catalog.len(),
            "session created"
        );
        Ok(Self {
            outlooks: OutlookGenerator::new(config.rules.outlook_seed),
            config,
            engine,
            scorer,
            baseline,
            phase: Phase::Lobby,
            teams: BTreeMap::new(),
            triggered: Vec::new(),
            published: Vec::new(),
            final_results: None,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Year-0 valuation every team starts from.
    pub fn baseline(&self) -> &FinancialMetrics {
        &self.baseline
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    /// Results of every closed round, oldest first. Entries never change once published.
    pub fn published_results(&self) -> &[RoundResults] {
        &self.published
    }

    pub fn final_results(&self) -> Option<&FinalResults> {
        self.final_results.as_ref()
    }

    pub fn triggered_events(&self) -> &[SpecialEvent] {
        &self.triggered
    }

    /// Debrief ratios of `team`'s latest snapshot against the one before it.
    pub fn debrief(&self, team: TeamId) -> Option<SnapshotRatios> {
        let (last, earlier) = self.teams.get(&team)?.history.split_last()?;
        let previous = earlier.last().unwrap_or(&self.baseline);
        Some(last.ratios(Some(previous.revenue)))
    }

    fn budget(&self) -> Decimal {
        self.config.rules.investment_budget_per_round
    }

    pub fn register_team(&mut self, name: impl Into<String>) -> Result<TeamId, SessionError> {
        if self.phase != Phase::Lobby {
            return Err(SessionError::WrongPhase(self.phase));
        }
        if self.teams.len() >= self.config.rules.max_teams {
            return Err(SessionError::TooManyTeams(self.config.rules.max_teams));
        }
        let id = u32::try_from(self.teams.len() + 1)
            .map(TeamId)
            .map_err(|_| SessionError::TooManyTeams(self.teams.len()))?;
        let team = Team {
            id,
            name: name.into(),
            selections: Vec::new(),
            pending: Vec::new(),
            cash_available: self.budget(),
            history: Vec::new(),
            outlook: None,
        };
        info!(team = %id, name = %team.name, "team registered");
        self.teams.insert(id, team);
        Ok(id)
    }

    /// Opens round 1.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Lobby {
            return Err(SessionError::WrongPhase(self.phase));
        }
        if self.teams.is_empty() {
            return Err(SessionError::NoTeams);
        }
        self.open(Round(1));
        Ok(())
    }

    fn open(&mut self, round: Round) {
        let budget = self.budget();
        for team in self.teams.values_mut() {
            team.pending.clear();
            team.cash_available = budget;
        }
        self.phase = Phase::RoundOpen(round);
        info!(%round, "round opened");
    }

    fn open_round(&self) -> Result<Round, SessionError> {
        match self.phase {
            Phase::RoundOpen(r) => Ok(r),
            other => Err(SessionError::WrongPhase(other)),
        }
    }

    /// Replaces `team`'s picks for the open round.
    pub fn submit(&mut self, team: TeamId, picks: &[DecisionId]) -> Result<(), SessionError> {
        let round = self.open_round()?;
        let t = self.teams.get(&team).ok_or(SessionError::UnknownTeam(team))?;
        let mut per_category: BTreeMap<Category, usize> = BTreeMap::new();
        let mut cost = Decimal::ZERO;
        for (i, id) in picks.iter().enumerate() {
            let d = self
                .engine
                .catalog()
                .get(id)
                .ok_or_else(|| SessionError::UnknownDecision(id.clone()))?;
            if !d.is_available_in(round) {
                return Err(SessionError::NotYetIntroduced {
                    id: id.clone(),
                    introduced: d.introduced_round.0,
                });
            }
            if t.holds(id) || picks[..i].contains(id) {
                return Err(SessionError::AlreadySelected(id.clone()));
            }
            let n = per_category.entry(d.category()).or_default();
            *n += 1;
            if *n > self.config.rules.picks_per_category {
                return Err(SessionError::CategoryLimit {
                    category: d.category(),
                    limit: self.config.rules.picks_per_category,
                });
            }
            cost += d.cost;
        }
        let budget = self.budget();
        if cost > budget {
            return Err(SessionError::OverBudget { cost, budget });
        }
        if let Some(t) = self.teams.get_mut(&team) {
            t.pending = picks.to_vec();
            t.cash_available = budget - cost;
        }
        Ok(())
    }

    /// Triggers a library event in its own round. Triggering twice is a no-op.
    pub fn trigger_event(&mut self, key: &str) -> Result<(), SessionError> {
        let round = self.open_round()?;
        let event = self
            .config
            .event(key)
            .ok_or_else(|| SessionError::UnknownEvent(key.to_string()))?;
        if event.round != round {
            return Err(SessionError::EventNotInRound {
                key: key.to_string(),
                round: event.round.0,
            });
        }
        if !self.triggered.iter().any(|e| e.key == key) {
            info!(key, %round, "special event triggered");
            self.triggered.push(event.clone());
        }
        Ok(())
    }

    /// Freezes picks, values every team, publishes the round's standings.
    ///
    /// Nothing changes unless the round scores; a team whose valuation
    /// degenerates or turns worthless keeps its previous snapshot.
    pub fn close_round(&mut self) -> Result<RoundOutcome, SessionError> {
        let round = self.open_round()?;
        let horizon = self.engine.horizon_years();
        let mut flagged = Vec::new();
        let mut closed = Vec::with_capacity(self.teams.len());
        for team in self.teams.values() {
            let mut selections = team.selections.clone();
            selections.extend(
                team.pending
                    .iter()
                    .cloned()
                    .map(|decision_id| SelectedDecision { decision_id, round }),
            );
            let previous = team.history.last().unwrap_or(&self.baseline);
            let valued = self.engine.round_snapshot(
                &selections,
                &self.config.scenarios,
                &self.triggered,
                round,
                horizon,
            );
            let snapshot = match screen(valued)? {
                Ok(m) => m,
                Err(issue) => {
                    warn!(team = %team.id, %issue, "keeping previous snapshot");
                    flagged.push((team.id, issue));
                    previous.clone()
                }
            };
            let ctx = OutlookContext {
                round,
                current: &snapshot,
                previous,
                previous_share_price: previous.share_price,
            };
            let outlook = self.outlooks.generate(team.id, &ctx);
            let mut history = team.history.clone();
            history.push(snapshot);
            closed.push(ClosedTeam {
                id: team.id,
                selections,
                history,
                outlook,
            });
        }
        let histories: BTreeMap<TeamId, Vec<FinancialMetrics>> = closed
            .iter()
            .map(|c| (c.id, c.history.clone()))
            .collect();
        let results = self.scorer.score_round(&histories, round)?;

        for c in closed {
            if let Some(team) = self.teams.get_mut(&c.id) {
                team.selections = c.selections;
                team.pending.clear();
                team.history = c.history;
                team.outlook = Some(c.outlook);
            }
        }
        info!(
            %round,
            leader = ?results.team_results.first().map(|r| r.team_id),
            flagged = flagged.len(),
            "round closed"
        );
        self.published.push(results.clone());
        self.phase = Phase::RoundClosed(round);
        Ok(RoundOutcome { results, flagged })
    }

    /// Opens the next round. The last round is followed by [`GameSession::finish`].
    pub fn advance(&mut self) -> Result<Round, SessionError> {
        match self.phase {
            Phase::RoundClosed(r) if r.0 < self.engine.total_rounds() => {
                let next = r.next();
                self.open(next);
                Ok(next)
            }
            other => Err(SessionError::WrongPhase(other)),
        }
    }

    /// Runs the extended simulation and publishes the final leaderboard.
    pub fn finish(&mut self) -> Result<&FinalResults, SessionError> {
        match self.phase {
            Phase::RoundClosed(r) if r.0 == self.engine.total_rounds() => {}
            other => return Err(SessionError::WrongPhase(other)),
        }
        let mut histories = BTreeMap::new();
        for (id, team) in &self.teams {
            let last = team.history.last().unwrap_or(&self.baseline);
            let valued = self.engine.final_simulation(
                &team.selections,
                &self.config.scenarios,
                &self.triggered,
            );
            let fin = match screen(valued)? {
                Ok(m) => m,
                Err(issue) => {
                    warn!(team = %id, %issue, "final simulation unusable, keeping last snapshot");
                    last.clone()
                }
            };
            let mut h = team.history.clone();
            h.push(fin);
            histories.insert(*id, h);
        }
        let results = self.scorer.final_results(&histories)?;
        info!(winner = ?results.winner, "game finished");
        self.phase = Phase::Finished;
        Ok(self.final_results.insert(results))
    }
}
