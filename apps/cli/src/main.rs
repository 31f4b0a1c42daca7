#![deny(warnings)]

//! Headless CLI: values the business-as-usual plan and optionally plays a
//! scripted demo game.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use sim_config::GameConfig;
use sim_core::{DecisionId, FinancialMetrics, SnapshotRatios};
use sim_runtime::GameSession;
use sim_valuation::ProjectionEngine;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Share price the standard game's BAU plan must reproduce.
const REFERENCE_SHARE_PRICE: Decimal = Decimal::from_parts(522656, 0, 0, false, 4);

#[derive(Default)]
struct Args {
    config: Option<String>,
    demo: bool,
    json: bool,
    version: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?),
            "--demo" => args.demo = true,
            "--json" => args.json = true,
            "--version" | "-V" => args.version = true,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(args)
}

fn print_metrics(label: &str, m: &FinancialMetrics) {
    println!(
        "{label} | revenue: ${} | EBITDA: ${} | FCF: ${} | IC: ${} | ROIC: {} | EV: ${} | price: ${:.2}",
        m.revenue.round_dp(0),
        m.ebitda.round_dp(0),
        m.operating_fcf.round_dp(0),
        m.invested_capital.round_dp(0),
        m.roic.map(pct).unwrap_or_else(|| "n/a".into()),
        m.npv.round_dp(0),
        m.share_price,
    );
}

fn pct(d: Decimal) -> String {
    format!("{:.1}%", d * Decimal::ONE_HUNDRED)
}

fn print_ratios(r: &SnapshotRatios) {
    println!(
        "        growth: {} | EBITDA margin: {} | EBIT margin: {} | COGS: {} | SG&A: {}",
        r.revenue_growth.map(pct).unwrap_or_else(|| "n/a".into()),
        pct(r.ebitda_margin),
        pct(r.ebit_margin),
        pct(r.cogs_to_revenue),
        pct(r.sga_to_revenue),
    );
}

/// Four teams with distinct strategies.
const DEMO_PLAN: [(&str, [&[&str]; 5]); 4] = [
    ("Steady State", [&[], &[], &[], &[], &[]]),
    (
        "Growth First",
        [&["grow-1-2"], &["grow-2-1"], &["grow-3-2"], &["grow-4-3"], &["grow-5-4"]],
    ),
    (
        "Lean Machine",
        [
            &["optimize-1-1", "sustain-1-3"],
            &["optimize-2-4"],
            &["optimize-3-3"],
            &["optimize-4-1"],
            &["optimize-5-1"],
        ],
    ),
    (
        "Balanced",
        [
            &["grow-1-5", "optimize-1-3"],
            &["grow-2-4", "sustain-2-4"],
            &["optimize-3-3"],
            &["sustain-4-1"],
            &[],
        ],
    ),
];

/// Events the facilitator triggers, by round.
const DEMO_EVENTS: [(u8, &str); 3] = [
    (2, "technology_shift"),
    (3, "oem_program_cancellation"),
    (4, "key_customer_loss"),
];

fn run_demo(cfg: GameConfig, json: bool) -> Result<()> {
    let mut session = GameSession::new(cfg)?;
    let teams = DEMO_PLAN
        .iter()
        .map(|(name, _)| session.register_team(*name))
        .collect::<Result<Vec<_>, _>>()?;
    session.start()?;
    let rounds = session.config().rules.total_rounds;
    for r in 1..=rounds {
        for (team, (_, picks)) in teams.iter().zip(DEMO_PLAN.iter()) {
            let picks: Vec<DecisionId> = picks
                .get(usize::from(r - 1))
                .map(|p| p.iter().map(|s| DecisionId::new(*s)).collect())
                .unwrap_or_default();
            session.submit(*team, &picks)?;
        }
        for (_, key) in DEMO_EVENTS.iter().filter(|(round, _)| *round == r) {
            session.trigger_event(key)?;
        }
        let outcome = session.close_round()?;
        if json {
            println!("{}", serde_json::to_string(&outcome.results)?);
        } else {
            for row in &outcome.results.team_results {
                let name = session.team(row.team_id).map(|t| t.name.as_str()).unwrap_or("?");
                println!(
                    "Round {r} | #{} {name:<14} | price: ${:.2} | TSR: {:.2}% | cumulative: {:.2}%",
                    row.rank,
                    row.share_price,
                    row.round_tsr * Decimal::ONE_HUNDRED,
                    row.cumulative_tsr * Decimal::ONE_HUNDRED,
                );
                if let Some(ratios) = session.debrief(row.team_id) {
                    print_ratios(&ratios);
                }
            }
        }
        for (team, issue) in &outcome.flagged {
            info!(%team, %issue, "team kept previous snapshot");
        }
        if r < rounds {
            session.advance()?;
        }
    }
    let results = session.finish()?.clone();
    if json {
        println!("{}", serde_json::to_string(&results)?);
    } else {
        for row in &results.leaderboard {
            let name = session.team(row.team_id).map(|t| t.name.as_str()).unwrap_or("?");
            println!(
                "Final | #{} {name:<14} | ${:.2} -> ${:.2} | cumulative TSR: {:.2}%",
                row.rank,
                row.starting_share_price,
                row.final_share_price,
                row.cumulative_tsr * Decimal::ONE_HUNDRED,
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    if args.version {
        println!(
            "vcc {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    info!(config = ?args.config, demo = args.demo, "starting CLI");

    let cfg = match &args.config {
        Some(path) => GameConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => GameConfig::builtin()?,
    };
    let engine = ProjectionEngine::new(&cfg)?;
    let baseline = engine.compute_baseline()?;

    if args.json {
        println!("{}", serde_json::to_string(&baseline)?);
    } else {
        print_metrics("BAU", &baseline);
        if args.config.is_none() {
            let verdict = if (baseline.share_price - REFERENCE_SHARE_PRICE).abs() <= Decimal::new(1, 2) {
                "matches reference"
            } else {
                "DIFFERS from reference"
            };
            println!("BAU share price ${:.2} {verdict}", baseline.share_price);
        }
    }

    if args.demo {
        run_demo(cfg, args.json)?;
    }
    Ok(())
}
