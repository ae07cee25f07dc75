//! CLI command implementations for Arbiter.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use std::error::Error;
use std::fmt;

use arbiter::channel::{Channel, InstructionMeter};
use arbiter::coordinator::{MatchCoordinator, MatchLimits, StopFlag};
use arbiter::runner::{Competitor, CompetitorRunner, DebugLog, RunnerConfig, TurnView};
use arbiter::supervisor::ProcessSupervisor;
use arbiter::timer::MatchTimer;
use arbiter::transfer::{Order, UnitKind};
use arbiter::verdict::Verdict;
use arbiter::world::demo::{DemoWorld, RECRUIT_COST};
use arbiter::world::{Side, World};

/// Output format for the `run` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<arbiter::error::ChannelError> for CliError {
    fn from(e: arbiter::error::ChannelError) -> Self {
        Self::new(e.to_string())
    }
}

/// Arguments for the `run` command.
#[derive(Debug)]
pub(crate) struct RunArgs {
    /// Shell command for competitor A.
    pub(crate) competitor_a: String,
    /// Shell command for competitor B.
    pub(crate) competitor_b: String,
    /// Per-turn instruction ceiling.
    pub(crate) turn_limit: u64,
    /// Whole-match instruction ceiling.
    pub(crate) game_limit: u64,
    /// Maximum rounds.
    pub(crate) max_turns: u32,
    /// Wall-clock budget in milliseconds.
    pub(crate) duration_ms: u64,
    /// Channel name prefix.
    pub(crate) channel_prefix: Option<String>,
    /// Output format.
    pub(crate) format: OutputFormat,
}

/// Orchestrate one match end to end.
///
/// # Errors
///
/// Returns an error for channel setup or process spawn failures; every
/// match that gets past setup produces a verdict.
pub(crate) fn run_match(args: &RunArgs) -> Result<(), CliError> {
    let prefix = args
        .channel_prefix
        .clone()
        .unwrap_or_else(|| format!("arbiter-{}", std::process::id()));
    let names = [format!("{prefix}-a"), format!("{prefix}-b")];

    let mut world = DemoWorld::new();
    let channels = [
        Channel::create(&names[0], &world.snapshot_for(Side::A))?,
        Channel::create(&names[1], &world.snapshot_for(Side::B))?,
    ];

    let stop = Arc::new(StopFlag::new());
    let limits = MatchLimits {
        turn_instruction_limit: args.turn_limit,
        game_instruction_limit: args.game_limit,
        max_turns: args.max_turns,
        match_duration: Duration::from_millis(args.duration_ms),
    };

    let commands = [
        competitor_command(&args.competitor_a, &names[0], args.max_turns),
        competitor_command(&args.competitor_b, &names[1], args.max_turns),
    ];
    let supervisor = ProcessSupervisor::spawn(commands, Arc::clone(&stop))
        .map_err(|e| CliError::new(format!("Failed to spawn competitors: {e}")))?;

    let mut timer = MatchTimer::new();
    let timer_stop = Arc::clone(&stop);
    timer.arm(limits.match_duration, move || timer_stop.request_timeout());

    let mut coordinator = MatchCoordinator::new(channels, limits, stop);
    let mut verdict = coordinator.run(&mut world);
    timer.cancel();

    // Channels are halted by now, so both children unwind; the crash
    // report decides whether any status gets overridden.
    let report = supervisor.wait();
    report.apply_to(&mut verdict);

    match args.format {
        OutputFormat::Text => print_text(&verdict, coordinator.instruction_totals()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&verdict)
                .map_err(|e| CliError::new(e.to_string()))?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Build a competitor child process from a shell command, handing it the
/// channel name and turn bound through the environment.
fn competitor_command(shell: &str, channel: &str, max_turns: u32) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(shell)
        .env("ARBITER_CHANNEL", channel)
        .env("ARBITER_MAX_TURNS", max_turns.to_string());
    cmd
}

#[allow(clippy::print_stdout)]
fn print_text(verdict: &Verdict, instructions: [u64; 2]) {
    println!("Winner:   {:?} ({:?})", verdict.winner, verdict.win_kind);
    println!("Rounds:   {}", verdict.rounds);
    for (label, side) in [("A", Side::A), ("B", Side::B)] {
        let report = verdict.report(side);
        println!(
            "Player {label}: score {:>6}  status {:?}  instructions {}",
            report.score,
            report.status,
            instructions[side.index()],
        );
    }
}

/// Attach to a channel and serve turns with the built-in demo competitor.
///
/// # Errors
///
/// Returns an error when no channel name is supplied (flag or
/// `ARBITER_CHANNEL`), or for attach/log-flush failures.
pub(crate) fn compete(
    channel: Option<String>,
    max_turns: Option<u32>,
    log: Option<PathBuf>,
    spin: u64,
) -> Result<(), CliError> {
    let name = channel
        .or_else(|| std::env::var("ARBITER_CHANNEL").ok())
        .ok_or_else(|| CliError::new("No channel: pass --channel or set ARBITER_CHANNEL"))?;
    let max_turns = max_turns
        .or_else(|| {
            std::env::var("ARBITER_MAX_TURNS")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(1000);

    let config = RunnerConfig {
        max_turns,
        log_limit: 64 * 1024,
        log_path: log,
        deadline: Some(Duration::from_secs(300)),
    };
    let mut runner = CompetitorRunner::attach(&name, config)?;
    let mut competitor = GreedyCompetitor { spin };
    runner.run(&mut competitor)?;
    Ok(())
}

/// The built-in demo competitor: miners walk to the nearest mine, warriors
/// walk at the nearest enemy, and spare currency recruits more miners.
struct GreedyCompetitor {
    /// Extra instructions accounted per turn.
    spin: u64,
}

impl Competitor for GreedyCompetitor {
    #[allow(clippy::cast_possible_truncation)]
    fn take_turn(
        &mut self,
        view: &TurnView,
        meter: &InstructionMeter<'_>,
        log: &mut DebugLog,
    ) -> Vec<Order> {
        // Stand-in accounting: one instruction per entity examined.
        meter.add((view.own.len() + view.enemy.len() + view.mines.len()) as u64);
        meter.add(self.spin);

        let mut orders = Vec::new();
        for unit in &view.own {
            let target = match unit.kind {
                UnitKind::Miner => nearest(view.mines.iter().copied(), unit.x, unit.y),
                UnitKind::Warrior => {
                    nearest(view.enemy.iter().map(|e| (e.x, e.y)), unit.x, unit.y)
                }
            };
            if let Some(to) = target {
                orders.push(Order::Move { unit: unit.id, to });
            }
        }
        if view.currency >= RECRUIT_COST
            && let Some(base) = view.own.first()
        {
            orders.push(Order::Recruit {
                kind: UnitKind::Miner,
                at: (base.x, base.y + 1),
            });
        }
        log.log(&format!(
            "turn {}: {} units, {} orders, {} currency",
            view.turn,
            view.own.len(),
            orders.len(),
            view.currency
        ));
        orders
    }
}

/// Closest point by Chebyshev distance, ties broken by iteration order.
fn nearest<I>(points: I, x: i16, y: i16) -> Option<(i16, i16)>
where
    I: Iterator<Item = (i16, i16)>,
{
    points.min_by_key(|&(px, py)| {
        let dx = (i32::from(px) - i32::from(x)).abs();
        let dy = (i32::from(py) - i32::from(y)).abs();
        dx.max(dy)
    })
}
