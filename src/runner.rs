//! The competitor-process side of the handshake.
//!
//! A [`CompetitorRunner`] attaches to its channel, spin-polls for the turn
//! grant, converts the fixed snapshot into the rich [`TurnView`], invokes
//! the competitor's decision callback under the injected
//! [`InstructionMeter`], writes the returned orders back into the snapshot,
//! and clears `running` to hand the turn back. What increments the meter is
//! the instrumentation layer's business; the runner only passes the
//! capability through.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::channel::{Channel, InstructionMeter};
use crate::error::ChannelResult;
use crate::transfer::{MAP_SIZE, Order, OrderArray, Terrain, TransferState, UnitKind};
use crate::world::Unit;

/// Fixed sentinel appended when the debug log hits its character budget.
pub const LOG_TRUNCATED_SENTINEL: &str = "[debug log truncated]";

/// A competitor's decision callback.
pub trait Competitor {
    /// Decide one turn's orders from the visible state.
    ///
    /// `meter` is the instruction-accounting capability; `log` is the
    /// bounded per-match debug log.
    fn take_turn(
        &mut self,
        view: &TurnView,
        meter: &InstructionMeter<'_>,
        log: &mut DebugLog,
    ) -> Vec<Order>;
}

/// The rich, decision-facing view of one turn, unpacked from the fixed
/// snapshot.
#[derive(Debug, Clone)]
pub struct TurnView {
    /// Zero-based turn index on this competitor's side.
    pub turn: u32,
    /// Terrain grid, row-major `[y][x]`.
    pub terrain: [[Terrain; MAP_SIZE]; MAP_SIZE],
    /// Own units, warriors then miners, in snapshot order.
    pub own: Vec<Unit>,
    /// Visible enemy units, warriors then miners, in snapshot order.
    pub enemy: Vec<Unit>,
    /// Gold-mine locations.
    pub mines: Vec<(i16, i16)>,
    /// Own score.
    pub score: i64,
    /// Own currency balance.
    pub currency: i64,
}

impl TurnView {
    /// Unpack a snapshot into the rich view.
    #[must_use]
    pub fn from_snapshot(snapshot: &TransferState, turn: u32) -> Self {
        let unpack = |warriors: &crate::transfer::UnitArray,
                      miners: &crate::transfer::UnitArray| {
            let mut units = Vec::with_capacity(
                warriors.as_slice().len() + miners.as_slice().len(),
            );
            for entry in warriors.as_slice() {
                units.push(Unit::from_entry(*entry, UnitKind::Warrior));
            }
            for entry in miners.as_slice() {
                units.push(Unit::from_entry(*entry, UnitKind::Miner));
            }
            units
        };
        Self {
            turn,
            terrain: snapshot.terrain,
            own: unpack(&snapshot.own_warriors, &snapshot.own_miners),
            enemy: unpack(&snapshot.enemy_warriors, &snapshot.enemy_miners),
            mines: snapshot.mines.as_slice().to_vec(),
            score: snapshot.score,
            currency: snapshot.currency,
        }
    }
}

/// Bounded per-match debug log. Content past the character budget is
/// replaced by a single fixed sentinel line; flushing happens once, at
/// the end of the run.
#[derive(Debug)]
pub struct DebugLog {
    buf: String,
    limit: usize,
    truncated: bool,
}

impl DebugLog {
    /// An empty log with the given character budget.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buf: String::new(),
            limit,
            truncated: false,
        }
    }

    /// Append one line. Once the budget is exhausted the sentinel is
    /// appended and all further lines are dropped.
    pub fn log(&mut self, line: &str) {
        if self.truncated {
            return;
        }
        if self.buf.len() + line.len() + 1 > self.limit {
            self.buf.push_str(LOG_TRUNCATED_SENTINEL);
            self.buf.push('\n');
            self.truncated = true;
            return;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// Whether the budget was hit.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Accumulated content.
    #[must_use]
    pub fn contents(&self) -> &str {
        &self.buf
    }

    /// Write the accumulated content to a file.
    ///
    /// # Errors
    ///
    /// Any I/O error from creating or writing the file.
    pub fn flush_to(&self, path: &std::path::Path) -> io::Result<()> {
        std::fs::write(path, &self.buf)
    }
}

/// Competitor-side configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on turns served; mirrors the coordinator's `max_turns`.
    pub max_turns: u32,
    /// Character budget for the debug log.
    pub log_limit: usize,
    /// Where to flush the debug log at exit, if anywhere.
    pub log_path: Option<PathBuf>,
    /// Local wall-clock bound on the whole run, if any.
    pub deadline: Option<Duration>,
}

/// Why the runner's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The orchestrator marked the match over.
    Halted,
    /// All `max_turns` turns were served.
    TurnsExhausted,
    /// The local deadline elapsed while waiting for a grant.
    DeadlineElapsed,
}

/// Result of a completed runner loop.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Turns actually served.
    pub turns_served: u32,
    /// Why the loop ended.
    pub end: RunEnd,
}

/// Runs inside the sandboxed competitor process for up to `max_turns`
/// granted turns.
#[derive(Debug)]
pub struct CompetitorRunner {
    channel: Channel,
    config: RunnerConfig,
    log: DebugLog,
}

impl CompetitorRunner {
    /// Attach to the named channel.
    ///
    /// # Errors
    ///
    /// Any [`crate::error::ChannelError`] from the attach.
    pub fn attach(name: &str, config: RunnerConfig) -> ChannelResult<Self> {
        let channel = Channel::attach(name)?;
        let log = DebugLog::new(config.log_limit);
        Ok(Self { channel, config, log })
    }

    /// Serve turns until halt, turn exhaustion, or the local deadline,
    /// then flush the debug log exactly once.
    ///
    /// # Errors
    ///
    /// Only the final log flush can fail.
    pub fn run(&mut self, competitor: &mut dyn Competitor) -> io::Result<RunReport> {
        let started = Instant::now();
        let mut turns_served = 0;
        let mut end = RunEnd::TurnsExhausted;

        'turns: for turn in 0..self.config.max_turns {
            // Spin-poll for the grant; the grant flag is the only
            // cross-process synchronization primitive.
            loop {
                if self.channel.is_halted() {
                    end = RunEnd::Halted;
                    break 'turns;
                }
                if let Some(deadline) = self.config.deadline
                    && started.elapsed() > deadline
                {
                    end = RunEnd::DeadlineElapsed;
                    break 'turns;
                }
                if self.channel.is_running() {
                    break;
                }
                std::thread::yield_now();
            }

            let mut snapshot = self.channel.read_snapshot();
            let view = TurnView::from_snapshot(&snapshot, turn);
            let orders = competitor.take_turn(&view, &self.channel.meter(), &mut self.log);
            snapshot.orders = OrderArray::from_orders(&orders);
            self.channel.write_snapshot(&snapshot);
            self.channel.clear_running();
            turns_served += 1;
        }

        if let Some(path) = &self.config.log_path {
            self.log.flush_to(path)?;
        }
        Ok(RunReport { turns_served, end })
    }

    /// The accumulated debug log.
    #[must_use]
    pub fn log(&self) -> &DebugLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::UnitEntry;

    fn unique(tag: &str) -> String {
        use std::sync::atomic::{AtomicU32, Ordering};
        static SEQ: AtomicU32 = AtomicU32::new(0);
        format!(
            "arbiter-runner-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            max_turns: 8,
            log_limit: 4096,
            log_path: None,
            deadline: Some(Duration::from_secs(5)),
        }
    }

    struct EchoCompetitor;

    impl Competitor for EchoCompetitor {
        fn take_turn(
            &mut self,
            view: &TurnView,
            meter: &InstructionMeter<'_>,
            log: &mut DebugLog,
        ) -> Vec<Order> {
            meter.add(7);
            log.log(&format!("turn {}", view.turn));
            view.own
                .iter()
                .map(|u| Order::Move { unit: u.id, to: (u.x + 1, u.y) })
                .collect()
        }
    }

    #[test]
    fn test_debug_log_truncates_with_sentinel() {
        let mut log = DebugLog::new(32);
        log.log("0123456789");
        log.log("0123456789");
        assert!(!log.is_truncated());
        log.log("0123456789ABCDEF");
        assert!(log.is_truncated());
        assert!(log.contents().ends_with(&format!("{LOG_TRUNCATED_SENTINEL}\n")));
        // Everything after the sentinel is dropped.
        let before = log.contents().to_string();
        log.log("more");
        assert_eq!(log.contents(), before);
    }

    #[test]
    fn test_debug_log_flushes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("competitor.log");
        let mut log = DebugLog::new(1024);
        log.log("hello");
        log.flush_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_turn_view_unpacks_kinds() {
        let mut snapshot = TransferState::default();
        snapshot.own_warriors.push(UnitEntry { id: 1, x: 0, y: 0, hp: 40 });
        snapshot.own_miners.push(UnitEntry { id: 2, x: 1, y: 1, hp: 10 });
        snapshot.enemy_miners.push(UnitEntry { id: 9, x: 5, y: 5, hp: 10 });
        snapshot.score = 3;

        let view = TurnView::from_snapshot(&snapshot, 4);
        assert_eq!(view.turn, 4);
        assert_eq!(view.own.len(), 2);
        assert_eq!(view.own[0].kind, UnitKind::Warrior);
        assert_eq!(view.own[1].kind, UnitKind::Miner);
        assert_eq!(view.enemy[0].id, 9);
        assert_eq!(view.score, 3);
    }

    #[test]
    fn test_runner_serves_granted_turns() {
        let name = unique("serve");
        let mut initial = TransferState::default();
        initial.own_warriors.push(UnitEntry { id: 1, x: 2, y: 2, hp: 40 });
        let orchestrator = Channel::create(&name, &initial).unwrap();

        let handle = {
            let name = name.clone();
            std::thread::spawn(move || {
                let mut runner = CompetitorRunner::attach(&name, config()).unwrap();
                runner.run(&mut EchoCompetitor).unwrap()
            })
        };

        for _ in 0..2 {
            orchestrator.set_running();
            while orchestrator.is_running() {
                std::thread::yield_now();
            }
        }
        let snapshot = orchestrator.read_snapshot();
        assert_eq!(
            snapshot.orders.as_slice(),
            &[Order::Move { unit: 1, to: (3, 2) }]
        );
        assert_eq!(orchestrator.instruction_count(), 14);

        orchestrator.set_halted();
        let report = handle.join().unwrap();
        assert_eq!(report.turns_served, 2);
        assert_eq!(report.end, RunEnd::Halted);
    }
}
