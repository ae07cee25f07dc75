//! The orchestrator's control loop: the per-turn two-party handshake,
//! budget policy, and verdict construction.
//!
//! The coordinator drives strict A-then-B alternation: competitor A's turn
//! fully completes, including budget accounting, before B's begins. This
//! ordering is a reproducibility requirement, not an optimization. All
//! waiting is spin-polling on the channel atomics; there is deliberately no
//! blocking primitive because the channel crosses a process boundary. The
//! effective latency for observing a flag flip is one poll iteration (a
//! scheduler yield).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::channel::Channel;
use crate::verdict::{CompetitorReport, CompetitorStatus, MatchWinner, Verdict, WinKind};
use crate::world::{Intent, Side, Winner, World};

/// Why the coordinator stopped before natural completion.
///
/// When both signals are pending, cancellation wins: the unwind priority is
/// explicit rather than a race outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Externally requested early stop (operator, or crash supervision).
    Cancelled,
    /// The match deadline fired.
    TimedOut,
}

const STOP_CANCEL: u8 = 0b01;
const STOP_TIMEOUT: u8 = 0b10;

/// The two asynchronous stop signals, polled from the coordinator loop.
///
/// Setters are push-side (timer, supervisor, operator); the coordinator
/// only ever polls [`StopFlag::current`] at its poll points.
#[derive(Debug, Default)]
pub struct StopFlag(AtomicU8);

impl StopFlag {
    /// No signal pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn request_cancel(&self) {
        self.0.fetch_or(STOP_CANCEL, Ordering::AcqRel);
    }

    /// Record deadline expiry.
    pub fn request_timeout(&self) {
        self.0.fetch_or(STOP_TIMEOUT, Ordering::AcqRel);
    }

    /// The pending stop reason, cancellation taking priority.
    #[must_use]
    pub fn current(&self) -> Option<StopReason> {
        let bits = self.0.load(Ordering::Acquire);
        if bits & STOP_CANCEL != 0 {
            Some(StopReason::Cancelled)
        } else if bits & STOP_TIMEOUT != 0 {
            Some(StopReason::TimedOut)
        } else {
            None
        }
    }

    /// Acknowledge a cancellation request (the coordinator clears the flag
    /// as it unwinds).
    pub fn clear_cancel(&self) {
        self.0.fetch_and(!STOP_CANCEL, Ordering::AcqRel);
    }
}

/// Budgets supplied at coordinator construction. The core assumes no
/// defaults; the CLI layer supplies them.
#[derive(Debug, Clone, Copy)]
pub struct MatchLimits {
    /// Per-turn instruction ceiling; overruns void that turn's moves.
    pub turn_instruction_limit: u64,
    /// Whole-match instruction ceiling; overruns end the match.
    pub game_instruction_limit: u64,
    /// Maximum rounds before the match is decided by score.
    pub max_turns: u32,
    /// Wall-clock budget for the whole match.
    pub match_duration: Duration,
}

/// Coordinator lifecycle states. Terminal states are mutually exclusive
/// and final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    /// Constructed, not yet run.
    Idle,
    /// The turn loop is executing.
    Running,
    /// The match ran to a judged verdict.
    Completed,
    /// The deadline fired before natural completion.
    TimedOut,
    /// Cancellation was requested before natural completion.
    Cancelled,
}

/// Outcome of one competitor's turn.
enum TurnEnd {
    Finished { exceeded: bool, voided: bool },
    Stopped(StopReason),
}

/// Drives one match to exactly one verdict.
///
/// Owns both channels for the lifetime of the match; nothing is reused
/// across matches.
#[derive(Debug)]
pub struct MatchCoordinator {
    channels: [Channel; 2],
    limits: MatchLimits,
    stop: Arc<StopFlag>,
    state: MatchState,
    last_seen: [u64; 2],
    rounds: u32,
}

impl MatchCoordinator {
    /// Build a coordinator over two created channels (A first).
    #[must_use]
    pub fn new(channels: [Channel; 2], limits: MatchLimits, stop: Arc<StopFlag>) -> Self {
        Self {
            channels,
            limits,
            stop,
            state: MatchState::Idle,
            last_seen: [0; 2],
            rounds: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MatchState {
        self.state
    }

    /// The stop signal this coordinator polls.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<StopFlag> {
        Arc::clone(&self.stop)
    }

    /// Cumulative per-competitor instruction totals observed so far.
    #[must_use]
    pub fn instruction_totals(&self) -> [u64; 2] {
        self.last_seen
    }

    /// Run the match to its single verdict.
    ///
    /// Every exit path, judged or not, marks both channels halted so the
    /// competitor runners unwind cleanly; no partial snapshot write is ever
    /// exposed before the verdict is finalized.
    pub fn run(&mut self, world: &mut dyn World) -> Verdict {
        self.state = MatchState::Running;
        let verdict = self.run_rounds(world);
        for channel in &self.channels {
            channel.set_halted();
        }
        verdict
    }

    fn run_rounds(&mut self, world: &mut dyn World) -> Verdict {
        for _ in 0..self.limits.max_turns {
            let mut exceeded = [false; 2];
            let mut voided = [false; 2];

            for side in Side::ORDER {
                match self.take_turn(side) {
                    TurnEnd::Stopped(reason) => return self.stop_verdict(world, reason),
                    TurnEnd::Finished { exceeded: e, voided: v } => {
                        exceeded[side.index()] = e;
                        voided[side.index()] = v;
                    }
                }
            }

            // The game budget ends the match only after both turns this
            // round, so a later-moving B can still exceed in the same round.
            if exceeded[0] || exceeded[1] {
                self.state = MatchState::Completed;
                return self.budget_verdict(world, exceeded);
            }

            let intents = [
                self.intent_for(Side::A, voided[Side::A.index()]),
                self.intent_for(Side::B, voided[Side::B.index()]),
            ];
            world.apply_moves(intents);
            self.rounds += 1;

            if let Some(winner) = world.is_over() {
                self.state = MatchState::Completed;
                return self.deathmatch_verdict(world, winner);
            }

            self.channels[Side::A.index()].write_snapshot(&world.snapshot_for(Side::A));
            self.channels[Side::B.index()].write_snapshot(&world.snapshot_for(Side::B));
        }

        self.state = MatchState::Completed;
        self.score_verdict(world)
    }

    /// One competitor's turn: grant, spin-poll, account.
    fn take_turn(&mut self, side: Side) -> TurnEnd {
        let channel = &self.channels[side.index()];
        channel.set_running();

        let stopped = loop {
            if !channel.is_running() {
                break None;
            }
            if let Some(reason) = self.stop.current() {
                break Some(reason);
            }
            std::thread::yield_now();
        };

        // Cancellation returns immediately, before any accounting.
        if stopped == Some(StopReason::Cancelled) {
            return TurnEnd::Stopped(StopReason::Cancelled);
        }

        let total = channel.instruction_count();
        let delta = total.saturating_sub(self.last_seen[side.index()]);
        self.last_seen[side.index()] = total;

        // Game budget is cumulative and hard; turn budget is per-turn and
        // soft (voids this turn's moves only).
        let exceeded = total > self.limits.game_instruction_limit;
        let voided = !exceeded && delta > self.limits.turn_instruction_limit;

        if stopped == Some(StopReason::TimedOut) {
            return TurnEnd::Stopped(StopReason::TimedOut);
        }

        TurnEnd::Finished { exceeded, voided }
    }

    fn intent_for(&self, side: Side, voided: bool) -> Intent {
        if voided {
            return Intent::void();
        }
        let snapshot = self.channels[side.index()].read_snapshot();
        Intent::new(snapshot.orders.as_slice().to_vec())
    }

    fn stop_verdict(&mut self, world: &dyn World, reason: StopReason) -> Verdict {
        match reason {
            StopReason::Cancelled => {
                self.stop.clear_cancel();
                self.state = MatchState::Cancelled;
            }
            StopReason::TimedOut => self.state = MatchState::TimedOut,
        }
        Verdict::unjudged(world.scores(), self.rounds)
    }

    fn budget_verdict(&self, world: &dyn World, exceeded: [bool; 2]) -> Verdict {
        let winner = match exceeded {
            [true, true] => MatchWinner::Tie,
            [true, false] => MatchWinner::B,
            [false, true] => MatchWinner::A,
            // Unreachable by construction; judged as a tie if it ever were.
            [false, false] => MatchWinner::Tie,
        };
        let scores = world.scores();
        let status = |over: bool| {
            if over {
                CompetitorStatus::ExceededInstructionLimit
            } else {
                CompetitorStatus::Normal
            }
        };
        Verdict {
            winner,
            win_kind: WinKind::ExceededInstructionLimit,
            reports: [
                CompetitorReport { score: scores[0], status: status(exceeded[0]) },
                CompetitorReport { score: scores[1], status: status(exceeded[1]) },
            ],
            rounds: self.rounds,
        }
    }

    fn deathmatch_verdict(&self, world: &dyn World, winner: Winner) -> Verdict {
        let scores = world.scores();
        Verdict {
            winner: winner.into(),
            win_kind: WinKind::Deathmatch,
            reports: [
                CompetitorReport { score: scores[0], status: CompetitorStatus::Normal },
                CompetitorReport { score: scores[1], status: CompetitorStatus::Normal },
            ],
            rounds: self.rounds,
        }
    }

    fn score_verdict(&self, world: &dyn World) -> Verdict {
        let scores = world.scores();
        let winner = match scores[0].cmp(&scores[1]) {
            std::cmp::Ordering::Greater => MatchWinner::A,
            std::cmp::Ordering::Less => MatchWinner::B,
            std::cmp::Ordering::Equal => MatchWinner::Tie,
        };
        Verdict {
            winner,
            win_kind: WinKind::Score,
            reports: [
                CompetitorReport { score: scores[0], status: CompetitorStatus::Normal },
                CompetitorReport { score: scores[1], status: CompetitorStatus::Normal },
            ],
            rounds: self.rounds,
        }
    }
}
