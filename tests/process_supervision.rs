//! Full-stack matches with real competitor processes.
//!
//! These spawn the `arbiter compete` demo competitor (via
//! `CARGO_BIN_EXE_arbiter`) in separate OS processes and drive a real
//! match through shared memory, including the crash-supervision path.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use arbiter::channel::Channel;
use arbiter::coordinator::{MatchCoordinator, MatchLimits, StopFlag};
use arbiter::supervisor::ProcessSupervisor;
use arbiter::verdict::{CompetitorStatus, MatchWinner, WinKind};
use arbiter::world::demo::DemoWorld;
use arbiter::world::{Side, World};

fn unique(tag: &str) -> String {
    static SEQ: AtomicU32 = AtomicU32::new(0);
    format!(
        "arbiter-ps-{}-{}-{}",
        tag,
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

fn compete_command(channel: &str, max_turns: u32) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_arbiter"));
    cmd.args([
        "compete",
        "--channel",
        channel,
        "--max-turns",
        &max_turns.to_string(),
    ]);
    cmd
}

fn limits(max_turns: u32) -> MatchLimits {
    MatchLimits {
        turn_instruction_limit: 100_000,
        game_instruction_limit: 10_000_000,
        max_turns,
        match_duration: Duration::from_secs(30),
    }
}

#[test]
fn test_full_match_with_real_processes_reaches_score_verdict() {
    let names = [unique("full-a"), unique("full-b")];
    let mut world = DemoWorld::new();
    let channels = [
        Channel::create(&names[0], &world.snapshot_for(Side::A)).unwrap(),
        Channel::create(&names[1], &world.snapshot_for(Side::B)).unwrap(),
    ];

    let stop = Arc::new(StopFlag::new());
    let supervisor = ProcessSupervisor::spawn(
        [compete_command(&names[0], 5), compete_command(&names[1], 5)],
        Arc::clone(&stop),
    )
    .unwrap();

    let mut coordinator = MatchCoordinator::new(channels, limits(5), stop);
    let mut verdict = coordinator.run(&mut world);
    let report = supervisor.wait();
    report.apply_to(&mut verdict);

    assert_eq!(verdict.win_kind, WinKind::Score);
    assert_eq!(verdict.rounds, 5);
    assert!(!report.any_crashed());
    assert_eq!(report.exit_codes, [Some(0), Some(0)]);
    for side in Side::ORDER {
        assert_eq!(verdict.report(side).status, CompetitorStatus::Normal);
    }
    // The demo competitor accounts instructions through the shared meter.
    let totals = coordinator.instruction_totals();
    assert!(totals[0] > 0);
    assert!(totals[1] > 0);
}

#[test]
fn test_competitor_crash_becomes_runtime_error() {
    let names = [unique("crash-a"), unique("crash-b")];
    let mut world = DemoWorld::new();
    let channels = [
        Channel::create(&names[0], &world.snapshot_for(Side::A)).unwrap(),
        Channel::create(&names[1], &world.snapshot_for(Side::B)).unwrap(),
    ];

    // B is pointed at a channel that does not exist: it fails to attach
    // and exits non-zero, which is the crash contract.
    let bogus = unique("missing");
    let stop = Arc::new(StopFlag::new());
    let supervisor = ProcessSupervisor::spawn(
        [compete_command(&names[0], 50), compete_command(&bogus, 50)],
        Arc::clone(&stop),
    )
    .unwrap();

    let mut coordinator = MatchCoordinator::new(channels, limits(50), stop);
    let mut verdict = coordinator.run(&mut world);
    let report = supervisor.wait();
    report.apply_to(&mut verdict);

    // The crash cancelled the match: unjudged verdict, B overridden.
    assert_eq!(verdict.winner, MatchWinner::None);
    assert_eq!(verdict.win_kind, WinKind::None);
    assert_eq!(report.crashed, [false, true]);
    assert_eq!(
        verdict.report(Side::B).status,
        CompetitorStatus::RuntimeError
    );
    assert_ne!(
        verdict.report(Side::A).status,
        CompetitorStatus::RuntimeError
    );
}
