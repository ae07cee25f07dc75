//! Crash supervision of the two competitor processes.
//!
//! The supervisor spawns both children and waits on their exits from two
//! watcher threads. The first abnormal exit kills the sibling outright and
//! requests coordinator cancellation; which competitor(s) crashed is
//! recorded and later stamped onto the verdict as RUNTIME_ERROR. If both
//! children exit zero, the coordinator's own verdict stands untouched.
//! Exactly one of natural completion or crash-triggered cancellation
//! decides the final verdict shape.

use std::io;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::coordinator::StopFlag;
use crate::verdict::{CompetitorStatus, Verdict};
use crate::world::Side;

/// Which competitor processes exited abnormally, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashReport {
    /// Per-side organic crash flags (a sibling the supervisor killed is
    /// not a crash).
    pub crashed: [bool; 2],
    /// Per-side exit codes; `None` when killed by a signal.
    pub exit_codes: [Option<i32>; 2],
}

impl CrashReport {
    /// Whether either competitor crashed.
    #[must_use]
    pub fn any_crashed(&self) -> bool {
        self.crashed[0] || self.crashed[1]
    }

    /// Stamp RUNTIME_ERROR over the crashed side(s) after the coordinator
    /// has unwound. Other statuses remain whatever the coordinator
    /// computed.
    pub fn apply_to(&self, verdict: &mut Verdict) {
        for side in Side::ORDER {
            if self.crashed[side.index()] {
                verdict.set_status(side, CompetitorStatus::RuntimeError);
            }
        }
    }
}

struct Watch {
    stop: Arc<StopFlag>,
    pids: [u32; 2],
    intervened: AtomicBool,
    exited: [AtomicBool; 2],
    crashed: [AtomicBool; 2],
    exit_codes: Mutex<[Option<i32>; 2]>,
}

/// Spawns and watches exactly two competitor processes.
#[derive(Debug)]
pub struct ProcessSupervisor {
    shared: Arc<Watch>,
    watchers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("pids", &self.pids)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Spawn both competitors (A first) and start watching their exits.
    ///
    /// # Errors
    ///
    /// Any spawn failure; a child spawned before the failure is killed.
    pub fn spawn(commands: [Command; 2], stop: Arc<StopFlag>) -> io::Result<Self> {
        let [mut cmd_a, mut cmd_b] = commands;

        let child_a = cmd_a.spawn()?;
        let child_b = match cmd_b.spawn() {
            Ok(child) => child,
            Err(err) => {
                hard_kill(child_a.id());
                return Err(err);
            }
        };

        let shared = Arc::new(Watch {
            stop,
            pids: [child_a.id(), child_b.id()],
            intervened: AtomicBool::new(false),
            exited: [AtomicBool::new(false), AtomicBool::new(false)],
            crashed: [AtomicBool::new(false), AtomicBool::new(false)],
            exit_codes: Mutex::new([None, None]),
        });

        let watchers = [(0, child_a), (1, child_b)]
            .map(|(idx, child)| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || watch_child(idx, child, &shared))
            })
            .into_iter()
            .collect();

        Ok(Self { shared, watchers })
    }

    /// Block until both children have exited and report what happened.
    #[must_use]
    pub fn wait(self) -> CrashReport {
        for watcher in self.watchers {
            // A watcher only panics if a competitor test double does.
            let _ = watcher.join();
        }
        let exit_codes = self
            .shared
            .exit_codes
            .lock()
            .map_or([None, None], |codes| *codes);
        CrashReport {
            crashed: [
                self.shared.crashed[0].load(Ordering::Acquire),
                self.shared.crashed[1].load(Ordering::Acquire),
            ],
            exit_codes,
        }
    }
}

fn watch_child(idx: usize, mut child: Child, shared: &Watch) {
    let status = child.wait();
    let (success, code) = match &status {
        Ok(status) => (status.success(), status.code()),
        // Losing the child handle counts as a crash.
        Err(_) => (false, None),
    };

    if let Ok(mut codes) = shared.exit_codes.lock() {
        codes[idx] = code;
    }
    shared.exited[idx].store(true, Ordering::Release);

    if success {
        return;
    }

    let first = !shared.intervened.swap(true, Ordering::AcqRel);
    // After an intervention a signal-killed child is the kill we issued,
    // not a crash; an exit code is always the child's own doing.
    if first || code.is_some() {
        shared.crashed[idx].store(true, Ordering::Release);
    }
    if first {
        // A reaped sibling's PID may already belong to another process;
        // only a still-running sibling gets the kill.
        if !shared.exited[1 - idx].load(Ordering::Acquire) {
            hard_kill(shared.pids[1 - idx]);
        }
        shared.stop.request_cancel();
    }
}

/// Terminate a process outright.
fn hard_kill(pid: u32) {
    #[cfg(unix)]
    {
        let Ok(pid) = i32::try_from(pid) else {
            return;
        };
        unsafe {
            let _ = libc::kill(pid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::MatchWinner;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn test_both_normal_exits_no_intervention() {
        let stop = Arc::new(StopFlag::new());
        let supervisor =
            ProcessSupervisor::spawn([sh("exit 0"), sh("exit 0")], Arc::clone(&stop))
                .unwrap();
        let report = supervisor.wait();
        assert!(!report.any_crashed());
        assert_eq!(report.exit_codes, [Some(0), Some(0)]);
        assert_eq!(stop.current(), None);
    }

    #[test]
    fn test_crash_kills_sibling_and_cancels() {
        let stop = Arc::new(StopFlag::new());
        let supervisor = ProcessSupervisor::spawn(
            [sh("sleep 30"), sh("exit 3")],
            Arc::clone(&stop),
        )
        .unwrap();
        let report = supervisor.wait();
        // B crashed organically; A was killed by the supervisor.
        assert_eq!(report.crashed, [false, true]);
        assert_eq!(report.exit_codes[1], Some(3));
        assert_eq!(
            stop.current(),
            Some(crate::coordinator::StopReason::Cancelled)
        );
    }

    #[test]
    fn test_crash_after_sibling_reaped_skips_kill() {
        let stop = Arc::new(StopFlag::new());
        // A exits cleanly well before B crashes, so by the time B's
        // watcher intervenes A's PID is already reaped and must not be
        // signalled again.
        let supervisor = ProcessSupervisor::spawn(
            [sh("exit 0"), sh("sleep 1; exit 7")],
            Arc::clone(&stop),
        )
        .unwrap();
        let report = supervisor.wait();
        assert_eq!(report.crashed, [false, true]);
        assert_eq!(report.exit_codes, [Some(0), Some(7)]);
        assert_eq!(
            stop.current(),
            Some(crate::coordinator::StopReason::Cancelled)
        );
    }

    #[test]
    fn test_crash_report_overrides_verdict_status() {
        let report = CrashReport {
            crashed: [false, true],
            exit_codes: [None, Some(1)],
        };
        let mut verdict = Verdict::unjudged([2, 5], 1);
        report.apply_to(&mut verdict);
        assert_eq!(verdict.winner, MatchWinner::None);
        assert_eq!(
            verdict.report(Side::A).status,
            CompetitorStatus::Undefined
        );
        assert_eq!(
            verdict.report(Side::B).status,
            CompetitorStatus::RuntimeError
        );
    }
}
