//! The match verdict: winner, win kind, and per-competitor reports.
//!
//! Every match produces exactly one verdict. Unwinding paths (timeout,
//! cancellation, crash) populate it too, defaulting to `None`/`Undefined`
//! when the match could not be judged.

use serde::{Deserialize, Serialize};

use crate::world::{Side, Winner};

/// Who won the match, including the unjudged case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchWinner {
    /// Competitor A.
    A,
    /// Competitor B.
    B,
    /// Both competitors finished equal.
    Tie,
    /// The match was not judged (cancelled or timed out).
    None,
}

impl From<Winner> for MatchWinner {
    fn from(winner: Winner) -> Self {
        match winner {
            Winner::A => Self::A,
            Winner::B => Self::B,
            Winner::Tie => Self::Tie,
        }
    }
}

/// How the match was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    /// The world reported game over before `max_turns`.
    Deathmatch,
    /// `max_turns` elapsed; decided by score comparison.
    Score,
    /// A competitor exhausted its whole-match instruction budget.
    ExceededInstructionLimit,
    /// The match was not judged.
    None,
}

/// Per-competitor outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitorStatus {
    /// The match concluded before this competitor was judged.
    Undefined,
    /// Finished the match within budget.
    Normal,
    /// Exhausted the whole-match instruction budget.
    ExceededInstructionLimit,
    /// The competitor process exited abnormally.
    RuntimeError,
    /// The competitor was terminated after the wall-clock deadline.
    Timeout,
}

/// One competitor's final score and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorReport {
    /// Final score as reported by the world.
    pub score: i64,
    /// Outcome classification.
    pub status: CompetitorStatus,
}

impl CompetitorReport {
    /// A report for a competitor the match never judged.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            score: 0,
            status: CompetitorStatus::Undefined,
        }
    }
}

/// The final result of one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Who won.
    pub winner: MatchWinner,
    /// How the match was decided.
    pub win_kind: WinKind,
    /// Per-competitor reports, indexed by [`Side::index`].
    pub reports: [CompetitorReport; 2],
    /// Rounds fully applied before the match ended.
    pub rounds: u32,
}

impl Verdict {
    /// The verdict for a match that could not be judged (cancelled or
    /// timed out): no winner, no win kind, both statuses undefined.
    #[must_use]
    pub fn unjudged(scores: [i64; 2], rounds: u32) -> Self {
        Self {
            winner: MatchWinner::None,
            win_kind: WinKind::None,
            reports: [
                CompetitorReport {
                    score: scores[0],
                    status: CompetitorStatus::Undefined,
                },
                CompetitorReport {
                    score: scores[1],
                    status: CompetitorStatus::Undefined,
                },
            ],
            rounds,
        }
    }

    /// One competitor's report.
    #[must_use]
    pub fn report(&self, side: Side) -> CompetitorReport {
        self.reports[side.index()]
    }

    /// Override one competitor's status (used by the supervisor to record
    /// a crash after the coordinator has unwound).
    pub fn set_status(&mut self, side: Side, status: CompetitorStatus) {
        self.reports[side.index()].status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unjudged_shape() {
        let verdict = Verdict::unjudged([3, 4], 2);
        assert_eq!(verdict.winner, MatchWinner::None);
        assert_eq!(verdict.win_kind, WinKind::None);
        assert_eq!(verdict.report(Side::A).status, CompetitorStatus::Undefined);
        assert_eq!(verdict.report(Side::B).score, 4);
    }

    #[test]
    fn test_status_override() {
        let mut verdict = Verdict::unjudged([0, 0], 0);
        verdict.set_status(Side::B, CompetitorStatus::RuntimeError);
        assert_eq!(verdict.report(Side::A).status, CompetitorStatus::Undefined);
        assert_eq!(
            verdict.report(Side::B).status,
            CompetitorStatus::RuntimeError
        );
    }

    #[test]
    fn test_json_shape() {
        let verdict = Verdict::unjudged([0, 0], 0);
        let json = serde_json::to_string(&verdict).unwrap();
        assert!(json.contains("\"winner\":\"none\""));
        assert!(json.contains("\"status\":\"undefined\""));
    }

    #[test]
    fn test_winner_conversion() {
        assert_eq!(MatchWinner::from(Winner::Tie), MatchWinner::Tie);
        assert_eq!(MatchWinner::from(Winner::A), MatchWinner::A);
    }
}
