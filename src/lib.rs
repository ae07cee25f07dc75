// Allow unwrap in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Arbiter: the match-execution core for two-process programming-game
//! duels.
//!
//! A trusted orchestrator runs one deterministic, turn-based match between
//! two untrusted, independently compiled competitor programs, each isolated
//! in its own OS process, while enforcing wall-clock and CPU-instruction
//! budgets and producing exactly one reproducible verdict.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ProcessSupervisor   (spawn + crash watch)   │
//! ├──────────────────────────────────────────────┤
//! │  MatchCoordinator ── MatchTimer              │
//! │        │ turn handshake, budgets, verdict    │
//! ├────────┼─────────────────────────────────────┤
//! │  Channel A            Channel B   (shm)      │
//! ├────────┼──────────────────┼──────────────────┤
//! │  CompetitorRunner A   CompetitorRunner B     │
//! │  (separate OS processes)                     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Synchronization between orchestrator and competitors is spin-polling on
//! each channel's atomics; there are no locks and no cross-process blocking
//! primitives anywhere in this crate.

pub mod channel;
pub mod coordinator;
pub mod error;
pub mod runner;
pub mod shm;
pub mod supervisor;
pub mod timer;
pub mod transfer;
pub mod verdict;
pub mod world;

pub use channel::{Channel, InstructionMeter};
pub use coordinator::{MatchCoordinator, MatchLimits, MatchState, StopFlag, StopReason};
pub use error::{ChannelError, ChannelResult};
pub use timer::MatchTimer;
pub use transfer::TransferState;
pub use verdict::{CompetitorStatus, MatchWinner, Verdict, WinKind};
pub use world::{Side, Winner, World};
