//! The World collaborator contract and rich world-facing types.
//!
//! Game rules live behind the [`World`] trait: the coordinator only ever
//! calls it synchronously, once per round, and treats it as total. The rich
//! types here are the variable-length counterparts of the fixed-capacity
//! transfer representation; [`demo::DemoWorld`] is a deliberately small
//! implementation so the CLI and integration tests have a concrete
//! collaborator.

pub mod demo;

use crate::transfer::{Order, TransferState, UnitEntry, UnitKind};

/// One of the two competitors in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The first competitor.
    A,
    /// The second competitor.
    B,
}

impl Side {
    /// Both sides in turn order. Competitor A's turn always fully completes
    /// before B's begins.
    pub const ORDER: [Self; 2] = [Self::A, Self::B];

    /// Array index for per-competitor state.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    /// The other competitor.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Outcome the world reports when the game is over on its own terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    /// Competitor A won.
    A,
    /// Competitor B won.
    B,
    /// Neither side won.
    Tie,
}

impl Winner {
    /// The winner corresponding to a side.
    #[must_use]
    pub fn from_side(side: Side) -> Self {
        match side {
            Side::A => Self::A,
            Side::B => Self::B,
        }
    }
}

/// A unit in the rich world-facing representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    /// Stable identity across turns.
    pub id: u32,
    /// Unit kind.
    pub kind: UnitKind,
    /// Grid x coordinate.
    pub x: i16,
    /// Grid y coordinate.
    pub y: i16,
    /// Remaining hit points.
    pub hp: i32,
}

impl Unit {
    /// The fixed transfer entry for this unit (kind is implied by which
    /// array the entry lands in).
    #[must_use]
    pub fn to_entry(self) -> UnitEntry {
        UnitEntry {
            id: self.id,
            x: self.x,
            y: self.y,
            hp: self.hp,
        }
    }

    /// Rebuild a unit from a transfer entry and the kind implied by its
    /// source array.
    #[must_use]
    pub fn from_entry(entry: UnitEntry, kind: UnitKind) -> Self {
        Self {
            id: entry.id,
            kind,
            x: entry.x,
            y: entry.y,
            hp: entry.hp,
        }
    }
}

/// One competitor's move intent for a round, in the form the world applies.
///
/// A voided turn (per-turn budget overrun) is an empty intent.
#[derive(Debug, Clone, Default)]
pub struct Intent {
    /// Orders in submission order.
    pub orders: Vec<Order>,
}

impl Intent {
    /// Intent carrying the given orders.
    #[must_use]
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// The empty intent submitted for a voided turn.
    #[must_use]
    pub fn void() -> Self {
        Self::default()
    }
}

/// The synchronous game-rules collaborator the coordinator drives.
///
/// All methods are total: they never block, never fail, and tolerate any
/// intent the transfer layer can decode.
pub trait World {
    /// Apply both competitors' intents for one round, A's first.
    fn apply_moves(&mut self, intents: [Intent; 2]);

    /// Whether the game has ended on its own terms, and who won.
    fn is_over(&self) -> Option<Winner>;

    /// Current per-competitor scores.
    fn scores(&self) -> [i64; 2];

    /// The fixed-capacity snapshot visible to one competitor.
    fn snapshot_for(&self, side: Side) -> TransferState;
}
