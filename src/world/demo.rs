//! A minimal deterministic world for demos and integration tests.
//!
//! Rules are intentionally tiny: units step one cell per turn toward their
//! ordered destination, warriors kill anything sharing their cell, miners
//! standing on a mine earn currency and score, and recruiting trades
//! currency for a new unit. Identical order streams always produce
//! identical states.

use crate::transfer::{
    MAP_SIZE, MineArray, Order, Terrain, TransferState, UnitArray, UnitKind,
};
use crate::world::{Intent, Side, Unit, Winner, World};

/// Currency cost of recruiting one unit.
pub const RECRUIT_COST: i64 = 50;
/// Currency and score yield per miner per turn on a mine.
pub const MINE_YIELD: i64 = 10;
/// Starting currency for each side.
pub const STARTING_CURRENCY: i64 = 100;

const WARRIOR_HP: i32 = 40;
const MINER_HP: i32 = 10;

/// The demo world: a plains map with a central river, mirrored mines, and
/// one warrior plus one miner per side.
#[derive(Debug, Clone)]
pub struct DemoWorld {
    terrain: [[Terrain; MAP_SIZE]; MAP_SIZE],
    units: [Vec<Unit>; 2],
    mines: Vec<(i16, i16)>,
    currency: [i64; 2],
    score: [i64; 2],
    next_id: u32,
    turn: u32,
}

impl Default for DemoWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoWorld {
    /// Build the fixed starting position.
    #[must_use]
    pub fn new() -> Self {
        let mut terrain = [[Terrain::Plains; MAP_SIZE]; MAP_SIZE];
        // A river down the middle with a ford at each end.
        for y in 4..MAP_SIZE - 4 {
            terrain[y][MAP_SIZE / 2] = Terrain::Water;
        }

        let units = [
            vec![
                Unit { id: 1, kind: UnitKind::Warrior, x: 2, y: 2, hp: WARRIOR_HP },
                Unit { id: 2, kind: UnitKind::Miner, x: 2, y: 3, hp: MINER_HP },
            ],
            vec![
                Unit { id: 3, kind: UnitKind::Warrior, x: 29, y: 29, hp: WARRIOR_HP },
                Unit { id: 4, kind: UnitKind::Miner, x: 29, y: 28, hp: MINER_HP },
            ],
        ];

        Self {
            terrain,
            units,
            mines: vec![(4, 4), (4, 27), (12, 16), (19, 16), (27, 4), (27, 27)],
            currency: [STARTING_CURRENCY; 2],
            score: [0; 2],
            next_id: 5,
            turn: 0,
        }
    }

    /// Rounds applied so far.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    /// Units currently alive for a side.
    #[must_use]
    pub fn units(&self, side: Side) -> &[Unit] {
        &self.units[side.index()]
    }

    #[allow(clippy::cast_sign_loss)]
    fn passable(&self, x: i16, y: i16) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= MAP_SIZE || y >= MAP_SIZE {
            return false;
        }
        matches!(self.terrain[y][x], Terrain::Plains | Terrain::Forest)
    }

    fn apply_intent(&mut self, side: Side, intent: &Intent) {
        for order in &intent.orders {
            match *order {
                Order::Move { unit, to } => self.step_unit(side, unit, to),
                Order::Recruit { kind, at } => self.recruit(side, kind, at),
            }
        }
    }

    fn step_unit(&mut self, side: Side, id: u32, to: (i16, i16)) {
        let Some((ux, uy)) = self.units[side.index()]
            .iter()
            .find(|u| u.id == id)
            .map(|u| (u.x, u.y))
        else {
            return;
        };
        // Destinations come straight off the wire, so the step direction is
        // computed by comparison rather than subtraction, which would
        // overflow for extreme coordinates.
        let nx = ux + step_toward(ux, to.0);
        let ny = uy + step_toward(uy, to.1);
        // Try the diagonal step first, then each axis alone.
        for (cx, cy) in [(nx, ny), (nx, uy), (ux, ny)] {
            if (cx, cy) != (ux, uy) && self.passable(cx, cy) {
                if let Some(unit) =
                    self.units[side.index()].iter_mut().find(|u| u.id == id)
                {
                    unit.x = cx;
                    unit.y = cy;
                }
                return;
            }
        }
    }

    fn recruit(&mut self, side: Side, kind: UnitKind, at: (i16, i16)) {
        if self.currency[side.index()] < RECRUIT_COST || !self.passable(at.0, at.1) {
            return;
        }
        self.currency[side.index()] -= RECRUIT_COST;
        let hp = match kind {
            UnitKind::Warrior => WARRIOR_HP,
            UnitKind::Miner => MINER_HP,
        };
        let id = self.next_id;
        self.next_id += 1;
        self.units[side.index()].push(Unit { id, kind, x: at.0, y: at.1, hp });
    }

    /// Simultaneous resolution: any unit sharing a cell with an enemy
    /// warrior dies, warriors included.
    fn resolve_combat(&mut self) {
        let warrior_cells: [Vec<(i16, i16)>; 2] = [
            warrior_cells(&self.units[0]),
            warrior_cells(&self.units[1]),
        ];
        for side in Side::ORDER {
            let threats = &warrior_cells[side.opponent().index()];
            self.units[side.index()]
                .retain(|unit| !threats.contains(&(unit.x, unit.y)));
        }
    }

    fn harvest(&mut self) {
        for side in Side::ORDER {
            let earned = self.units[side.index()]
                .iter()
                .filter(|u| u.kind == UnitKind::Miner)
                .filter(|u| self.mines.contains(&(u.x, u.y)))
                .count();
            #[allow(clippy::cast_possible_wrap)]
            let earned = earned as i64 * MINE_YIELD;
            self.currency[side.index()] += earned;
            self.score[side.index()] += earned;
        }
    }
}

/// One cell toward `to`, or zero when already there.
fn step_toward(from: i16, to: i16) -> i16 {
    match to.cmp(&from) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

fn warrior_cells(units: &[Unit]) -> Vec<(i16, i16)> {
    units
        .iter()
        .filter(|u| u.kind == UnitKind::Warrior)
        .map(|u| (u.x, u.y))
        .collect()
}

impl World for DemoWorld {
    fn apply_moves(&mut self, intents: [Intent; 2]) {
        for side in Side::ORDER {
            let intent = intents[side.index()].clone();
            self.apply_intent(side, &intent);
        }
        self.resolve_combat();
        self.harvest();
        self.turn += 1;
    }

    fn is_over(&self) -> Option<Winner> {
        if self.turn == 0 {
            return None;
        }
        match (self.units[0].is_empty(), self.units[1].is_empty()) {
            (true, true) => Some(Winner::Tie),
            (true, false) => Some(Winner::B),
            (false, true) => Some(Winner::A),
            (false, false) => None,
        }
    }

    fn scores(&self) -> [i64; 2] {
        self.score
    }

    fn snapshot_for(&self, side: Side) -> TransferState {
        let own = &self.units[side.index()];
        let enemy = &self.units[side.opponent().index()];
        TransferState {
            terrain: self.terrain,
            own_warriors: pack_kind(own, UnitKind::Warrior),
            own_miners: pack_kind(own, UnitKind::Miner),
            enemy_warriors: pack_kind(enemy, UnitKind::Warrior),
            enemy_miners: pack_kind(enemy, UnitKind::Miner),
            mines: MineArray::from_points(&self.mines),
            score: self.score[side.index()],
            currency: self.currency[side.index()],
            orders: crate::transfer::OrderArray::new(),
        }
    }
}

/// Pack one kind's units into a fixed array, truncating deterministically.
fn pack_kind(units: &[Unit], kind: UnitKind) -> UnitArray {
    let entries: Vec<_> = units
        .iter()
        .filter(|u| u.kind == kind)
        .map(|u| u.to_entry())
        .collect();
    UnitArray::from_entries(&entries)
}
