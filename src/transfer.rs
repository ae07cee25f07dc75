//! Fixed-capacity transfer state and its wire layout.
//!
//! The snapshot that crosses a channel is raw shared memory with no
//! allocator, so every collection is an array plus a count and every field
//! lives at a fixed offset. Serialization uses explicit
//! `to_le_bytes`/`from_le_bytes` at computed offsets; only the three header
//! words (`running`, `halted`, `instruction_count`) are accessed as atomics.
//!
//! Conversions from the rich world-facing representation are total: when a
//! collection exceeds its declared capacity the packers keep the first
//! entries in input order and drop the rest, never panicking. Decoders clamp
//! counts to capacity, so a corrupt count can never index out of bounds.

/// Side length of the square terrain grid.
pub const MAP_SIZE: usize = 32;
/// Capacity of each per-kind unit array.
pub const MAX_UNITS: usize = 32;
/// Capacity of the gold-mine location array.
pub const MAX_MINES: usize = 16;
/// Capacity of the per-turn order buffer.
pub const MAX_ORDERS: usize = 32;

/// Wire-format offsets and sizes for a channel region.
///
/// Header (atomics, 8-byte aligned where needed), then the snapshot bytes.
pub mod wire {
    use super::{MAP_SIZE, MAX_MINES, MAX_ORDERS, MAX_UNITS};

    /// Magic bytes identifying a channel region (`"ARBCHAN\0"`).
    pub const MAGIC: [u8; 8] = *b"ARBCHAN\0";
    /// Layout version (`u32`).
    pub const VERSION: u32 = 1;

    /// Offset of the magic bytes.
    pub const MAGIC_OFF: usize = 0;
    /// Offset of the layout version (`u32`).
    pub const VERSION_OFF: usize = 8;
    /// Offset of the turn-grant flag (`u32` used as bool, atomic).
    pub const RUNNING_OFF: usize = 12;
    /// Offset of the match-over flag (`u32` used as bool, atomic).
    pub const HALTED_OFF: usize = 16;
    /// Offset of the cumulative instruction counter (`u64`, atomic).
    pub const INSTRUCTIONS_OFF: usize = 24;
    /// Offset of the snapshot payload.
    pub const SNAPSHOT_OFF: usize = 32;

    /// Encoded size of one unit entry: `id u32, x i16, y i16, hp i32`.
    pub const UNIT_BYTES: usize = 12;
    /// Encoded size of one order entry: `unit u32, op u8, kind u8, x i16,
    /// y i16, pad u16`.
    pub const ORDER_BYTES: usize = 12;
    /// Encoded size of one mine location: `x i16, y i16`.
    pub const MINE_BYTES: usize = 4;

    /// `count u32` plus entries.
    pub const UNIT_BLOCK: usize = 4 + MAX_UNITS * UNIT_BYTES;
    /// `count u32` plus entries.
    pub const MINE_BLOCK: usize = 4 + MAX_MINES * MINE_BYTES;
    /// `count u32` plus entries.
    pub const ORDER_BLOCK: usize = 4 + MAX_ORDERS * ORDER_BYTES;

    // Snapshot-relative offsets.
    /// Terrain grid, one byte per cell, row-major.
    pub const TERRAIN: usize = 0;
    /// Terrain grid size in bytes.
    pub const TERRAIN_LEN: usize = MAP_SIZE * MAP_SIZE;
    /// Competitor-visible score (`i64`).
    pub const SCORE: usize = TERRAIN + TERRAIN_LEN;
    /// Currency balance (`i64`).
    pub const CURRENCY: usize = SCORE + 8;
    /// Own warriors block.
    pub const OWN_WARRIORS: usize = CURRENCY + 8;
    /// Own miners block.
    pub const OWN_MINERS: usize = OWN_WARRIORS + UNIT_BLOCK;
    /// Enemy warriors block.
    pub const ENEMY_WARRIORS: usize = OWN_MINERS + UNIT_BLOCK;
    /// Enemy miners block.
    pub const ENEMY_MINERS: usize = ENEMY_WARRIORS + UNIT_BLOCK;
    /// Gold-mine locations block.
    pub const MINES: usize = ENEMY_MINERS + UNIT_BLOCK;
    /// Order buffer block (written by the competitor).
    pub const ORDERS: usize = MINES + MINE_BLOCK;
    /// Total snapshot size in bytes.
    pub const SNAPSHOT_BYTES: usize = ORDERS + ORDER_BLOCK;
    /// Total region size in bytes.
    pub const REGION_BYTES: usize = SNAPSHOT_OFF + SNAPSHOT_BYTES;
}

/// Terrain of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Terrain {
    /// Passable open ground.
    #[default]
    Plains = 0,
    /// Passable cover.
    Forest = 1,
    /// Impassable water.
    Water = 2,
    /// Impassable rock.
    Mountain = 3,
}

impl Terrain {
    /// Decode a wire byte. Total: unknown bytes decode as [`Terrain::Plains`].
    #[must_use]
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            1 => Self::Forest,
            2 => Self::Water,
            3 => Self::Mountain,
            _ => Self::Plains,
        }
    }
}

/// The two unit kinds the transfer state distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnitKind {
    /// Fights enemy units.
    Warrior = 0,
    /// Extracts currency from gold mines.
    Miner = 1,
}

/// One unit as it appears in a snapshot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitEntry {
    /// Stable identity across turns.
    pub id: u32,
    /// Grid x coordinate.
    pub x: i16,
    /// Grid y coordinate.
    pub y: i16,
    /// Remaining hit points.
    pub hp: i32,
}

/// A fixed-capacity unit array with a declared count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitArray {
    entries: [UnitEntry; MAX_UNITS],
    len: usize,
}

impl UnitArray {
    /// Empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack a slice, keeping the first [`MAX_UNITS`] entries in input order
    /// and dropping the rest.
    #[must_use]
    pub fn from_entries(entries: &[UnitEntry]) -> Self {
        let mut array = Self::new();
        for entry in entries {
            if !array.push(*entry) {
                break;
            }
        }
        array
    }

    /// Append one entry; returns false (and drops it) when full.
    pub fn push(&mut self, entry: UnitEntry) -> bool {
        if self.len >= MAX_UNITS {
            return false;
        }
        self.entries[self.len] = entry;
        self.len += 1;
        true
    }

    /// The declared entries.
    #[must_use]
    pub fn as_slice(&self) -> &[UnitEntry] {
        &self.entries[..self.len]
    }

    /// Declared count, never above [`MAX_UNITS`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A fixed-capacity gold-mine location array with a declared count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MineArray {
    entries: [(i16, i16); MAX_MINES],
    len: usize,
}

impl MineArray {
    /// Empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack a slice, truncating past [`MAX_MINES`] in input order.
    #[must_use]
    pub fn from_points(points: &[(i16, i16)]) -> Self {
        let mut array = Self::new();
        for point in points {
            if !array.push(*point) {
                break;
            }
        }
        array
    }

    /// Append one location; returns false (and drops it) when full.
    pub fn push(&mut self, point: (i16, i16)) -> bool {
        if self.len >= MAX_MINES {
            return false;
        }
        self.entries[self.len] = point;
        self.len += 1;
        true
    }

    /// The declared locations.
    #[must_use]
    pub fn as_slice(&self) -> &[(i16, i16)] {
        &self.entries[..self.len]
    }

    /// Declared count, never above [`MAX_MINES`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One move intent a competitor submits for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Move the identified own unit toward a grid cell.
    Move {
        /// Id of the unit to move.
        unit: u32,
        /// Destination cell.
        to: (i16, i16),
    },
    /// Spend currency to place a new unit at a grid cell.
    Recruit {
        /// Kind of unit to recruit.
        kind: UnitKind,
        /// Placement cell.
        at: (i16, i16),
    },
}

// Slots past `len` are padding; the filler value is never observed.
const ORDER_FILL: Order = Order::Move { unit: 0, to: (0, 0) };

/// The fixed-capacity order buffer a competitor fills in during its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderArray {
    entries: [Order; MAX_ORDERS],
    len: usize,
}

impl Default for OrderArray {
    fn default() -> Self {
        Self {
            entries: [ORDER_FILL; MAX_ORDERS],
            len: 0,
        }
    }
}

impl OrderArray {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack a slice, truncating past [`MAX_ORDERS`] in input order.
    #[must_use]
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut array = Self::new();
        for order in orders {
            if !array.push(*order) {
                break;
            }
        }
        array
    }

    /// Append one order; returns false (and drops it) when full.
    pub fn push(&mut self, order: Order) -> bool {
        if self.len >= MAX_ORDERS {
            return false;
        }
        self.entries[self.len] = order;
        self.len += 1;
        true
    }

    /// The declared orders.
    #[must_use]
    pub fn as_slice(&self) -> &[Order] {
        &self.entries[..self.len]
    }

    /// Declared count, never above [`MAX_ORDERS`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The fixed-capacity, competitor-visible mirror of world state.
///
/// The orchestrator writes everything except `orders`; the competitor writes
/// `orders` during its turn. Both directions travel through the same region,
/// alternating under the `running` handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    /// Terrain grid, row-major `[y][x]`.
    pub terrain: [[Terrain; MAP_SIZE]; MAP_SIZE],
    /// This competitor's warriors.
    pub own_warriors: UnitArray,
    /// This competitor's miners.
    pub own_miners: UnitArray,
    /// The opponent's visible warriors.
    pub enemy_warriors: UnitArray,
    /// The opponent's visible miners.
    pub enemy_miners: UnitArray,
    /// Gold-mine locations.
    pub mines: MineArray,
    /// This competitor's score.
    pub score: i64,
    /// This competitor's currency balance.
    pub currency: i64,
    /// Orders submitted for the current turn.
    pub orders: OrderArray,
}

impl Default for TransferState {
    fn default() -> Self {
        Self {
            terrain: [[Terrain::Plains; MAP_SIZE]; MAP_SIZE],
            own_warriors: UnitArray::new(),
            own_miners: UnitArray::new(),
            enemy_warriors: UnitArray::new(),
            enemy_miners: UnitArray::new(),
            mines: MineArray::new(),
            score: 0,
            currency: 0,
            orders: OrderArray::new(),
        }
    }
}

impl TransferState {
    /// Encode into a snapshot-sized buffer.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is not exactly [`wire::SNAPSHOT_BYTES`] long; the
    /// channel layer always passes a correctly sized buffer.
    pub fn encode(&self, buf: &mut [u8]) {
        assert_eq!(buf.len(), wire::SNAPSHOT_BYTES);

        for (y, row) in self.terrain.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                buf[wire::TERRAIN + y * MAP_SIZE + x] = *cell as u8;
            }
        }
        put_i64(buf, wire::SCORE, self.score);
        put_i64(buf, wire::CURRENCY, self.currency);
        encode_units(buf, wire::OWN_WARRIORS, &self.own_warriors);
        encode_units(buf, wire::OWN_MINERS, &self.own_miners);
        encode_units(buf, wire::ENEMY_WARRIORS, &self.enemy_warriors);
        encode_units(buf, wire::ENEMY_MINERS, &self.enemy_miners);
        encode_mines(buf, wire::MINES, &self.mines);
        encode_orders(buf, wire::ORDERS, &self.orders);
    }

    /// Decode from a snapshot-sized buffer.
    ///
    /// Total: counts are clamped to capacity, unknown terrain bytes decode
    /// as plains, and order entries with an unknown opcode are dropped.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is not exactly [`wire::SNAPSHOT_BYTES`] long.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        assert_eq!(buf.len(), wire::SNAPSHOT_BYTES);

        let mut terrain = [[Terrain::Plains; MAP_SIZE]; MAP_SIZE];
        for (y, row) in terrain.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = Terrain::from_wire(buf[wire::TERRAIN + y * MAP_SIZE + x]);
            }
        }

        Self {
            terrain,
            own_warriors: decode_units(buf, wire::OWN_WARRIORS),
            own_miners: decode_units(buf, wire::OWN_MINERS),
            enemy_warriors: decode_units(buf, wire::ENEMY_WARRIORS),
            enemy_miners: decode_units(buf, wire::ENEMY_MINERS),
            mines: decode_mines(buf, wire::MINES),
            score: get_i64(buf, wire::SCORE),
            currency: get_i64(buf, wire::CURRENCY),
            orders: decode_orders(buf, wire::ORDERS),
        }
    }
}

fn encode_units(buf: &mut [u8], off: usize, units: &UnitArray) {
    put_count(buf, off, units.len());
    for (i, unit) in units.as_slice().iter().enumerate() {
        let base = off + 4 + i * wire::UNIT_BYTES;
        put_u32(buf, base, unit.id);
        put_i16(buf, base + 4, unit.x);
        put_i16(buf, base + 6, unit.y);
        put_i32(buf, base + 8, unit.hp);
    }
}

fn decode_units(buf: &[u8], off: usize) -> UnitArray {
    let count = clamp_count(get_u32(buf, off), MAX_UNITS);
    let mut units = UnitArray::new();
    for i in 0..count {
        let base = off + 4 + i * wire::UNIT_BYTES;
        units.push(UnitEntry {
            id: get_u32(buf, base),
            x: get_i16(buf, base + 4),
            y: get_i16(buf, base + 6),
            hp: get_i32(buf, base + 8),
        });
    }
    units
}

fn encode_mines(buf: &mut [u8], off: usize, mines: &MineArray) {
    put_count(buf, off, mines.len());
    for (i, (x, y)) in mines.as_slice().iter().enumerate() {
        let base = off + 4 + i * wire::MINE_BYTES;
        put_i16(buf, base, *x);
        put_i16(buf, base + 2, *y);
    }
}

fn decode_mines(buf: &[u8], off: usize) -> MineArray {
    let count = clamp_count(get_u32(buf, off), MAX_MINES);
    let mut mines = MineArray::new();
    for i in 0..count {
        let base = off + 4 + i * wire::MINE_BYTES;
        mines.push((get_i16(buf, base), get_i16(buf, base + 2)));
    }
    mines
}

// Order opcodes on the wire.
const OP_MOVE: u8 = 1;
const OP_RECRUIT: u8 = 2;

fn encode_orders(buf: &mut [u8], off: usize, orders: &OrderArray) {
    put_count(buf, off, orders.len());
    for (i, order) in orders.as_slice().iter().enumerate() {
        let base = off + 4 + i * wire::ORDER_BYTES;
        match order {
            Order::Move { unit, to } => {
                put_u32(buf, base, *unit);
                buf[base + 4] = OP_MOVE;
                buf[base + 5] = 0;
                put_i16(buf, base + 6, to.0);
                put_i16(buf, base + 8, to.1);
            }
            Order::Recruit { kind, at } => {
                put_u32(buf, base, 0);
                buf[base + 4] = OP_RECRUIT;
                buf[base + 5] = *kind as u8;
                put_i16(buf, base + 6, at.0);
                put_i16(buf, base + 8, at.1);
            }
        }
        put_i16(buf, base + 10, 0);
    }
}

fn decode_orders(buf: &[u8], off: usize) -> OrderArray {
    let count = clamp_count(get_u32(buf, off), MAX_ORDERS);
    let mut orders = OrderArray::new();
    for i in 0..count {
        let base = off + 4 + i * wire::ORDER_BYTES;
        let to = (get_i16(buf, base + 6), get_i16(buf, base + 8));
        match buf[base + 4] {
            OP_MOVE => {
                orders.push(Order::Move { unit: get_u32(buf, base), to });
            }
            OP_RECRUIT => {
                let kind = if buf[base + 5] == UnitKind::Miner as u8 {
                    UnitKind::Miner
                } else {
                    UnitKind::Warrior
                };
                orders.push(Order::Recruit { kind, at: to });
            }
            // Unknown opcode: drop the entry.
            _ => {}
        }
    }
    orders
}

fn clamp_count(count: u32, cap: usize) -> usize {
    usize::try_from(count).map_or(cap, |count| count.min(cap))
}

// Counts are bounded by the array capacities, all far below u32::MAX.
fn put_count(buf: &mut [u8], off: usize, count: usize) {
    put_u32(buf, off, u32::try_from(count).unwrap_or(u32::MAX));
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(bytes)
}

fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_i32(buf: &[u8], off: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    i32::from_le_bytes(bytes)
}

fn put_i16(buf: &mut [u8], off: usize, v: i16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn get_i16(buf: &[u8], off: usize) -> i16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&buf[off..off + 2]);
    i16::from_le_bytes(bytes)
}

fn put_i64(buf: &mut [u8], off: usize, v: i64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

fn get_i64(buf: &[u8], off: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    i64::from_le_bytes(bytes)
}
