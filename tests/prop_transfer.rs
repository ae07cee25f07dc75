//! Property-based tests for the transfer-state codec.
//!
//! The codec is the trust boundary between rich world state and raw shared
//! memory: these properties pin down exact round-tripping within capacity,
//! deterministic truncation above it, and total decoding of arbitrary
//! bytes.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use arbiter::transfer::{
    MAX_MINES, MAX_ORDERS, MAX_UNITS, MineArray, Order, OrderArray, TransferState,
    UnitArray, UnitEntry, UnitKind, wire,
};

fn arb_unit() -> impl Strategy<Value = UnitEntry> {
    (any::<u32>(), any::<i16>(), any::<i16>(), any::<i32>())
        .prop_map(|(id, x, y, hp)| UnitEntry { id, x, y, hp })
}

fn arb_order() -> impl Strategy<Value = Order> {
    prop_oneof![
        (any::<u32>(), any::<i16>(), any::<i16>())
            .prop_map(|(unit, x, y)| Order::Move { unit, to: (x, y) }),
        (any::<bool>(), any::<i16>(), any::<i16>()).prop_map(|(miner, x, y)| {
            let kind = if miner { UnitKind::Miner } else { UnitKind::Warrior };
            Order::Recruit { kind, at: (x, y) }
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Within capacity, pack then encode/decode reproduces identities,
    /// positions, and counts exactly.
    #[test]
    fn prop_snapshot_round_trip_within_capacity(
        own_warriors in prop::collection::vec(arb_unit(), 0..=MAX_UNITS),
        enemy_miners in prop::collection::vec(arb_unit(), 0..=MAX_UNITS),
        mines in prop::collection::vec((any::<i16>(), any::<i16>()), 0..=MAX_MINES),
        orders in prop::collection::vec(arb_order(), 0..=MAX_ORDERS),
        score in any::<i64>(),
        currency in any::<i64>(),
    ) {
        let state = TransferState {
            own_warriors: UnitArray::from_entries(&own_warriors),
            enemy_miners: UnitArray::from_entries(&enemy_miners),
            mines: MineArray::from_points(&mines),
            orders: OrderArray::from_orders(&orders),
            score,
            currency,
            ..TransferState::default()
        };

        prop_assert_eq!(state.own_warriors.as_slice(), own_warriors.as_slice());
        prop_assert_eq!(state.mines.as_slice(), mines.as_slice());
        prop_assert_eq!(state.orders.as_slice(), orders.as_slice());

        let mut buf = vec![0u8; wire::SNAPSHOT_BYTES];
        state.encode(&mut buf);
        let decoded = TransferState::decode(&buf);
        prop_assert_eq!(decoded, state);
    }

    /// Above capacity, packing keeps exactly the first `MAX_*` entries in
    /// input order and silently drops the rest.
    #[test]
    fn prop_overflow_truncates_deterministically(
        units in prop::collection::vec(arb_unit(), MAX_UNITS..MAX_UNITS + 40),
        orders in prop::collection::vec(arb_order(), MAX_ORDERS..MAX_ORDERS + 40),
    ) {
        let packed = UnitArray::from_entries(&units);
        prop_assert_eq!(packed.len(), MAX_UNITS);
        prop_assert_eq!(packed.as_slice(), &units[..MAX_UNITS]);

        let packed = OrderArray::from_orders(&orders);
        prop_assert_eq!(packed.len(), MAX_ORDERS);
        prop_assert_eq!(packed.as_slice(), &orders[..MAX_ORDERS]);
    }

    /// Decoding arbitrary bytes never panics and never produces counts
    /// above capacity.
    #[test]
    fn prop_decode_is_total(buf in prop::collection::vec(any::<u8>(), wire::SNAPSHOT_BYTES)) {
        let decoded = TransferState::decode(&buf);
        prop_assert!(decoded.own_warriors.len() <= MAX_UNITS);
        prop_assert!(decoded.own_miners.len() <= MAX_UNITS);
        prop_assert!(decoded.enemy_warriors.len() <= MAX_UNITS);
        prop_assert!(decoded.enemy_miners.len() <= MAX_UNITS);
        prop_assert!(decoded.mines.len() <= MAX_MINES);
        prop_assert!(decoded.orders.len() <= MAX_ORDERS);
    }

    /// Decoding anything the encoder produced is stable: a second
    /// encode/decode cycle is the identity.
    #[test]
    fn prop_reencode_is_identity(buf in prop::collection::vec(any::<u8>(), wire::SNAPSHOT_BYTES)) {
        let once = TransferState::decode(&buf);
        let mut clean = vec![0u8; wire::SNAPSHOT_BYTES];
        once.encode(&mut clean);
        let twice = TransferState::decode(&clean);
        prop_assert_eq!(twice, once);
    }
}
