//! Order Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for the order aggregate
//! - Deterministic fixtures for common scenarios
//! - Assertions for order-specific checks

pub use order_core::{Delivery, Item, Order, OrderMap, Payment, StorageError, Timestamp};

use chrono::{DateTime, Utc};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating order aggregates.

    use super::*;
    use proptest::prelude::*;

    /// Generate an order identifier. Never blank.
    pub fn arb_order_uid() -> impl Strategy<Value = String> {
        "[a-z0-9]{4,20}"
    }

    /// Generate free text that is safe for Postgres `TEXT` (no NUL bytes).
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 @+.\\-]{0,24}"
    }

    /// Generate a Timestamp with whole-second precision (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
            arb_text(),
        )
            .prop_map(|(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            })
    }

    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (
            (arb_text(), arb_text(), "[A-Z]{3}", arb_text(), arb_text()),
            (
                0..1_000_000i64,
                1577836800i64..1893456000i64,
                0..100_000i64,
                0..1_000_000i64,
                0..10_000i64,
            ),
        )
            .prop_map(
                |(
                    (transaction, request_id, currency, provider, bank),
                    (amount, payment_dt, delivery_cost, goods_total, custom_fee),
                )| Payment {
                    transaction,
                    request_id,
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                },
            )
    }

    pub fn arb_item() -> impl Strategy<Value = Item> {
        (
            (any::<u32>(), arb_text(), 0..100_000i64, arb_text(), arb_text()),
            (0..100i32, arb_text(), 0..100_000i64, any::<u32>(), arb_text(), 0..1000i32),
        )
            .prop_map(
                |(
                    (chrt_id, track_number, price, rid, name),
                    (sale, size, total_price, nm_id, brand, status),
                )| Item {
                    chrt_id: i64::from(chrt_id),
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id: i64::from(nm_id),
                    brand,
                    status,
                },
            )
    }

    pub fn arb_items() -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec(arb_item(), 0..5)
    }

    /// Generate a complete order with the given identifier.
    pub fn arb_order_with_uid(order_uid: String) -> impl Strategy<Value = Order> {
        (
            (arb_text(), arb_text(), "[a-z]{2}", arb_text(), arb_text()),
            (arb_text(), "[0-9]{1,2}", 0..1000i32, arb_timestamp(), "[0-9]{1,2}"),
            arb_delivery(),
            arb_payment(),
            arb_items(),
        )
            .prop_map(
                move |(
                    (track_number, entry, locale, internal_signature, customer_id),
                    (delivery_service, shardkey, sm_id, date_created, oof_shard),
                    delivery,
                    payment,
                    items,
                )| Order {
                    order_uid: order_uid.clone(),
                    track_number,
                    entry,
                    delivery,
                    payment,
                    items,
                    locale,
                    internal_signature,
                    customer_id,
                    delivery_service,
                    shardkey,
                    sm_id,
                    date_created,
                    oof_shard,
                },
            )
    }

    /// Generate a complete order with a random identifier.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        arb_order_uid().prop_flat_map(arb_order_with_uid)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Deterministic fixtures. Calling a fixture twice yields equal values.

    use super::*;

    /// 2021-11-26T06:22:19Z
    pub fn fixed_timestamp() -> Timestamp {
        DateTime::from_timestamp(1637907739, 0).unwrap_or_default()
    }

    /// Item whose fields are derived from `n`.
    pub fn sample_item(n: i64) -> Item {
        Item {
            chrt_id: 9934930 + n,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453 + n,
            rid: format!("ab4219087a764ae0btest-{n}"),
            name: format!("Item {n}"),
            sale: 30,
            size: "0".to_string(),
            total_price: 317 + n,
            nm_id: 2389212 + n,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }
    }

    /// Fully populated order with a single item.
    pub fn sample_order(order_uid: &str) -> Order {
        Order {
            order_uid: order_uid.to_string(),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                phone: "+9720000000".to_string(),
                zip: "2639809".to_string(),
                city: "Kiryat Mozkin".to_string(),
                address: "Ploshad Mira 15".to_string(),
                region: "Kraiot".to_string(),
                email: "test@gmail.com".to_string(),
            },
            payment: Payment {
                transaction: order_uid.to_string(),
                request_id: String::new(),
                currency: "USD".to_string(),
                provider: "wbpay".to_string(),
                amount: 1817,
                payment_dt: 1637907727,
                bank: "alpha".to_string(),
                delivery_cost: 1500,
                goods_total: 317,
                custom_fee: 0,
            },
            items: vec![sample_item(0)],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: fixed_timestamp(),
            oof_shard: "1".to_string(),
        }
    }

    /// JSON message body for an order, as a publisher would send it.
    pub fn order_payload(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap_or_default()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for order-specific validation.

    use super::*;

    /// Assert that two maps hold the same aggregates for the same keys.
    #[track_caller]
    pub fn assert_same_orders(left: &OrderMap, right: &OrderMap) {
        assert_eq!(left.len(), right.len(), "order counts differ");
        for (id, order) in left {
            match right.get(id) {
                Some(other) => assert_eq!(order, other, "aggregate {id} differs"),
                None => panic!("order {id} missing from right-hand map"),
            }
        }
    }

    /// Assert that a storage result failed.
    #[track_caller]
    pub fn assert_storage_err<T: std::fmt::Debug>(result: &Result<T, StorageError>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::generators::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_is_deterministic() {
        assert_eq!(sample_order("o1"), sample_order("o1"));
        assert_eq!(sample_order("o1").items.len(), 1);
    }

    #[test]
    fn test_payload_decodes_back() {
        let order = sample_order("o1");
        let decoded = order_core::Order::from_json(&order_payload(&order)).unwrap();
        assert_eq!(decoded, order);
    }

    proptest! {
        #[test]
        fn prop_generated_orders_are_valid(order in arb_order()) {
            prop_assert!(order.validate().is_ok());
            prop_assert!(order.items.len() < 5);
        }
    }
}
