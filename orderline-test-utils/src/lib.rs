//! orderline Test Utilities
//!
//! Shared test infrastructure for the orderline workspace:
//! - Proptest generators for order records
//! - Fixtures for common scenarios
//! - Assertions for storage outcomes

// Re-export the in-memory store from its source crate
pub use orderline_storage::{MemoryOrderStore, OrderCache, OrderStore};

// Re-export core types for convenience
pub use orderline_core::{
    Delivery, Item, Order, Payment, StorageError, SubEntity, Timestamp, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for order records.
    //!
    //! Generated orders always pass validation unless a generator says
    //! otherwise.

    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    /// Generate a non-empty order id.
    pub fn arb_order_uid() -> impl Strategy<Value = String> {
        "[a-z0-9]{8,20}"
    }

    /// Generate a whole-second timestamp (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| Timestamp::from_timestamp(secs, 0).unwrap_or_default())
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 +@.-]{0,24}"
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

    /// Generate a payment with a non-empty transaction id.
    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (
            "[a-z0-9]{4,20}",
            arb_text(),
            "[A-Z]{3}",
            arb_text(),
            0i64..1_000_000,
            arb_timestamp().prop_map(|ts| ts.timestamp()),
            arb_text(),
            0i64..10_000,
            0i64..1_000_000,
            0i64..1_000,
        )
            .prop_map(
                |(
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
            0i64..100_000_000,
            arb_text(),
            0i64..100_000,
            arb_text(),
            arb_text(),
            0i64..100,
            "[0-9]{1,2}",
            0i64..100_000,
            0i64..100_000_000,
            arb_text(),
            0i64..1_000,
        )
            .prop_map(
                |(chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status)| {
                    Item {
                        chrt_id,
                        track_number,
                        price,
                        rid,
                        name,
                        sale,
                        size,
                        total_price,
                        nm_id,
                        brand,
                        status,
                    }
                },
            )
    }

    /// Generate a valid order with up to `max_items` line items.
    pub fn arb_order_with_items(max_items: usize) -> impl Strategy<Value = Order> {
        (
            (
                arb_order_uid(),
                arb_text(),
                arb_text(),
                arb_delivery(),
                arb_payment(),
                vec(arb_item(), 0..=max_items),
            ),
            (
                "[a-z]{2}",
                arb_text(),
                arb_text(),
                arb_text(),
                "[0-9]{1,2}",
                0i64..1_000,
                proptest::option::of(arb_timestamp()),
                "[0-9]{1,2}",
            ),
        )
            .prop_map(
                |(
                    (order_uid, track_number, entry, delivery, payment, items),
                    (
                        locale,
                        internal_signature,
                        customer_id,
                        delivery_service,
                        shardkey,
                        sm_id,
                        date_created,
                        oof_shard,
                    ),
                )| Order {
                    order_uid,
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

    /// Generate a valid order.
    pub fn arb_order() -> impl Strategy<Value = Order> {
        arb_order_with_items(5)
    }

    /// Generate an order that fails validation.
    pub fn arb_invalid_order() -> impl Strategy<Value = Order> {
        (arb_order(), any::<bool>()).prop_map(|(mut order, drop_uid)| {
            if drop_uid {
                order.order_uid.clear();
            } else {
                order.payment.transaction.clear();
            }
            order
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built order records.

    use super::*;
    use chrono::TimeZone;

    /// Wire form of [`sample_order`].
    pub const SAMPLE_ORDER_JSON: &str = r#"{
        "order_uid": "b563feb7b2b84b6test",
        "track_number": "WBILMTESTTRACK",
        "entry": "WBIL",
        "delivery": {
            "name": "Test Testov",
            "phone": "+9720000000",
            "zip": "2639809",
            "city": "Kiryat Mozkin",
            "address": "Ploshad Mira 15",
            "region": "Kraiot",
            "email": "test@gmail.com"
        },
        "payment": {
            "transaction": "b563feb7b2b84b6test",
            "request_id": "",
            "currency": "USD",
            "provider": "wbpay",
            "amount": 1817,
            "payment_dt": 1637907727,
            "bank": "alpha",
            "delivery_cost": 1500,
            "goods_total": 317,
            "custom_fee": 0
        },
        "items": [
            {
                "chrt_id": 9934930,
                "track_number": "WBILMTESTTRACK",
                "price": 453,
                "rid": "ab4219087a764ae0btest",
                "name": "Mascaras",
                "sale": 30,
                "size": "0",
                "total_price": 317,
                "nm_id": 2389212,
                "brand": "Vivienne Sabo",
                "status": 202
            }
        ],
        "locale": "en",
        "internal_signature": "",
        "customer_id": "test",
        "delivery_service": "meest",
        "shardkey": "9",
        "sm_id": 99,
        "date_created": "2021-11-26T06:22:19Z",
        "oof_shard": "1"
    }"#;

    /// A complete order with one line item.
    pub fn sample_order() -> Order {
        Order {
            order_uid: "b563feb7b2b84b6test".to_string(),
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
                transaction: "b563feb7b2b84b6test".to_string(),
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
            items: vec![sample_item()],
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: chrono::Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).single(),
            oof_shard: "1".to_string(),
        }
    }

    pub fn sample_item() -> Item {
        Item {
            chrt_id: 9934930,
            track_number: "WBILMTESTTRACK".to_string(),
            price: 453,
            rid: "ab4219087a764ae0btest".to_string(),
            name: "Mascaras".to_string(),
            sale: 30,
            size: "0".to_string(),
            total_price: 317,
            nm_id: 2389212,
            brand: "Vivienne Sabo".to_string(),
            status: 202,
        }
    }

    /// [`sample_order`] under another id.
    pub fn order_with_uid(order_uid: &str) -> Order {
        let mut order = sample_order();
        order.order_uid = order_uid.to_string();
        order.payment.transaction = order_uid.to_string();
        order
    }

    /// An order with `count` distinct line items, in chrt_id order.
    pub fn order_with_items(order_uid: &str, count: usize) -> Order {
        let mut order = order_with_uid(order_uid);
        order.items = (0..count)
            .map(|i| Item {
                chrt_id: i as i64 + 1,
                rid: format!("{}-rid-{}", order_uid, i),
                name: format!("item {}", i),
                ..sample_item()
            })
            .collect();
        order
    }

    /// Wire bytes for `order`.
    pub fn to_wire(order: &Order) -> Vec<u8> {
        serde_json::to_vec(order).unwrap_or_default()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for storage outcomes.

    use super::*;

    /// Assert that a lookup reported the order as absent.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &Result<T, StorageError>) {
        match result {
            Err(StorageError::NotFound { .. }) => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    /// Assert that an operation failed on the given part of the record.
    #[track_caller]
    pub fn assert_persistence_error<T: std::fmt::Debug>(
        result: &Result<T, StorageError>,
        entity: SubEntity,
    ) {
        match result {
            Err(StorageError::Persistence { entity: got, .. }) => {
                assert_eq!(*got, entity, "Wrong sub-entity in persistence error");
            }
            other => panic!("Expected persistence error on {}, got: {:?}", entity, other),
        }
    }
}
