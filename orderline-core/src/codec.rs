//! Wire codec for order records.
//!
//! The stream and the read API both carry orders as JSON with `date_created`
//! as an RFC3339 string. In memory the timestamp is a [`Timestamp`] truncated
//! to whole seconds, so a decoded record, its stored copy and its cached copy
//! compare equal.

use crate::{DecodeError, Order, Timestamp};
use serde::{Deserialize, Deserializer};

/// Decode a message body into an order record.
///
/// A bare `null` body decodes to an empty record, which validation rejects.
pub fn decode(bytes: &[u8]) -> Result<Order, DecodeError> {
    let order: Option<Order> = serde_json::from_slice(bytes)?;
    Ok(order.unwrap_or_default())
}

/// Encode an order record into its wire representation.
pub fn encode(order: &Order) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(order)
}

/// Drop sub-second precision from a timestamp.
pub fn truncate_to_seconds(ts: Timestamp) -> Timestamp {
    Timestamp::from_timestamp(ts.timestamp(), 0).unwrap_or(ts)
}

/// Field deserializer treating an explicit `null` like an absent field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Serde adapter for `Option<Timestamp>` as an RFC3339 string with second precision.
///
/// `None` encodes as the zero time `0001-01-01T00:00:00Z`. An absent, `null`
/// or empty value, or the zero time itself, decodes to `None`.
pub mod rfc3339_seconds {
    use super::truncate_to_seconds;
    use crate::Timestamp;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

    /// Unix seconds of [`ZERO_TIME`].
    const ZERO_TIME_SECS: i64 = -62_135_596_800;

    pub fn serialize<S>(value: &Option<Timestamp>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => serializer.serialize_str(ZERO_TIME),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => {
                let ts = DateTime::parse_from_rfc3339(s)
                    .map(|dt| truncate_to_seconds(dt.with_timezone(&Utc)))
                    .map_err(|e| de::Error::custom(format!("date_created: {}", e)))?;
                Ok((ts.timestamp() != ZERO_TIME_SECS).then_some(ts))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const SAMPLE: &str = r#"{
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

    #[test]
    fn test_decode_sample_order() {
        let order = decode(SAMPLE.as_bytes()).unwrap();
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].brand, "Vivienne Sabo");
        assert_eq!(
            order.date_created,
            Some(Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap())
        );
    }

    #[test]
    fn test_encode_renders_rfc3339_seconds() {
        let order = decode(SAMPLE.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&encode(&order).unwrap()).unwrap();
        assert_eq!(json["date_created"], "2021-11-26T06:22:19Z");
        assert_eq!(json["items"][0]["chrt_id"], 9934930);
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let order = decode(br#"{"date_created":"2024-03-01T10:00:00.987654+03:00"}"#).unwrap();
        assert_eq!(
            order.date_created,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_empty_or_missing_date_is_none() {
        assert_eq!(decode(br#"{"date_created":""}"#).unwrap().date_created, None);
        assert_eq!(decode(br#"{"date_created":null}"#).unwrap().date_created, None);
        assert_eq!(decode(b"{}").unwrap().date_created, None);
    }

    #[test]
    fn test_missing_date_encodes_as_zero_time() {
        let json: serde_json::Value =
            serde_json::from_slice(&encode(&Order::default()).unwrap()).unwrap();
        assert_eq!(json["date_created"], rfc3339_seconds::ZERO_TIME);
        assert_eq!(
            decode(br#"{"date_created":"0001-01-01T00:00:00Z"}"#).unwrap().date_created,
            None
        );
    }

    #[test]
    fn test_null_items_decode_as_empty() {
        let order =
            decode(br#"{"order_uid":"n1","payment":{"transaction":"n1"},"items":null}"#).unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.validate(), Ok(()));
    }

    #[test]
    fn test_null_fields_decode_as_defaults() {
        let order = decode(
            br#"{
                "order_uid": "n2",
                "track_number": null,
                "delivery": null,
                "payment": {"transaction": "n2", "amount": null, "bank": null},
                "items": [{"chrt_id": null, "name": null, "price": 10}],
                "sm_id": null
            }"#,
        )
        .unwrap();
        assert!(order.track_number.is_empty());
        assert_eq!(order.delivery, crate::Delivery::default());
        assert_eq!(order.payment.amount, 0);
        assert_eq!(order.items[0].chrt_id, 0);
        assert_eq!(order.items[0].price, 10);
        assert_eq!(order.sm_id, 0);
    }

    #[test]
    fn test_null_uid_decodes_and_fails_validation() {
        let order = decode(br#"{"order_uid":null,"payment":{"transaction":"t"}}"#).unwrap();
        assert!(order.order_uid.is_empty());
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_null_body_decodes_to_empty_order() {
        assert_eq!(decode(b"null").unwrap(), Order::default());
        assert!(decode(b" null ").unwrap().validate().is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let order = decode(br#"{"track_number":"T1"}"#).unwrap();
        assert!(order.order_uid.is_empty());
        assert!(order.items.is_empty());
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_malformed_payloads_fail() {
        assert!(decode(b"not json").is_err());
        assert!(decode(br#"{"date_created":"yesterday"}"#).is_err());
        assert!(decode(br#"{"items":{"chrt_id":1}}"#).is_err());
        assert!(decode(br#"{"payment":{"amount":"ten"}}"#).is_err());
    }

    mod properties {
        use super::super::*;
        use crate::{Delivery, Item, Order, Payment};
        use proptest::prelude::*;

        fn arb_order() -> impl Strategy<Value = Order> {
            (
                "[a-z0-9]{1,20}",
                proptest::option::of(1_000_000_000i64..2_000_000_000i64),
                proptest::collection::vec((any::<i64>(), "[ -~]{0,12}"), 0..4),
                any::<i64>(),
            )
                .prop_map(|(uid, secs, items, amount)| Order {
                    order_uid: uid.clone(),
                    delivery: Delivery {
                        name: "n".to_string(),
                        ..Default::default()
                    },
                    payment: Payment {
                        transaction: uid,
                        amount,
                        ..Default::default()
                    },
                    items: items
                        .into_iter()
                        .map(|(chrt_id, name)| Item {
                            chrt_id,
                            name,
                            ..Default::default()
                        })
                        .collect(),
                    date_created: secs.and_then(|s| Timestamp::from_timestamp(s, 0)),
                    ..Default::default()
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn prop_decode_inverts_encode(order in arb_order()) {
                let bytes = encode(&order).unwrap();
                prop_assert_eq!(decode(&bytes).unwrap(), order);
            }

            #[test]
            fn prop_truncation_is_idempotent(secs in 0i64..4_000_000_000i64, nanos in 0u32..1_000_000_000u32) {
                let ts = Timestamp::from_timestamp(secs, nanos).unwrap();
                let once = truncate_to_seconds(ts);
                prop_assert_eq!(truncate_to_seconds(once), once);
                prop_assert_eq!(once.timestamp(), secs);
            }
        }
    }
}
