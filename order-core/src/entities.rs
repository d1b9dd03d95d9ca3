//! Order aggregate structures
//!
//! Field names follow the inbound JSON payload (snake_case) so the same types
//! serve as the wire format, the cache value, and the HTTP response body.
//! Missing scalar fields decode to their zero value.

use crate::{OrderId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

/// Order - aggregate root.
/// Owns exactly one [`Delivery`], exactly one [`Payment`] and an ordered list
/// of [`Item`]s. The aggregate is only ever replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    pub order_uid: OrderId,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: Timestamp,
    pub oof_shard: String,
}

/// Delivery - recipient details, 1:1 with the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment - transaction details, 1:1 with the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    /// Unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

/// Item - one order line. Items have no identity of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i64,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Decode an inbound message body into an order aggregate.
    ///
    /// Fails when the body is not JSON of the expected shape or when
    /// `order_uid` is missing or blank.
    pub fn from_json(payload: &[u8]) -> Result<Self, ValidationError> {
        let order: Order =
            serde_json::from_slice(payload).map_err(|e| ValidationError::MalformedPayload {
                reason: e.to_string(),
            })?;
        order.validate()?;
        Ok(order)
    }

    /// Check the invariants a decoded aggregate must hold before it is stored.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_uid.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "order_uid".to_string(),
            });
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.order_uid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

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
    fn test_decode_full_payload() {
        let order = Order::from_json(SAMPLE.as_bytes()).expect("sample should decode");

        assert_eq!(order.id(), "b563feb7b2b84b6test");
        assert_eq!(order.delivery.city, "Kiryat Mozkin");
        assert_eq!(order.payment.amount, 1817);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].chrt_id, 9934930);
        assert_eq!(order.sm_id, 99);
        assert_eq!(
            order.date_created,
            chrono::Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap()
        );
    }

    #[test]
    fn test_missing_fields_decode_to_zero_values() {
        let order = Order::from_json(br#"{"order_uid":"o1"}"#).expect("minimal payload");

        assert_eq!(order.order_uid, "o1");
        assert_eq!(order.delivery, Delivery::default());
        assert_eq!(order.payment, Payment::default());
        assert!(order.items.is_empty());
    }

    #[test]
    fn test_blank_order_uid_rejected() {
        let err = Order::from_json(br#"{"order_uid":"   ","items":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::RequiredFieldMissing { ref field } if field == "order_uid"
        ));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let err = Order::from_json(b"not json at all").unwrap_err();
        assert!(matches!(err, ValidationError::MalformedPayload { .. }));

        let err = Order::from_json(br#"{"order_uid":"o1","items":{}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedPayload { .. }));
    }

    #[test]
    fn test_serialized_keys_match_payload() {
        let order = Order::from_json(SAMPLE.as_bytes()).expect("sample should decode");
        let value = serde_json::to_value(&order).expect("serialize");

        for key in [
            "order_uid",
            "track_number",
            "entry",
            "locale",
            "internal_signature",
            "customer_id",
            "delivery_service",
            "shardkey",
            "sm_id",
            "date_created",
            "oof_shard",
            "delivery",
            "payment",
            "items",
        ] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["items"][0]["nm_id"], 2389212);
    }
}
