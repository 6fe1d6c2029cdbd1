//! Publish one generated test order to the configured topic.
//!
//! Reads the same `ORDERLINE_KAFKA_*` variables as the server.

use chrono::Utc;
use orderline_api::stream::kafka::publish;
use orderline_api::{init_tracer, ApiError, ApiResult, StreamConfig, TelemetryConfig};
use orderline_core::{encode, truncate_to_seconds, Delivery, Item, Order, Payment};
use rand::Rng;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::from_env())?;

    let config = StreamConfig::from_env();
    let order = generate_order();
    let payload = encode(&order)
        .map_err(|e| ApiError::internal_error(format!("Failed to encode order: {}", e)))?;

    publish(&config, &order.order_uid, &payload)
        .await
        .map_err(|e| ApiError::service_unavailable(format!("Failed to publish order: {}", e)))?;

    tracing::info!(order_uid = %order.order_uid, topic = %config.topic, "Sent test order");
    Ok(())
}

fn short_id(len: usize) -> String {
    Uuid::new_v4().to_string().chars().take(len).collect()
}

fn generate_order() -> Order {
    let mut rng = rand::rng();
    let order_uid = format!("{}test", short_id(16));
    let track_number = format!("TRACK{}", short_id(8));
    let now = Utc::now();

    Order {
        order_uid: order_uid.clone(),
        track_number: track_number.clone(),
        entry: "TEST".to_string(),
        delivery: Delivery {
            name: "User".to_string(),
            phone: "+79001234567".to_string(),
            zip: "123456".to_string(),
            city: "Test City".to_string(),
            address: "Street 1".to_string(),
            region: "Test Region".to_string(),
            email: "user@test.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "testpay".to_string(),
            amount: 1000,
            payment_dt: now.timestamp(),
            bank: "testbank".to_string(),
            delivery_cost: 200,
            goods_total: 800,
            custom_fee: 0,
        },
        items: vec![Item {
            chrt_id: rng.random_range(1_000_000..2_000_000),
            track_number,
            price: 500,
            rid: String::new(),
            name: "Product".to_string(),
            sale: 10,
            size: "M".to_string(),
            total_price: 450,
            nm_id: rng.random_range(2_000_000..3_000_000),
            brand: "Test Brand".to_string(),
            status: 200,
        }],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "customer1".to_string(),
        delivery_service: "testdelivery".to_string(),
        shardkey: "1".to_string(),
        sm_id: rng.random_range(0..100),
        date_created: Some(truncate_to_seconds(now)),
        oof_shard: "1".to_string(),
    }
}
