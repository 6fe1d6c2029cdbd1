//! PostgreSQL Order Store
//!
//! Connection pooling uses deadpool-postgres. An order is spread over four
//! tables (`orders`, `deliveries`, `payments`, `items`) and every upsert
//! writes all of them inside one transaction.

use crate::{OrderStore, StorageResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use orderline_core::{Delivery, Item, Order, Payment, StorageError, SubEntity, Timestamp};
use std::time::Duration;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info, warn};

/// Schema applied by [`PgOrderStore::migrate`].
const SCHEMA: &str = include_str!("../migrations/V1__orders.sql");

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection string. When set it takes precedence over the
    /// individual fields below.
    pub url: Option<String>,
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection and pool wait timeout
    pub timeout: Duration,
    /// How many times startup tries to reach the database
    pub connect_attempts: u32,
    /// Pause between startup connection attempts
    pub connect_delay: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "orders".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            connect_attempts: 10,
            connect_delay: Duration::from_secs(5),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("ORDERLINE_DB_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            host: std::env::var("ORDERLINE_DB_HOST").unwrap_or(defaults.host),
            port: parse_env("ORDERLINE_DB_PORT").unwrap_or(defaults.port),
            dbname: std::env::var("ORDERLINE_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("ORDERLINE_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("ORDERLINE_DB_PASSWORD").unwrap_or_default(),
            max_size: parse_env("ORDERLINE_DB_POOL_SIZE").unwrap_or(defaults.max_size),
            timeout: parse_env("ORDERLINE_DB_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_attempts: parse_env::<u32>("ORDERLINE_DB_CONNECT_ATTEMPTS")
                .map(|n| n.max(1))
                .unwrap_or(defaults.connect_attempts),
            connect_delay: parse_env("ORDERLINE_DB_CONNECT_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_delay),
        }
    }

    /// Create a connection pool from this configuration.
    ///
    /// No connection is opened here; the first checkout does that.
    pub fn create_pool(&self) -> StorageResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size.max(1));
        pool_cfg.timeouts.wait = Some(self.timeout);
        pool_cfg.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            StorageError::persistence(SubEntity::Connection, format!("Failed to create pool: {}", e))
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Map a driver error to a persistence error naming the table involved.
fn at(entity: SubEntity) -> impl Fn(tokio_postgres::Error) -> StorageError {
    move |err| StorageError::persistence(entity, err)
}

// ============================================================================
// POSTGRES ORDER STORE
// ============================================================================

/// [`OrderStore`] backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: Pool,
}

impl PgOrderStore {
    /// Create a store over an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store from configuration without touching the network.
    pub fn from_config(config: &DbConfig) -> StorageResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Create a store and wait until the database answers.
    ///
    /// Tries `connect_attempts` times, sleeping `connect_delay` between tries,
    /// and returns the last error when every attempt failed.
    pub async fn connect_with_retry(config: &DbConfig) -> StorageResult<Self> {
        let store = Self::from_config(config)?;
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match store.health_check().await {
                Ok(()) => {
                    info!(attempt, "Connected to PostgreSQL");
                    return Ok(store);
                }
                Err(err) if attempt < attempts => {
                    warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "PostgreSQL not reachable yet, retrying"
                    );
                    tokio::time::sleep(config.connect_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Apply the embedded schema. Safe to run on every start.
    pub async fn migrate(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA)
            .await
            .map_err(|e| StorageError::persistence(SubEntity::Order, format!("migration failed: {}", e)))?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StorageResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::persistence(SubEntity::Connection, e))
    }
}

// ============================================================================
// SQL
// ============================================================================

const UPSERT_ORDER: &str = "\
    INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature, \
        customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
    ON CONFLICT (order_uid) DO UPDATE SET \
        track_number = EXCLUDED.track_number, \
        entry = EXCLUDED.entry, \
        locale = EXCLUDED.locale, \
        internal_signature = EXCLUDED.internal_signature, \
        customer_id = EXCLUDED.customer_id, \
        delivery_service = EXCLUDED.delivery_service, \
        shardkey = EXCLUDED.shardkey, \
        sm_id = EXCLUDED.sm_id, \
        date_created = EXCLUDED.date_created, \
        oof_shard = EXCLUDED.oof_shard";

const UPSERT_DELIVERY: &str = "\
    INSERT INTO deliveries (order_uid, name, phone, zip, city, address, region, email) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
    ON CONFLICT (order_uid) DO UPDATE SET \
        name = EXCLUDED.name, \
        phone = EXCLUDED.phone, \
        zip = EXCLUDED.zip, \
        city = EXCLUDED.city, \
        address = EXCLUDED.address, \
        region = EXCLUDED.region, \
        email = EXCLUDED.email";

const UPSERT_PAYMENT: &str = "\
    INSERT INTO payments (order_uid, transaction, request_id, currency, provider, amount, \
        payment_dt, bank, delivery_cost, goods_total, custom_fee) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
    ON CONFLICT (order_uid) DO UPDATE SET \
        transaction = EXCLUDED.transaction, \
        request_id = EXCLUDED.request_id, \
        currency = EXCLUDED.currency, \
        provider = EXCLUDED.provider, \
        amount = EXCLUDED.amount, \
        payment_dt = EXCLUDED.payment_dt, \
        bank = EXCLUDED.bank, \
        delivery_cost = EXCLUDED.delivery_cost, \
        goods_total = EXCLUDED.goods_total, \
        custom_fee = EXCLUDED.custom_fee";

const DELETE_ITEMS: &str = "DELETE FROM items WHERE order_uid = $1";

const INSERT_ITEM: &str = "\
    INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name, sale, size, \
        total_price, nm_id, brand, status) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

const SELECT_ORDER: &str = "\
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id, \
        delivery_service, shardkey, sm_id, date_created, oof_shard \
    FROM orders WHERE order_uid = $1";

const SELECT_DELIVERY: &str = "\
    SELECT name, phone, zip, city, address, region, email \
    FROM deliveries WHERE order_uid = $1";

const SELECT_PAYMENT: &str = "\
    SELECT transaction, request_id, currency, provider, amount, payment_dt, bank, \
        delivery_cost, goods_total, custom_fee \
    FROM payments WHERE order_uid = $1";

// Insertion order is the item order.
const SELECT_ITEMS: &str = "\
    SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status \
    FROM items WHERE order_uid = $1 ORDER BY id";

const SELECT_ORDER_IDS: &str = "SELECT order_uid FROM orders ORDER BY order_uid";

// ============================================================================
// ROW DECODING
// ============================================================================

fn order_from_row(row: &Row) -> Result<Order, tokio_postgres::Error> {
    Ok(Order {
        order_uid: row.try_get("order_uid")?,
        track_number: row.try_get("track_number")?,
        entry: row.try_get("entry")?,
        locale: row.try_get("locale")?,
        internal_signature: row.try_get("internal_signature")?,
        customer_id: row.try_get("customer_id")?,
        delivery_service: row.try_get("delivery_service")?,
        shardkey: row.try_get("shardkey")?,
        sm_id: row.try_get("sm_id")?,
        date_created: row.try_get::<_, Option<Timestamp>>("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
        ..Default::default()
    })
}

fn delivery_from_row(row: &Row) -> Result<Delivery, tokio_postgres::Error> {
    Ok(Delivery {
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        zip: row.try_get("zip")?,
        city: row.try_get("city")?,
        address: row.try_get("address")?,
        region: row.try_get("region")?,
        email: row.try_get("email")?,
    })
}

fn payment_from_row(row: &Row) -> Result<Payment, tokio_postgres::Error> {
    Ok(Payment {
        transaction: row.try_get("transaction")?,
        request_id: row.try_get("request_id")?,
        currency: row.try_get("currency")?,
        provider: row.try_get("provider")?,
        amount: row.try_get("amount")?,
        payment_dt: row.try_get("payment_dt")?,
        bank: row.try_get("bank")?,
        delivery_cost: row.try_get("delivery_cost")?,
        goods_total: row.try_get("goods_total")?,
        custom_fee: row.try_get("custom_fee")?,
    })
}

fn item_from_row(row: &Row) -> Result<Item, tokio_postgres::Error> {
    Ok(Item {
        chrt_id: row.try_get("chrt_id")?,
        track_number: row.try_get("track_number")?,
        price: row.try_get("price")?,
        rid: row.try_get("rid")?,
        name: row.try_get("name")?,
        sale: row.try_get("sale")?,
        size: row.try_get("size")?,
        total_price: row.try_get("total_price")?,
        nm_id: row.try_get("nm_id")?,
        brand: row.try_get("brand")?,
        status: row.try_get("status")?,
    })
}

/// Reassemble one order from its four tables.
async fn load_order(client: &Client, order_uid: &str) -> StorageResult<Order> {
    let row = client
        .query_opt(SELECT_ORDER, &[&order_uid])
        .await
        .map_err(at(SubEntity::Order))?
        .ok_or_else(|| StorageError::not_found(order_uid))?;
    let mut order = order_from_row(&row).map_err(at(SubEntity::Order))?;

    let row = client
        .query_opt(SELECT_DELIVERY, &[&order_uid])
        .await
        .map_err(at(SubEntity::Delivery))?
        .ok_or_else(|| StorageError::persistence(SubEntity::Delivery, "row missing"))?;
    order.delivery = delivery_from_row(&row).map_err(at(SubEntity::Delivery))?;

    let row = client
        .query_opt(SELECT_PAYMENT, &[&order_uid])
        .await
        .map_err(at(SubEntity::Payment))?
        .ok_or_else(|| StorageError::persistence(SubEntity::Payment, "row missing"))?;
    order.payment = payment_from_row(&row).map_err(at(SubEntity::Payment))?;

    order.items = client
        .query(SELECT_ITEMS, &[&order_uid])
        .await
        .map_err(at(SubEntity::Items))?
        .iter()
        .map(item_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(at(SubEntity::Items))?;

    Ok(order)
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn upsert_order(&self, order: &Order) -> StorageResult<()> {
        let mut conn = self.get_conn().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(at(SubEntity::Transaction))?;

        tx.execute(
            UPSERT_ORDER,
            &[
                &order.order_uid,
                &order.track_number,
                &order.entry,
                &order.locale,
                &order.internal_signature,
                &order.customer_id,
                &order.delivery_service,
                &order.shardkey,
                &order.sm_id,
                &order.date_created,
                &order.oof_shard,
            ],
        )
        .await
        .map_err(at(SubEntity::Order))?;

        let d = &order.delivery;
        tx.execute(
            UPSERT_DELIVERY,
            &[
                &order.order_uid,
                &d.name,
                &d.phone,
                &d.zip,
                &d.city,
                &d.address,
                &d.region,
                &d.email,
            ],
        )
        .await
        .map_err(at(SubEntity::Delivery))?;

        let p = &order.payment;
        tx.execute(
            UPSERT_PAYMENT,
            &[
                &order.order_uid,
                &p.transaction,
                &p.request_id,
                &p.currency,
                &p.provider,
                &p.amount,
                &p.payment_dt,
                &p.bank,
                &p.delivery_cost,
                &p.goods_total,
                &p.custom_fee,
            ],
        )
        .await
        .map_err(at(SubEntity::Payment))?;

        tx.execute(DELETE_ITEMS, &[&order.order_uid])
            .await
            .map_err(at(SubEntity::Items))?;

        if !order.items.is_empty() {
            let insert = tx.prepare(INSERT_ITEM).await.map_err(at(SubEntity::Items))?;
            for item in &order.items {
                tx.execute(
                    &insert,
                    &[
                        &order.order_uid,
                        &item.chrt_id,
                        &item.track_number,
                        &item.price,
                        &item.rid,
                        &item.name,
                        &item.sale,
                        &item.size,
                        &item.total_price,
                        &item.nm_id,
                        &item.brand,
                        &item.status,
                    ],
                )
                .await
                .map_err(at(SubEntity::Items))?;
            }
        }

        // Dropping an uncommitted transaction rolls it back.
        tx.commit().await.map_err(at(SubEntity::Transaction))?;
        debug!(order_uid = %order.order_uid, items = order.items.len(), "Order persisted");
        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> StorageResult<Order> {
        let conn = self.get_conn().await?;
        load_order(&conn, order_uid).await
    }

    async fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        let conn = self.get_conn().await?;
        let ids: Vec<String> = conn
            .query(SELECT_ORDER_IDS, &[])
            .await
            .map_err(at(SubEntity::Order))?
            .iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<_, _>>()
            .map_err(at(SubEntity::Order))?;

        let mut orders = Vec::with_capacity(ids.len());
        for order_uid in &ids {
            match load_order(&conn, order_uid).await {
                Ok(order) => orders.push(order),
                // Deleted between listing and loading.
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    warn!(order_uid = %order_uid, error = %err, "Skipping order that failed to load");
                }
            }
        }
        Ok(orders)
    }

    /// Round-trip a trivial query to prove the database is reachable.
    async fn health_check(&self) -> StorageResult<()> {
        let conn = self.get_conn().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(at(SubEntity::Connection))?;
        Ok(())
    }
}
