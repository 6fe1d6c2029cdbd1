//! In-memory order store for testing.
//!
//! Rows are kept per table the way the relational store keeps them, so a
//! test can knock out one part of an order and observe how readers cope.
//! Failure injection covers the transient store outages the ingestion loop
//! has to survive.

use crate::{OrderStore, StorageResult};
use async_trait::async_trait;
use orderline_core::{Delivery, Item, Order, Payment, StorageError, SubEntity};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    /// Root rows, with delivery, payment and items left at their defaults.
    orders: BTreeMap<String, Order>,
    deliveries: HashMap<String, Delivery>,
    payments: HashMap<String, Payment>,
    items: HashMap<String, Vec<Item>>,
}

/// In-memory [`OrderStore`].
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    failing_upserts: AtomicUsize,
    upsert_calls: AtomicU64,
    get_calls: AtomicU64,
    get_all_calls: AtomicU64,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `orders`.
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        {
            let mut tables = store
                .tables
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for order in orders {
                write_order(&mut tables, &order);
            }
        }
        store
    }

    /// Make every operation fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` upserts. Reads are unaffected.
    pub fn fail_next_upserts(&self, n: usize) {
        self.failing_upserts.store(n, Ordering::SeqCst);
    }

    /// Delete one part of a stored order, leaving the rest in place.
    ///
    /// Only [`SubEntity::Delivery`], [`SubEntity::Payment`] and
    /// [`SubEntity::Items`] are meaningful; other values are ignored.
    pub fn remove_part(&self, order_uid: &str, part: SubEntity) -> StorageResult<()> {
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        match part {
            SubEntity::Delivery => {
                tables.deliveries.remove(order_uid);
            }
            SubEntity::Payment => {
                tables.payments.remove(order_uid);
            }
            SubEntity::Items => {
                tables.items.remove(order_uid);
            }
            _ => {}
        }
        Ok(())
    }

    /// Number of root rows.
    pub fn order_count(&self) -> usize {
        self.tables
            .read()
            .map(|tables| tables.orders.len())
            .unwrap_or(0)
    }

    /// Number of `upsert_order` calls, failed ones included.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::Relaxed)
    }

    /// Number of `get_order` calls, failed ones included.
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Number of `get_all_orders` calls, failed ones included.
    pub fn get_all_calls(&self) -> u64 {
        self.get_all_calls.load(Ordering::Relaxed)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::persistence(
                SubEntity::Connection,
                "store unavailable",
            ));
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn write_order(tables: &mut Tables, order: &Order) {
    let uid = order.order_uid.clone();
    let root = Order {
        delivery: Delivery::default(),
        payment: Payment::default(),
        items: Vec::new(),
        ..order.clone()
    };
    tables.orders.insert(uid.clone(), root);
    tables.deliveries.insert(uid.clone(), order.delivery.clone());
    tables.payments.insert(uid.clone(), order.payment.clone());
    tables.items.insert(uid, order.items.clone());
}

fn read_order(tables: &Tables, order_uid: &str) -> StorageResult<Order> {
    let mut order = tables
        .orders
        .get(order_uid)
        .cloned()
        .ok_or_else(|| StorageError::not_found(order_uid))?;
    order.delivery = tables
        .deliveries
        .get(order_uid)
        .cloned()
        .ok_or_else(|| StorageError::persistence(SubEntity::Delivery, "row missing"))?;
    order.payment = tables
        .payments
        .get(order_uid)
        .cloned()
        .ok_or_else(|| StorageError::persistence(SubEntity::Payment, "row missing"))?;
    order.items = tables.items.get(order_uid).cloned().unwrap_or_default();
    Ok(order)
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn upsert_order(&self, order: &Order) -> StorageResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        if self.take_injected_failure() {
            return Err(StorageError::persistence(
                SubEntity::Transaction,
                "injected failure",
            ));
        }
        let mut tables = self.tables.write().map_err(|_| StorageError::LockPoisoned)?;
        write_order(&mut tables, order);
        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> StorageResult<Order> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        read_order(&tables, order_uid)
    }

    async fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        self.get_all_calls.fetch_add(1, Ordering::Relaxed);
        self.check_available()?;
        let tables = self.tables.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tables
            .orders
            .keys()
            .filter_map(|uid| read_order(&tables, uid).ok())
            .collect())
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check_available()
    }
}
