//! PostgreSQL implementation of [`OrderStore`].
//!
//! `upsert` writes the whole aggregate in one transaction. `load_all` issues
//! one query per table inside a single read-only repeatable-read snapshot and
//! joins the rows in memory by `order_uid`.

use crate::db::DbClient;
use crate::telemetry::with_metrics;
use async_trait::async_trait;
use order_core::{Delivery, Item, Order, OrderMap, Payment, StorageError, UpsertStage};
use order_storage::OrderStore;
use std::collections::HashMap;
use std::time::Instant;
use tokio_postgres::{IsolationLevel, Row};
use tracing::{debug, warn};

// ============================================================================
// SQL
// ============================================================================

const UPSERT_ORDER_SQL: &str = "\
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
        oof_shard = EXCLUDED.oof_shard, \
        updated_at = now()";

const UPSERT_DELIVERY_SQL: &str = "\
    INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
    ON CONFLICT (order_uid) DO UPDATE SET \
        name = EXCLUDED.name, \
        phone = EXCLUDED.phone, \
        zip = EXCLUDED.zip, \
        city = EXCLUDED.city, \
        address = EXCLUDED.address, \
        region = EXCLUDED.region, \
        email = EXCLUDED.email";

const UPSERT_PAYMENT_SQL: &str = "\
    INSERT INTO payment (order_uid, transaction, request_id, currency, provider, amount, \
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

const DELETE_ITEMS_SQL: &str = "DELETE FROM items WHERE order_uid = $1";

const INSERT_ITEM_SQL: &str = "\
    INSERT INTO items (order_uid, item_index, chrt_id, track_number, price, rid, name, \
        sale, size, total_price, nm_id, brand, status) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";

const SELECT_ORDERS_SQL: &str = "\
    SELECT order_uid, track_number, entry, locale, internal_signature, customer_id, \
        delivery_service, shardkey, sm_id, date_created, oof_shard \
    FROM orders";

const SELECT_DELIVERY_SQL: &str = "\
    SELECT order_uid, name, phone, zip, city, address, region, email FROM delivery";

const SELECT_PAYMENT_SQL: &str = "\
    SELECT order_uid, transaction, request_id, currency, provider, amount, payment_dt, \
        bank, delivery_cost, goods_total, custom_fee \
    FROM payment";

const SELECT_ITEMS_SQL: &str = "\
    SELECT order_uid, chrt_id, track_number, price, rid, name, sale, size, total_price, \
        nm_id, brand, status \
    FROM items ORDER BY order_uid, item_index";

// ============================================================================
// ROW MAPPING
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
        date_created: row.try_get("date_created")?,
        oof_shard: row.try_get("oof_shard")?,
        ..Order::default()
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

fn stage_failed(order: &Order, stage: UpsertStage, err: tokio_postgres::Error) -> StorageError {
    StorageError::UpsertFailed {
        order_uid: order.order_uid.clone(),
        stage,
        reason: err.to_string(),
    }
}

// ============================================================================
// STORE OPERATIONS
// ============================================================================

impl DbClient {
    async fn upsert_in_transaction(&self, order: &Order) -> Result<(), StorageError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StorageError::PoolUnavailable {
                reason: e.to_string(),
            })?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| stage_failed(order, UpsertStage::Begin, e))?;

        tx.execute(
            UPSERT_ORDER_SQL,
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
        .map_err(|e| stage_failed(order, UpsertStage::Order, e))?;

        let d = &order.delivery;
        tx.execute(
            UPSERT_DELIVERY_SQL,
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
        .map_err(|e| stage_failed(order, UpsertStage::Delivery, e))?;

        let p = &order.payment;
        tx.execute(
            UPSERT_PAYMENT_SQL,
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
        .map_err(|e| stage_failed(order, UpsertStage::Payment, e))?;

        tx.execute(DELETE_ITEMS_SQL, &[&order.order_uid])
            .await
            .map_err(|e| stage_failed(order, UpsertStage::ClearItems, e))?;

        if !order.items.is_empty() {
            let insert = tx
                .prepare(INSERT_ITEM_SQL)
                .await
                .map_err(|e| stage_failed(order, UpsertStage::InsertItems, e))?;
            for (index, item) in order.items.iter().enumerate() {
                let item_index = index as i32;
                tx.execute(
                    &insert,
                    &[
                        &order.order_uid,
                        &item_index,
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
                .map_err(|e| stage_failed(order, UpsertStage::InsertItems, e))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| stage_failed(order, UpsertStage::Commit, e))?;

        debug!(
            order_uid = %order.order_uid,
            items = order.items.len(),
            "order upserted"
        );
        Ok(())
    }

    async fn load_all_orders(&self) -> Result<OrderMap, StorageError> {
        let load_failed = |table: &str, e: tokio_postgres::Error| StorageError::LoadFailed {
            reason: format!("{}: {}", table, e),
        };

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StorageError::PoolUnavailable {
                reason: e.to_string(),
            })?;

        // All four tables are read from one snapshot so an upsert committing
        // mid-load cannot split an aggregate across two writes.
        let mut tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .await
            .map_err(|e| load_failed("snapshot", e))?;

        let rows = tx
            .query(SELECT_ORDERS_SQL, &[])
            .await
            .map_err(|e| load_failed("orders", e))?;

        let mut orders: OrderMap = HashMap::with_capacity(rows.len());
        for row in &rows {
            let order = order_from_row(row).map_err(|e| load_failed("orders", e))?;
            orders.insert(order.order_uid.clone(), order);
        }

        // Sub-entity failures leave zero values in place. Each query runs
        // under a savepoint so a failure does not abort the snapshot.
        for row in &sub_entity_rows(&mut tx, "delivery", SELECT_DELIVERY_SQL).await {
            attach(&mut orders, row, "delivery", delivery_from_row, |o, d| {
                o.delivery = d
            });
        }
        for row in &sub_entity_rows(&mut tx, "payment", SELECT_PAYMENT_SQL).await {
            attach(&mut orders, row, "payment", payment_from_row, |o, p| {
                o.payment = p
            });
        }
        for row in &sub_entity_rows(&mut tx, "items", SELECT_ITEMS_SQL).await {
            attach(&mut orders, row, "items", item_from_row, |o, i| o.items.push(i));
        }

        tx.commit().await.map_err(|e| load_failed("snapshot", e))?;
        Ok(orders)
    }
}

/// Rows of one sub-entity table, or none when the query fails.
async fn sub_entity_rows(
    tx: &mut deadpool_postgres::Transaction<'_>,
    table: &'static str,
    sql: &str,
) -> Vec<Row> {
    let savepoint = match tx.savepoint(table).await {
        Ok(savepoint) => savepoint,
        Err(e) => {
            warn!(table, error = %e, "sub-entity load failed");
            return Vec::new();
        }
    };
    match savepoint.query(sql, &[]).await {
        Ok(rows) => {
            if let Err(e) = savepoint.commit().await {
                warn!(table, error = %e, "savepoint release failed");
            }
            rows
        }
        Err(e) => {
            warn!(table, error = %e, "sub-entity load failed");
            if let Err(e) = savepoint.rollback().await {
                warn!(table, error = %e, "savepoint rollback failed");
            }
            Vec::new()
        }
    }
}

/// Decode one sub-entity row and hand it to its order.
///
/// Rows whose order is unknown or whose columns fail to decode are skipped.
fn attach<T>(
    orders: &mut OrderMap,
    row: &Row,
    table: &'static str,
    decode: fn(&Row) -> Result<T, tokio_postgres::Error>,
    apply: impl FnOnce(&mut Order, T),
) {
    let order_uid: String = match row.try_get("order_uid") {
        Ok(uid) => uid,
        Err(e) => {
            warn!(table, error = %e, "sub-entity row without order_uid");
            return;
        }
    };
    let Some(order) = orders.get_mut(&order_uid) else {
        return;
    };
    match decode(row) {
        Ok(value) => apply(order, value),
        Err(e) => warn!(table, order_uid = %order_uid, error = %e, "sub-entity row decode failed"),
    }
}

#[async_trait]
impl OrderStore for DbClient {
    async fn upsert(&self, order: &Order) -> Result<(), StorageError> {
        let start = Instant::now();
        let result = self.upsert_in_transaction(order).await;
        let elapsed = start.elapsed().as_secs_f64();
        with_metrics(|m| m.record_store_operation("upsert", elapsed));
        result
    }

    async fn load_all(&self) -> Result<OrderMap, StorageError> {
        let start = Instant::now();
        let result = self.load_all_orders().await;
        let elapsed = start.elapsed().as_secs_f64();
        with_metrics(|m| m.record_store_operation("load_all", elapsed));
        result
    }
}
