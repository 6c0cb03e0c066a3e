//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait on top of a pessimistic `TransactionDB`. Row locks
//! (`get_for_update`) serialize every stock delta and every counter
//! bump, and a whole checkout commits as one transaction.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, Transaction, TransactionDB, TransactionDBOptions,
};

use verdant_core::{
    max_sequence, Account, Actor, CancelReport, CartLine, ItemFailure, ItemId, ItemStatus, Order,
    OrderDraft, OrderId, OrderItem, OrderStatus, Product, ProductId, Stock, StockId, UserId,
    ITEM_ID_PREFIX, ORDER_ID_PREFIX, SEQUENCE_START,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

type Db = TransactionDB<MultiThreaded>;
type Tx<'a> = Transaction<'a, Db>;

/// How often a transaction is re-run after losing a row lock before the
/// conflict is surfaced to the caller.
const MAX_TXN_RETRIES: usize = 5;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let txn_opts = TransactionDBOptions::default();

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db: Db = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Run `op` inside a pessimistic transaction, retrying on lock
    /// conflicts up to [`MAX_TXN_RETRIES`] times.
    fn run_txn<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&Tx<'_>) -> Result<T>,
    {
        let mut attempts = 0;
        loop {
            let txn = self.db.transaction();
            match op(&txn) {
                Ok(value) => match txn.commit() {
                    Ok(()) => return Ok(value),
                    Err(e) => {
                        let err = db_err(e);
                        if matches!(err, StoreError::Conflict(_)) && attempts < MAX_TXN_RETRIES {
                            attempts += 1;
                            tracing::debug!(attempts, "transaction commit conflict, retrying");
                            continue;
                        }
                        return Err(err);
                    }
                },
                Err(StoreError::Conflict(reason)) => {
                    let _ = txn.rollback();
                    if attempts < MAX_TXN_RETRIES {
                        attempts += 1;
                        tracing::debug!(attempts, %reason, "transaction conflict, retrying");
                        continue;
                    }
                    return Err(StoreError::Conflict(reason));
                }
                Err(other) => {
                    let _ = txn.rollback();
                    return Err(other);
                }
            }
        }
    }

    /// Read a record inside a transaction, optionally taking its row lock.
    fn txn_get<T: serde::de::DeserializeOwned>(
        &self,
        txn: &Tx<'_>,
        cf_name: &str,
        key: &[u8],
        for_update: bool,
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let data = if for_update {
            txn.get_for_update_cf(&cf, key, true)
        } else {
            txn.get_cf(&cf, key)
        }
        .map_err(db_err)?;

        data.map(|bytes| Self::deserialize(&bytes)).transpose()
    }

    /// Write a record inside a transaction.
    fn txn_put<T: serde::Serialize>(
        &self,
        txn: &Tx<'_>,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = Self::serialize(value)?;
        txn.put_cf(&cf, key, bytes).map_err(db_err)
    }

    /// Bump a sequence counter under its row lock and return the new
    /// sequence number.
    ///
    /// A missing counter record is seeded from the existing collection:
    /// the keys are scanned for the highest parseable sequence, skipping
    /// malformed ids, and the sequence starts at [`SEQUENCE_START`] when
    /// nothing parses. The seeding scan races are harmless: whoever holds
    /// the counter lock writes first, and later transactions read the
    /// committed record instead of scanning again.
    fn next_sequence(&self, txn: &Tx<'_>, counter: &'static str) -> Result<u64> {
        let cf_counters = self.cf(cf::COUNTERS)?;
        let key = keys::counter_key(counter);

        let next = match txn
            .get_for_update_cf(&cf_counters, &key, true)
            .map_err(db_err)?
        {
            Some(bytes) => decode_sequence(&bytes)? + 1,
            None => self.seed_sequence(counter)?,
        };

        txn.put_cf(&cf_counters, &key, next.to_be_bytes())
            .map_err(db_err)?;
        Ok(next)
    }

    /// Derive the next sequence for a counter from the existing records.
    fn seed_sequence(&self, counter: &'static str) -> Result<u64> {
        let (cf_name, prefix) = match counter {
            keys::ORDER_SEQ => (cf::ORDERS, ORDER_ID_PREFIX),
            _ => (cf::ORDER_ITEMS, ITEM_ID_PREFIX),
        };

        let cf = self.cf(cf_name)?;
        let mut ids = Vec::new();
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _) = entry.map_err(db_err)?;
            if let Ok(id) = std::str::from_utf8(&key) {
                ids.push(id.to_owned());
            }
        }

        let next = max_sequence(ids.iter().map(String::as_str), prefix)
            .map_or(SEQUENCE_START, |max| max + 1);
        tracing::info!(counter, next, "seeded sequence counter from existing records");
        Ok(next)
    }

    /// Decrement a stock row inside a transaction, enforcing the zero
    /// floor, and return the updated row.
    fn consume_stock(&self, txn: &Tx<'_>, stock_id: &StockId, quantity: u32) -> Result<Stock> {
        let requested = i64::from(quantity);
        let key = keys::stock_key(stock_id);

        let mut stock: Stock = self
            .txn_get(txn, cf::STOCKS, &key, true)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "stock",
                id: stock_id.to_string(),
            })?;

        if !stock.has_available(requested) {
            return Err(StoreError::InsufficientStock {
                stock_id: stock_id.to_string(),
                available: stock.quantity,
                requested,
            });
        }

        stock.quantity -= requested;
        stock.updated_at = Utc::now();
        self.txn_put(txn, cf::STOCKS, &key, &stock)?;
        Ok(stock)
    }

    /// Restore previously consumed units to a stock row.
    fn restore_stock(&self, txn: &Tx<'_>, stock_id: &StockId, quantity: u32) -> Result<()> {
        let key = keys::stock_key(stock_id);

        let mut stock: Stock = self
            .txn_get(txn, cf::STOCKS, &key, true)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "stock",
                id: stock_id.to_string(),
            })?;

        stock.quantity += i64::from(quantity);
        stock.updated_at = Utc::now();
        self.txn_put(txn, cf::STOCKS, &key, &stock)
    }

    /// Write an item record and its order index entry.
    fn write_item(&self, txn: &Tx<'_>, item: &OrderItem) -> Result<()> {
        self.txn_put(txn, cf::ORDER_ITEMS, &keys::item_key(&item.id), item)?;
        let cf_idx = self.cf(cf::ITEMS_BY_ORDER)?;
        txn.put_cf(
            &cf_idx,
            keys::items_by_order_key(&item.order_id, &item.id),
            [],
        )
        .map_err(db_err)
    }

    /// Ensure a catalog entry exists for a cart line.
    fn require_product(&self, txn: &Tx<'_>, product_id: &ProductId) -> Result<()> {
        if self
            .txn_get::<Product>(txn, cf::PRODUCTS, &keys::product_key(product_id), false)?
            .is_none()
        {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        }
        Ok(())
    }

    /// Restore one item's stock and move it to `target` (`Cancelled` or
    /// `Returned`), settling the order header if appropriate.
    fn finish_order_item(
        &self,
        item_id: &ItemId,
        target: ItemStatus,
        reason: &str,
        actor: Actor,
    ) -> Result<OrderItem> {
        self.run_txn(|txn| {
            let key = keys::item_key(item_id);
            let mut item: OrderItem = self
                .txn_get(txn, cf::ORDER_ITEMS, &key, true)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "order item",
                    id: item_id.to_string(),
                })?;

            // The transition table is the policy: Cancelled is reachable
            // from Placed/Packed, Returned from Shipped/Delivered.
            item.transition(target, Some(reason.to_owned()), Some(actor))?;

            // Restore exactly what the item consumed. A missing stock row
            // aborts this item's transaction, leaving the item untouched.
            self.restore_stock(txn, &item.stock_id, item.quantity)?;
            self.txn_put(txn, cf::ORDER_ITEMS, &key, &item)?;

            if target == ItemStatus::Cancelled {
                self.settle_cancelled_order(txn, &item)?;
            }

            Ok(item)
        })
    }

    /// Move the order header to `Cancelled` once every item is cancelled.
    ///
    /// The committed view still shows `updated` with its old status, so it
    /// is substituted before the check.
    fn settle_cancelled_order(&self, txn: &Tx<'_>, updated: &OrderItem) -> Result<()> {
        // The order lock must come before the items read: two concurrent
        // cancels of an order's last two items would otherwise each see
        // the other still live and neither would settle the header.
        let key = keys::order_key(&updated.order_id);
        let mut order: Order = self
            .txn_get(txn, cf::ORDERS, &key, true)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: updated.order_id.to_string(),
            })?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Ok(());
        }

        let mut items = self.items_by_order(&updated.order_id)?;
        for item in &mut items {
            if item.id == updated.id {
                *item = updated.clone();
            }
        }

        if items.iter().all(|i| i.status == ItemStatus::Cancelled) {
            order.transition(OrderStatus::Cancelled)?;
            self.txn_put(txn, cf::ORDERS, &key, &order)?;
        }
        Ok(())
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    fn put_product(&self, product: &Product) -> Result<()> {
        self.run_txn(|txn| {
            self.txn_put(txn, cf::PRODUCTS, &keys::product_key(&product.id), product)
        })
    }

    fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        let cf = self.cf(cf::PRODUCTS)?;
        self.db
            .get_cf(&cf, keys::product_key(product_id))
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_products(&self, limit: usize, offset: usize) -> Result<Vec<Product>> {
        let cf = self.cf(cf::PRODUCTS)?;

        let mut products = Vec::new();
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = entry.map_err(db_err)?;
            products.push(Self::deserialize::<Product>(&value)?);
        }

        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products.into_iter().skip(offset).take(limit).collect())
    }

    fn put_stock(&self, stock: &Stock) -> Result<()> {
        self.run_txn(|txn| {
            self.txn_put(txn, cf::STOCKS, &keys::stock_key(&stock.id), stock)?;
            let cf_idx = self.cf(cf::STOCKS_BY_PRODUCT)?;
            txn.put_cf(
                &cf_idx,
                keys::stocks_by_product_key(&stock.product_id, &stock.id),
                [],
            )
            .map_err(db_err)
        })
    }

    fn get_stock(&self, stock_id: &StockId) -> Result<Option<Stock>> {
        let cf = self.cf(cf::STOCKS)?;
        self.db
            .get_cf(&cf, keys::stock_key(stock_id))
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn stocks_by_product(&self, product_id: &ProductId) -> Result<Vec<Stock>> {
        let cf_idx = self.cf(cf::STOCKS_BY_PRODUCT)?;
        let prefix = keys::stocks_by_product_prefix(product_id);

        let mut stocks = Vec::new();
        for entry in self
            .db
            .iterator_cf(&cf_idx, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = entry.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            let stock_id = keys::extract_stock_id(&key);
            if let Some(stock) = self.get_stock(&stock_id)? {
                stocks.push(stock);
            }
        }

        Ok(stocks)
    }

    fn adjust_stock(&self, stock_id: &StockId, delta: i64) -> Result<i64> {
        self.run_txn(|txn| {
            let key = keys::stock_key(stock_id);
            let mut stock: Stock = self
                .txn_get(txn, cf::STOCKS, &key, true)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "stock",
                    id: stock_id.to_string(),
                })?;

            let next = stock.quantity + delta;
            if next < 0 {
                return Err(StoreError::InsufficientStock {
                    stock_id: stock_id.to_string(),
                    available: stock.quantity,
                    requested: -delta,
                });
            }

            stock.quantity = next;
            stock.updated_at = Utc::now();
            self.txn_put(txn, cf::STOCKS, &key, &stock)?;
            Ok(next)
        })
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        self.run_txn(|txn| {
            self.txn_put(
                txn,
                cf::ACCOUNTS,
                &keys::account_key(&account.user_id),
                account,
            )
        })
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        self.db
            .get_cf(&cf, keys::account_key(user_id))
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Identifier Generation
    // =========================================================================

    fn allocate_order_id(&self) -> Result<OrderId> {
        self.run_txn(|txn| {
            self.next_sequence(txn, keys::ORDER_SEQ)
                .map(OrderId::from_sequence)
        })
    }

    fn allocate_item_id(&self) -> Result<ItemId> {
        self.run_txn(|txn| {
            self.next_sequence(txn, keys::ITEM_SEQ)
                .map(ItemId::from_sequence)
        })
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    fn create_order(&self, user_id: UserId, draft: &OrderDraft) -> Result<Order> {
        let lines = draft.merged_lines()?;

        self.run_txn(|txn| {
            let order_id = OrderId::from_sequence(self.next_sequence(txn, keys::ORDER_SEQ)?);
            let mut order = Order::new(
                order_id,
                user_id,
                draft.currency.clone(),
                draft.address.clone(),
                draft.delivery,
            );

            for line in &lines {
                self.require_product(txn, &line.product_id)?;

                let stock = self.consume_stock(txn, &line.stock_id, line.quantity)?;
                if stock.product_id != line.product_id {
                    return Err(StoreError::Invalid(format!(
                        "stock row {} does not belong to product {}",
                        line.stock_id, line.product_id
                    )));
                }

                let item_id = ItemId::from_sequence(self.next_sequence(txn, keys::ITEM_SEQ)?);
                let item = OrderItem::new(
                    item_id,
                    order_id,
                    line.product_id,
                    line.stock_id,
                    line.quantity,
                    stock.price_cents,
                );

                order.add_line(line.product_id, line.quantity, item.subtotal_cents);
                self.write_item(txn, &item)?;
            }

            self.txn_put(txn, cf::ORDERS, &keys::order_key(&order_id), &order)?;
            let cf_idx = self.cf(cf::ORDERS_BY_USER)?;
            txn.put_cf(&cf_idx, keys::orders_by_user_key(&user_id, &order_id), [])
                .map_err(db_err)?;

            tracing::info!(
                order_id = %order_id,
                user_id = %user_id,
                total_cents = order.total_cents,
                lines = lines.len(),
                "order created"
            );
            Ok(order)
        })
    }

    fn get_order(&self, order_id: &OrderId) -> Result<Option<Order>> {
        let cf = self.cf(cf::ORDERS)?;
        self.db
            .get_cf(&cf, keys::order_key(order_id))
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_orders_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Order>> {
        let cf_idx = self.cf(cf::ORDERS_BY_USER)?;
        let prefix = keys::orders_by_user_prefix(user_id);

        // Sequential ids sort oldest first; collect and reverse for
        // newest-first listings.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for entry in self
            .db
            .iterator_cf(&cf_idx, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = entry.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut orders = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if orders.len() >= limit {
                break;
            }
            let Some(order_id) = keys::extract_order_id(&key, prefix.len()) else {
                continue;
            };
            if let Some(order) = self.get_order(&order_id)? {
                orders.push(order);
            }
        }

        Ok(orders)
    }

    fn items_by_order(&self, order_id: &OrderId) -> Result<Vec<OrderItem>> {
        let cf_idx = self.cf(cf::ITEMS_BY_ORDER)?;
        let prefix = keys::items_by_order_prefix(order_id);

        let mut items = Vec::new();
        for entry in self
            .db
            .iterator_cf(&cf_idx, IteratorMode::From(&prefix, Direction::Forward))
        {
            let (key, _) = entry.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            let Some(item_id) = keys::extract_item_id(&key, prefix.len()) else {
                continue;
            };
            if let Some(item) = self.get_order_item(&item_id)? {
                items.push(item);
            }
        }

        Ok(items)
    }

    fn get_order_item(&self, item_id: &ItemId) -> Result<Option<OrderItem>> {
        let cf = self.cf(cf::ORDER_ITEMS)?;
        self.db
            .get_cf(&cf, keys::item_key(item_id))
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn add_or_update_order_item(&self, order_id: &OrderId, line: &CartLine) -> Result<OrderItem> {
        if line.quantity == 0 {
            return Err(StoreError::Invalid(format!(
                "invalid quantity for product {}",
                line.product_id
            )));
        }

        self.run_txn(|txn| {
            // The order row lock serializes all item mutations for one
            // order, so the committed items view below is consistent.
            let order_key = keys::order_key(order_id);
            let mut order: Order = self
                .txn_get(txn, cf::ORDERS, &order_key, true)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "order",
                    id: order_id.to_string(),
                })?;

            if order.status != OrderStatus::New {
                return Err(StoreError::Invalid(format!(
                    "order {order_id} can no longer be amended (status {})",
                    order.status
                )));
            }

            self.require_product(txn, &line.product_id)?;

            let existing = self
                .items_by_order(order_id)?
                .into_iter()
                .find(|item| item.product_id == line.product_id);

            let item = if let Some(mut item) = existing {
                if item.stock_id != line.stock_id {
                    return Err(StoreError::Invalid(format!(
                        "conflicting stock row for product {}",
                        line.product_id
                    )));
                }
                if item.status != ItemStatus::Placed {
                    return Err(StoreError::Invalid(format!(
                        "item {} can no longer be amended (status {})",
                        item.id, item.status
                    )));
                }

                self.consume_stock(txn, &line.stock_id, line.quantity)?;
                item.merge_quantity(line.quantity);
                self.txn_put(txn, cf::ORDER_ITEMS, &keys::item_key(&item.id), &item)?;

                order.add_line(
                    line.product_id,
                    line.quantity,
                    i64::from(line.quantity) * item.unit_price_cents,
                );
                item
            } else {
                let stock = self.consume_stock(txn, &line.stock_id, line.quantity)?;
                if stock.product_id != line.product_id {
                    return Err(StoreError::Invalid(format!(
                        "stock row {} does not belong to product {}",
                        line.stock_id, line.product_id
                    )));
                }

                let item_id = ItemId::from_sequence(self.next_sequence(txn, keys::ITEM_SEQ)?);
                let item = OrderItem::new(
                    item_id,
                    *order_id,
                    line.product_id,
                    line.stock_id,
                    line.quantity,
                    stock.price_cents,
                );

                order.add_line(line.product_id, line.quantity, item.subtotal_cents);
                self.write_item(txn, &item)?;
                item
            };

            self.txn_put(txn, cf::ORDERS, &order_key, &order)?;
            Ok(item)
        })
    }

    fn advance_order_status(&self, order_id: &OrderId, next: OrderStatus) -> Result<Order> {
        let item_target = match next {
            OrderStatus::Packed => ItemStatus::Packed,
            OrderStatus::Shipped => ItemStatus::Shipped,
            OrderStatus::Delivered => ItemStatus::Delivered,
            OrderStatus::New | OrderStatus::Cancelled => {
                return Err(StoreError::Invalid(format!(
                    "cannot advance an order to {next}; use the cancel operations"
                )));
            }
        };

        self.run_txn(|txn| {
            let key = keys::order_key(order_id);
            let mut order: Order = self
                .txn_get(txn, cf::ORDERS, &key, true)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "order",
                    id: order_id.to_string(),
                })?;

            order.transition(next)?;

            // Carry every live item along; cancelled and returned items
            // keep their terminal state.
            for mut item in self.items_by_order(order_id)? {
                if item.status.can_transition_to(item_target) {
                    item.transition(item_target, None, None)?;
                    self.txn_put(txn, cf::ORDER_ITEMS, &keys::item_key(&item.id), &item)?;
                }
            }

            self.txn_put(txn, cf::ORDERS, &key, &order)?;
            Ok(order)
        })
    }

    fn cancel_order_item(
        &self,
        item_id: &ItemId,
        reason: &str,
        actor: Actor,
    ) -> Result<OrderItem> {
        self.finish_order_item(item_id, ItemStatus::Cancelled, reason, actor)
    }

    fn return_order_item(
        &self,
        item_id: &ItemId,
        reason: &str,
        actor: Actor,
    ) -> Result<OrderItem> {
        self.finish_order_item(item_id, ItemStatus::Returned, reason, actor)
    }

    fn cancel_order(&self, order_id: &OrderId, reason: &str, actor: Actor) -> Result<CancelReport> {
        let order = self.get_order(order_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "order",
            id: order_id.to_string(),
        })?;

        let mut report = CancelReport {
            order_id: *order_id,
            cancelled: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            order_status: order.status,
        };

        // Each item is its own transaction: one unrestorable item must
        // not block cancellation of the rest.
        for item in self.items_by_order(order_id)? {
            if !item.status.is_cancellable() {
                report.skipped.push(item.id);
                continue;
            }
            match self.cancel_order_item(&item.id, reason, actor) {
                Ok(_) => report.cancelled.push(item.id),
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        item_id = %item.id,
                        error = %e,
                        "order item could not be cancelled"
                    );
                    report.failed.push(ItemFailure {
                        item_id: item.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.order_status = self
            .get_order(order_id)?
            .map_or(report.order_status, |o| o.status);

        Ok(report)
    }
}

/// Map a `RocksDB` error, classifying lock conflicts as retryable.
fn db_err(e: rocksdb::Error) -> StoreError {
    match e.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => {
            StoreError::Conflict(e.to_string())
        }
        _ => StoreError::Database(e.to_string()),
    }
}

/// Decode a counter record (8-byte big-endian sequence).
fn decode_sequence(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization("counter record is not 8 bytes".into()))?;
    Ok(u64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;
    use verdant_core::{Address, DeliveryMethod};

    fn create_test_store() -> (Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (Arc::new(store), dir)
    }

    fn seed_product(store: &RocksStore, name: &str, price_cents: i64) -> Product {
        let product = Product::new(name.into(), "outerwear".into(), price_cents);
        store.put_product(&product).unwrap();
        product
    }

    fn seed_stock(store: &RocksStore, product: &Product, quantity: i64) -> Stock {
        let stock = Stock::new(product.id, "M".into(), quantity, product.price_cents);
        store.put_stock(&stock).unwrap();
        stock
    }

    fn draft(lines: Vec<CartLine>) -> OrderDraft {
        OrderDraft {
            lines,
            currency: "EUR".into(),
            address: Address {
                line1: "1 Loom Lane".into(),
                line2: None,
                city: "Amsterdam".into(),
                postal_code: "1011AB".into(),
                country: "NL".into(),
            },
            delivery: DeliveryMethod::Standard,
        }
    }

    fn line(product: &Product, stock: &Stock, quantity: u32) -> CartLine {
        CartLine {
            product_id: product.id,
            stock_id: stock.id,
            quantity,
        }
    }

    #[test]
    fn product_crud() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);

        let retrieved = store.get_product(&product.id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Hemp overshirt");
        assert_eq!(retrieved.price_cents, 8900);

        let listed = store.list_products(10, 0).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn stocks_by_product_lists_all_variants() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Linen trousers", 7400);
        let other = seed_product(&store, "Wool beanie", 2400);

        let small = Stock::new(product.id, "S".into(), 4, 7400);
        let medium = Stock::new(product.id, "M".into(), 6, 7400);
        store.put_stock(&small).unwrap();
        store.put_stock(&medium).unwrap();
        seed_stock(&store, &other, 10);

        let stocks = store.stocks_by_product(&product.id).unwrap();
        assert_eq!(stocks.len(), 2);
        assert!(stocks.iter().all(|s| s.product_id == product.id));
    }

    #[test]
    fn adjust_stock_applies_signed_deltas() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Cork belt", 3200);
        let stock = seed_stock(&store, &product, 10);

        assert_eq!(store.adjust_stock(&stock.id, -4).unwrap(), 6);
        assert_eq!(store.adjust_stock(&stock.id, 3).unwrap(), 9);

        let row = store.get_stock(&stock.id).unwrap().unwrap();
        assert_eq!(row.quantity, 9);
    }

    #[test]
    fn adjust_stock_rejects_negative_quantity() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Cork belt", 3200);
        let stock = seed_stock(&store, &product, 3);

        let result = store.adjust_stock(&stock.id, -4);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));

        // The failed delta must not have touched the row.
        let row = store.get_stock(&stock.id).unwrap().unwrap();
        assert_eq!(row.quantity, 3);
    }

    #[test]
    fn account_roundtrip() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let account = Account::new(user_id, "iris@example.com".into());

        store.put_account(&account).unwrap();
        let retrieved = store.get_account(&user_id).unwrap().unwrap();
        assert_eq!(retrieved.email, "iris@example.com");
    }

    #[test]
    fn first_ids_start_at_sequence_start() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.allocate_order_id().unwrap(), OrderId::first());
        assert_eq!(
            store.allocate_order_id().unwrap(),
            OrderId::first().next()
        );
        assert_eq!(store.allocate_item_id().unwrap(), ItemId::first());
    }

    #[test]
    fn concurrent_id_allocation_is_distinct_and_increasing() {
        let (store, _dir) = create_test_store();
        let threads = 8;
        let per_thread = 25;

        let mut handles = Vec::new();
        for _ in 0..threads {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                (0..per_thread)
                    .map(|_| store.allocate_order_id().unwrap())
                    .collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<OrderId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), threads * per_thread);

        all.sort();
        all.dedup();
        assert_eq!(all.len(), threads * per_thread, "duplicate ids issued");

        let max = all.last().unwrap().sequence();
        assert_eq!(max, SEQUENCE_START + (threads * per_thread) as u64 - 1);
    }

    #[test]
    fn counter_seeds_from_existing_records_skipping_malformed() {
        let (store, _dir) = create_test_store();

        // Legacy records written before counters existed: only the keys
        // matter to the seeding scan.
        let cf = store.cf(cf::ORDERS).unwrap();
        store.db.put_cf(&cf, b"OD1000000007", b"legacy").unwrap();
        store.db.put_cf(&cf, b"OD1000000011", b"legacy").unwrap();
        store.db.put_cf(&cf, b"ODcorrupted", b"legacy").unwrap();
        store.db.put_cf(&cf, b"order-junk", b"legacy").unwrap();

        let id = store.allocate_order_id().unwrap();
        assert_eq!(id, OrderId::from_sequence(1_000_000_012));
    }

    #[test]
    fn checkout_decrements_stock_and_writes_items() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let product_a = seed_product(&store, "Hemp overshirt", 8900);
        let product_b = seed_product(&store, "Linen trousers", 7400);
        let stock_a = seed_stock(&store, &product_a, 5);
        let stock_b = seed_stock(&store, &product_b, 5);

        let order = store
            .create_order(
                user_id,
                &draft(vec![
                    line(&product_a, &stock_a, 2),
                    line(&product_b, &stock_b, 1),
                ]),
            )
            .unwrap();

        assert_eq!(order.id, OrderId::first());
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.products.get(&product_a.id), Some(&2));
        assert_eq!(order.products.get(&product_b.id), Some(&1));
        assert_eq!(order.total_cents, 2 * 8900 + 7400);

        assert_eq!(store.get_stock(&stock_a.id).unwrap().unwrap().quantity, 3);
        assert_eq!(store.get_stock(&stock_b.id).unwrap().unwrap().quantity, 4);

        let items = store.items_by_order(&order.id).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.status == ItemStatus::Placed));

        let listed = store.list_orders_by_user(&user_id, 10, 0).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, order.id);
    }

    #[test]
    fn checkout_merges_repeated_product_lines() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Wool beanie", 2400);
        let stock = seed_stock(&store, &product, 10);

        let order = store
            .create_order(
                UserId::generate(),
                &draft(vec![line(&product, &stock, 2), line(&product, &stock, 3)]),
            )
            .unwrap();

        let items = store.items_by_order(&order.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 5);
    }

    #[test]
    fn failed_checkout_leaves_nothing_behind() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let product_a = seed_product(&store, "Hemp overshirt", 8900);
        let product_b = seed_product(&store, "Linen trousers", 7400);
        let stock_a = seed_stock(&store, &product_a, 5);
        let stock_b = seed_stock(&store, &product_b, 1);

        // The second line cannot be satisfied, so the whole checkout must
        // roll back, including the first line's decrement.
        let result = store.create_order(
            user_id,
            &draft(vec![
                line(&product_a, &stock_a, 2),
                line(&product_b, &stock_b, 2),
            ]),
        );
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        assert_eq!(store.get_stock(&stock_a.id).unwrap().unwrap().quantity, 5);
        assert_eq!(store.get_stock(&stock_b.id).unwrap().unwrap().quantity, 1);
        assert!(store.list_orders_by_user(&user_id, 10, 0).unwrap().is_empty());
        assert!(store.get_order(&OrderId::first()).unwrap().is_none());
    }

    #[test]
    fn add_or_update_merges_into_existing_item() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Cork belt", 3200);
        let stock = seed_stock(&store, &product, 10);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 1)]))
            .unwrap();

        let item = store
            .add_or_update_order_item(&order.id, &line(&product, &stock, 2))
            .unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.subtotal_cents, 3 * 3200);

        // Still a single item, no duplicate.
        let items = store.items_by_order(&order.id).unwrap();
        assert_eq!(items.len(), 1);

        let header = store.get_order(&order.id).unwrap().unwrap();
        assert_eq!(header.products.get(&product.id), Some(&3));
        assert_eq!(header.total_cents, 3 * 3200);
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 7);
    }

    #[test]
    fn add_or_update_creates_item_for_new_product() {
        let (store, _dir) = create_test_store();
        let product_a = seed_product(&store, "Cork belt", 3200);
        let product_b = seed_product(&store, "Wool beanie", 2400);
        let stock_a = seed_stock(&store, &product_a, 5);
        let stock_b = seed_stock(&store, &product_b, 5);

        let order = store
            .create_order(
                UserId::generate(),
                &draft(vec![line(&product_a, &stock_a, 1)]),
            )
            .unwrap();

        let item = store
            .add_or_update_order_item(&order.id, &line(&product_b, &stock_b, 2))
            .unwrap();
        assert_eq!(item.product_id, product_b.id);

        let items = store.items_by_order(&order.id).unwrap();
        assert_eq!(items.len(), 2);

        let header = store.get_order(&order.id).unwrap().unwrap();
        assert_eq!(header.total_cents, 3200 + 2 * 2400);
    }

    #[test]
    fn add_or_update_rejects_insufficient_stock_without_side_effects() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Cork belt", 3200);
        let stock = seed_stock(&store, &product, 2);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 1)]))
            .unwrap();

        let result = store.add_or_update_order_item(&order.id, &line(&product, &stock, 5));
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));

        let items = store.items_by_order(&order.id).unwrap();
        assert_eq!(items[0].quantity, 1, "item must not have been updated");
        let header = store.get_order(&order.id).unwrap().unwrap();
        assert_eq!(header.total_cents, 3200);
    }

    #[test]
    fn cancel_item_restores_exactly_the_consumed_quantity() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);
        let stock = seed_stock(&store, &product, 5);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 3)]))
            .unwrap();
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 2);

        let item = store.items_by_order(&order.id).unwrap().remove(0);
        let cancelled = store
            .cancel_order_item(&item.id, "changed my mind", Actor::User)
            .unwrap();

        assert_eq!(cancelled.status, ItemStatus::Cancelled);
        assert_eq!(cancelled.status_actor, Some(Actor::User));
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 5);
    }

    #[test]
    fn cancel_order_restores_stock_and_settles_header() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let product_a = seed_product(&store, "Hemp overshirt", 8900);
        let product_b = seed_product(&store, "Linen trousers", 7400);
        let stock_a = seed_stock(&store, &product_a, 5);
        let stock_b = seed_stock(&store, &product_b, 5);

        let order = store
            .create_order(
                user_id,
                &draft(vec![
                    line(&product_a, &stock_a, 2),
                    line(&product_b, &stock_b, 1),
                ]),
            )
            .unwrap();

        let report = store
            .cancel_order(&order.id, "ordered twice", Actor::User)
            .unwrap();

        assert_eq!(report.cancelled.len(), 2);
        assert!(report.skipped.is_empty());
        assert!(!report.has_failures());
        assert_eq!(report.order_status, OrderStatus::Cancelled);

        assert_eq!(store.get_stock(&stock_a.id).unwrap().unwrap().quantity, 5);
        assert_eq!(store.get_stock(&stock_b.id).unwrap().unwrap().quantity, 5);

        let items = store.items_by_order(&order.id).unwrap();
        assert!(items.iter().all(|i| i.status == ItemStatus::Cancelled));
        assert_eq!(
            store.get_order(&order.id).unwrap().unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn cancel_order_continues_past_unrestorable_items() {
        let (store, _dir) = create_test_store();

        let product_a = seed_product(&store, "Hemp overshirt", 8900);
        let product_b = seed_product(&store, "Linen trousers", 7400);
        let stock_a = seed_stock(&store, &product_a, 5);
        let stock_b = seed_stock(&store, &product_b, 5);

        let order = store
            .create_order(
                UserId::generate(),
                &draft(vec![
                    line(&product_a, &stock_a, 1),
                    line(&product_b, &stock_b, 1),
                ]),
            )
            .unwrap();

        // Simulate an operator deleting one stock row out from under the
        // order.
        let cf_stocks = store.cf(cf::STOCKS).unwrap();
        store
            .db
            .delete_cf(&cf_stocks, keys::stock_key(&stock_a.id))
            .unwrap();

        let report = store
            .cancel_order(&order.id, "warehouse flood", Actor::Admin)
            .unwrap();

        assert_eq!(report.cancelled.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.get_stock(&stock_b.id).unwrap().unwrap().quantity, 5);

        // The failed item is untouched and the order is not cancelled.
        let items = store.items_by_order(&order.id).unwrap();
        let failed = items
            .iter()
            .find(|i| i.stock_id == stock_a.id)
            .unwrap();
        assert_eq!(failed.status, ItemStatus::Placed);
        assert_eq!(
            store.get_order(&order.id).unwrap().unwrap().status,
            OrderStatus::New
        );
    }

    #[test]
    fn return_item_after_delivery_restores_stock() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);
        let stock = seed_stock(&store, &product, 5);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 2)]))
            .unwrap();

        store
            .advance_order_status(&order.id, OrderStatus::Packed)
            .unwrap();
        store
            .advance_order_status(&order.id, OrderStatus::Shipped)
            .unwrap();
        store
            .advance_order_status(&order.id, OrderStatus::Delivered)
            .unwrap();

        let item = store.items_by_order(&order.id).unwrap().remove(0);
        assert_eq!(item.status, ItemStatus::Delivered);

        let returned = store
            .return_order_item(&item.id, "wrong size", Actor::User)
            .unwrap();
        assert_eq!(returned.status, ItemStatus::Returned);
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 5);
    }

    #[test]
    fn delivered_item_cannot_be_cancelled() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);
        let stock = seed_stock(&store, &product, 5);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 1)]))
            .unwrap();
        store
            .advance_order_status(&order.id, OrderStatus::Packed)
            .unwrap();
        store
            .advance_order_status(&order.id, OrderStatus::Shipped)
            .unwrap();

        let item = store.items_by_order(&order.id).unwrap().remove(0);
        let result = store.cancel_order_item(&item.id, "too late", Actor::User);
        assert!(matches!(result, Err(StoreError::InvalidTransition { .. })));

        // No stock came back from the failed cancellation.
        assert_eq!(store.get_stock(&stock.id).unwrap().unwrap().quantity, 4);
    }

    #[test]
    fn advance_rejects_transitions_outside_the_table() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);
        let stock = seed_stock(&store, &product, 5);

        let order = store
            .create_order(UserId::generate(), &draft(vec![line(&product, &stock, 1)]))
            .unwrap();

        let skipped = store.advance_order_status(&order.id, OrderStatus::Delivered);
        assert!(matches!(
            skipped,
            Err(StoreError::InvalidTransition { .. })
        ));

        let cancel_via_advance = store.advance_order_status(&order.id, OrderStatus::Cancelled);
        assert!(matches!(cancel_via_advance, Err(StoreError::Invalid(_))));
    }

    #[test]
    fn concurrent_decrements_leave_no_lost_updates() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Cork belt", 3200);
        let stock = seed_stock(&store, &product, 100);

        let threads = 10;
        let per_thread = 10;

        let mut handles = Vec::new();
        for _ in 0..threads {
            let store = Arc::clone(&store);
            let stock_id = stock.id;
            handles.push(thread::spawn(move || {
                for _ in 0..per_thread {
                    store.adjust_stock(&stock_id, -1).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let row = store.get_stock(&stock.id).unwrap().unwrap();
        assert_eq!(row.quantity, 0);

        // The floor holds once the row is drained.
        assert!(matches!(
            store.adjust_stock(&stock.id, -1),
            Err(StoreError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn concurrent_checkouts_cannot_oversell() {
        let (store, _dir) = create_test_store();
        let product = seed_product(&store, "Hemp overshirt", 8900);
        let stock = seed_stock(&store, &product, 10);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let cart = draft(vec![line(&product, &stock, 3)]);
            handles.push(thread::spawn(move || {
                store.create_order(UserId::generate(), &cart).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        // 10 units at 3 per checkout: exactly three orders fit.
        assert_eq!(successes, 3);
        let row = store.get_stock(&stock.id).unwrap().unwrap();
        assert_eq!(row.quantity, 1);
    }
}
