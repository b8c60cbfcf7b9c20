//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | StoreError |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `UniqueViolation { constraint }` |
//! | Database (other) | any | `Backend` |
//! | Column decode / not found | n/a | `Corrupt` |
//! | PoolClosed, IO, other | n/a | `Backend` |
//!
//! ## Concurrency
//!
//! Claims lock one candidate row with `FOR UPDATE SKIP LOCKED`, so concurrent
//! claims for the same product pick different garments. Basket writers take a
//! transaction-scoped advisory lock on the basket key. Aggregate rows carry a
//! `version` column checked on every update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use seasons_core::{
    BoxId, BoxItemId, DomainError, ExpectedVersion, InventoryItemId, ProductSlug,
    Sku, SubscriptionId, UserId,
};
use seasons_inventory::{InventoryItem, InventoryItemSnapshot, InventoryState, InventoryStats};
use seasons_subscriptions::{
    BasketKey, BoxItem, RentalBox, RentalBoxSnapshot, SelectionBasket, ShippingDetails,
    Subscription, SubscriptionSnapshot,
};

use super::r#trait::{Claim, Store, StoreError, StoreTx};

const SCHEMA: &str = include_str!("../../migrations/0001_rental_core.sql");

const ITEM_COLUMNS: &str = "id, product_slug, sku, state::text AS state, condition_notes, \
     quarantine_until, retirement_reason, version, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, status::text AS status, cycle_start_date, \
     cycle_end_date, next_billing_date, version, created_at, updated_at";

const BOX_COLUMNS: &str = "id, subscription_id, cycle_number, start_date, end_date, \
     return_by_date, status::text AS status, return_label_url, version, created_at, updated_at";

/// Eligibility predicate; `$2` is today's date.
const ELIGIBLE: &str = "((state = 'available' AND (quarantine_until IS NULL OR quarantine_until < $2)) \
     OR (state = 'quarantine' AND quarantine_until < $2))";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema (idempotent).
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTx { tx })
    }
}

pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl core::fmt::Debug for PostgresTx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostgresTx").finish_non_exhaustive()
    }
}

fn basket_table(key: BasketKey) -> (&'static str, &'static str, Uuid) {
    match key {
        BasketKey::Cart(user) => ("cart_items", "user_id", *user.as_uuid()),
        BasketKey::Swap(subscription) => ("swap_items", "subscription_id", *subscription.as_uuid()),
    }
}

fn expected_version(expected: ExpectedVersion) -> Result<Option<i64>, StoreError> {
    match expected {
        ExpectedVersion::Any => Ok(None),
        ExpectedVersion::Exact(v) => to_i64(v).map(Some),
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    #[instrument(skip(self, item), fields(item_id = %item.id_typed(), sku = %item.sku()), err)]
    async fn insert_item(&mut self, item: &InventoryItem) -> Result<(), StoreError> {
        let s = item.snapshot();
        sqlx::query(
            r#"
            INSERT INTO inventory_items
                (id, product_slug, sku, state, condition_notes, quarantine_until,
                 retirement_reason, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4::inventory_state, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.product.as_str())
        .bind(s.sku.as_str())
        .bind(s.state.as_str())
        .bind(s.condition_notes.as_deref())
        .bind(s.quarantine_until)
        .bind(s.retirement_reason.as_deref())
        .bind(to_i64(s.version)?)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    async fn load_item(&mut self, id: InventoryItemId) -> Result<Option<InventoryItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id_typed(), expected = ?expected), err)]
    async fn update_item(
        &mut self,
        item: &InventoryItem,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let s = item.snapshot();
        let result = sqlx::query(
            r#"
            UPDATE inventory_items
            SET state = $2::inventory_state,
                condition_notes = $3,
                quarantine_until = $4,
                retirement_reason = $5,
                version = $6,
                updated_at = $7
            WHERE id = $1 AND ($8::bigint IS NULL OR version = $8)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.state.as_str())
        .bind(s.condition_notes.as_deref())
        .bind(s.quarantine_until)
        .bind(s.retirement_reason.as_deref())
        .bind(to_i64(s.version)?)
        .bind(s.updated_at)
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Stale(format!(
                "inventory item {} changed concurrently (expected {expected:?})",
                s.id
            )));
        }
        Ok(())
    }

    async fn list_items(
        &mut self,
        product: Option<&ProductSlug>,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE ($1::text IS NULL OR product_slug = $1) \
             ORDER BY created_at ASC, sku ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product.map(ProductSlug::as_str))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self), fields(product = %product, claimed = tracing::field::Empty), err)]
    async fn claim_one_available(
        &mut self,
        product: &ProductSlug,
        now: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        let sql = format!(
            r#"
            UPDATE inventory_items AS i
            SET state = 'active',
                quarantine_until = NULL,
                version = i.version + 1,
                updated_at = $3
            FROM (
                SELECT id, state AS prior_state
                FROM inventory_items
                WHERE product_slug = $1 AND {ELIGIBLE}
                ORDER BY created_at ASC, sku ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            ) AS picked
            WHERE i.id = picked.id
            RETURNING i.id, i.product_slug, i.sku, i.state::text AS state, i.condition_notes,
                      i.quarantine_until, i.retirement_reason, i.version, i.created_at,
                      i.updated_at, picked.prior_state::text AS prior_state
            "#
        );
        let row = sqlx::query(&sql)
            .bind(product.as_str())
            .bind(now.date_naive())
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("claim_one_available", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let item = item_from_row(&row)?;
        let prior_state = parse_enum::<InventoryState>(&row, "prior_state")?;
        Span::current().record("claimed", tracing::field::display(item.id_typed()));
        Ok(Some(Claim { item, prior_state }))
    }

    #[instrument(skip(self, products), fields(product_count = products.len()), err)]
    async fn count_available(
        &mut self,
        products: &[ProductSlug],
        today: NaiveDate,
    ) -> Result<HashMap<ProductSlug, u64>, StoreError> {
        if products.is_empty() {
            return Ok(HashMap::new());
        }
        let slugs: Vec<String> = products.iter().map(|p| p.as_str().to_string()).collect();
        let sql = format!(
            "SELECT product_slug, COUNT(*) AS available FROM inventory_items \
             WHERE product_slug = ANY($1) AND {ELIGIBLE} \
             GROUP BY product_slug"
        );
        let rows = sqlx::query(&sql)
            .bind(&slugs)
            .bind(today)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_available", e))?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in &rows {
            let slug = parse_slug(get::<String>(row, "product_slug")?)?;
            counts.insert(slug, to_u64(get::<i64>(row, "available")?)?);
        }
        Ok(counts)
    }

    async fn inventory_stats(&mut self, today: NaiveDate) -> Result<InventoryStats, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT state::text AS state,
                   COUNT(*) AS n,
                   COUNT(*) FILTER (WHERE state = 'quarantine' AND quarantine_until < $1) AS elapsed
            FROM inventory_items
            GROUP BY state
            "#,
        )
        .bind(today)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("inventory_stats", e))?;

        let mut stats = InventoryStats::default();
        for row in &rows {
            let state = parse_enum::<InventoryState>(row, "state")?;
            stats.record(state, to_u64(get::<i64>(row, "n")?)?);
            stats.quarantine_elapsed += to_u64(get::<i64>(row, "elapsed")?)?;
        }
        Ok(stats)
    }

    async fn lock_basket(&mut self, key: BasketKey) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.lock_key())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_basket", e))?;
        Ok(())
    }

    async fn load_basket(&mut self, key: BasketKey) -> Result<SelectionBasket, StoreError> {
        let (table, owner, id) = basket_table(key);
        let sql = format!("SELECT product_slug FROM {table} WHERE {owner} = $1 ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_basket", e))?;
        let slugs = rows
            .iter()
            .map(|row| get::<String>(row, "product_slug").and_then(parse_slug))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SelectionBasket::new(key, slugs))
    }

    async fn add_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
        added_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (table, owner, id) = basket_table(key);
        let sql =
            format!("INSERT INTO {table} ({owner}, product_slug, added_at) VALUES ($1, $2, $3)");
        sqlx::query(&sql)
            .bind(id)
            .bind(product.as_str())
            .bind(added_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("add_basket_item", e))?;
        Ok(())
    }

    async fn remove_basket_item(
        &mut self,
        key: BasketKey,
        product: &ProductSlug,
    ) -> Result<bool, StoreError> {
        let (table, owner, id) = basket_table(key);
        let sql = format!("DELETE FROM {table} WHERE {owner} = $1 AND product_slug = $2");
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(product.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("remove_basket_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_basket(&mut self, key: BasketKey) -> Result<u64, StoreError> {
        let (table, owner, id) = basket_table(key);
        let sql = format!("DELETE FROM {table} WHERE {owner} = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("clear_basket", e))?;
        Ok(result.rows_affected())
    }

    async fn upsert_shipping_details(
        &mut self,
        user: UserId,
        details: &ShippingDetails,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (user_id, shipping_address, phone, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET shipping_address = EXCLUDED.shipping_address,
                phone = EXCLUDED.phone,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.as_uuid())
        .bind(details.address())
        .bind(details.phone())
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_shipping_details", e))?;
        Ok(())
    }

    async fn load_shipping_details(
        &mut self,
        user: UserId,
    ) -> Result<Option<ShippingDetails>, StoreError> {
        let row = sqlx::query("SELECT shipping_address, phone FROM customers WHERE user_id = $1")
            .bind(user.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_shipping_details", e))?;
        row.map(|row| {
            ShippingDetails::new(
                get::<String>(&row, "shipping_address")?,
                get::<Option<String>>(&row, "phone")?,
            )
            .map_err(corrupt)
        })
        .transpose()
    }

    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id_typed()), err)]
    async fn insert_subscription(&mut self, subscription: &Subscription) -> Result<(), StoreError> {
        let s = subscription.snapshot();
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (id, user_id, status, cycle_start_date, cycle_end_date, next_billing_date,
                 version, created_at, updated_at)
            VALUES ($1, $2, $3::subscription_status, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.user_id.as_uuid())
        .bind(s.status.as_str())
        .bind(s.cycle_start)
        .bind(s.cycle_end)
        .bind(s.next_billing)
        .bind(to_i64(s.version)?)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_subscription", e))?;
        Ok(())
    }

    async fn load_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<Subscription>, StoreError> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_subscription", e))?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    async fn subscriptions_for_user(
        &mut self,
        user: UserId,
    ) -> Result<Vec<Subscription>, StoreError> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("subscriptions_for_user", e))?;
        rows.iter().map(subscription_from_row).collect()
    }

    async fn list_subscriptions(&mut self) -> Result<Vec<Subscription>, StoreError> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_subscriptions", e))?;
        rows.iter().map(subscription_from_row).collect()
    }

    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id_typed(), expected = ?expected), err)]
    async fn update_subscription(
        &mut self,
        subscription: &Subscription,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let s = subscription.snapshot();
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2::subscription_status,
                cycle_start_date = $3,
                cycle_end_date = $4,
                next_billing_date = $5,
                version = $6,
                updated_at = $7
            WHERE id = $1 AND ($8::bigint IS NULL OR version = $8)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.status.as_str())
        .bind(s.cycle_start)
        .bind(s.cycle_end)
        .bind(s.next_billing)
        .bind(to_i64(s.version)?)
        .bind(s.updated_at)
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Stale(format!(
                "subscription {} changed concurrently (expected {expected:?})",
                s.id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, rental_box), fields(box_id = %rental_box.id_typed(), cycle = rental_box.cycle_number()), err)]
    async fn insert_box(&mut self, rental_box: &RentalBox) -> Result<(), StoreError> {
        let s = rental_box.snapshot();
        sqlx::query(
            r#"
            INSERT INTO boxes
                (id, subscription_id, cycle_number, start_date, end_date, return_by_date,
                 status, return_label_url, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7::box_status, $8, $9, $10, $11)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.subscription_id.as_uuid())
        .bind(cycle_to_i32(s.cycle_number)?)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.return_by_date)
        .bind(s.status.as_str())
        .bind(s.return_label_url.as_deref())
        .bind(to_i64(s.version)?)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_box", e))?;
        Ok(())
    }

    async fn load_box(&mut self, id: BoxId) -> Result<Option<RentalBox>, StoreError> {
        let sql = format!("SELECT {BOX_COLUMNS} FROM boxes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_box", e))?;
        row.as_ref().map(box_from_row).transpose()
    }

    async fn boxes_for_subscription(
        &mut self,
        subscription: SubscriptionId,
    ) -> Result<Vec<RentalBox>, StoreError> {
        let sql = format!(
            "SELECT {BOX_COLUMNS} FROM boxes WHERE subscription_id = $1 ORDER BY cycle_number ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(subscription.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("boxes_for_subscription", e))?;
        rows.iter().map(box_from_row).collect()
    }

    #[instrument(skip(self, rental_box), fields(box_id = %rental_box.id_typed(), expected = ?expected), err)]
    async fn update_box(
        &mut self,
        rental_box: &RentalBox,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let s = rental_box.snapshot();
        let result = sqlx::query(
            r#"
            UPDATE boxes
            SET status = $2::box_status,
                return_label_url = $3,
                version = $4,
                updated_at = $5
            WHERE id = $1 AND ($6::bigint IS NULL OR version = $6)
            "#,
        )
        .bind(s.id.as_uuid())
        .bind(s.status.as_str())
        .bind(s.return_label_url.as_deref())
        .bind(to_i64(s.version)?)
        .bind(s.updated_at)
        .bind(expected_version(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_box", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Stale(format!(
                "box {} changed concurrently (expected {expected:?})",
                s.id
            )));
        }
        Ok(())
    }

    async fn insert_box_item(&mut self, item: &BoxItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO box_items (id, box_id, inventory_item_id, product_slug, added_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.box_id.as_uuid())
        .bind(item.inventory_item_id.as_uuid())
        .bind(item.product.as_str())
        .bind(item.added_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_box_item", e))?;
        Ok(())
    }

    async fn box_items(&mut self, box_id: BoxId) -> Result<Vec<BoxItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, box_id, inventory_item_id, product_slug, added_at
            FROM box_items
            WHERE box_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(box_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("box_items", e))?;

        rows.iter()
            .map(|row| {
                Ok(BoxItem {
                    id: BoxItemId::from_uuid(get(row, "id")?),
                    box_id: BoxId::from_uuid(get(row, "box_id")?),
                    inventory_item_id: InventoryItemId::from_uuid(get(row, "inventory_item_id")?),
                    product: parse_slug(get(row, "product_slug")?)?,
                    added_at: get(row, "added_at")?,
                })
            })
            .collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

// ── row decoding ───────────────────────────────────────────────────────────

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn parse_enum<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr<Err = DomainError>,
{
    get::<String>(row, column)?.parse().map_err(corrupt)
}

fn parse_slug(raw: String) -> Result<ProductSlug, StoreError> {
    ProductSlug::parse(raw).map_err(corrupt)
}

fn corrupt(err: DomainError) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative counter: {value}")))
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("counter overflow: {value}")))
}

fn cycle_to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("cycle number overflow: {value}")))
}

fn item_from_row(row: &PgRow) -> Result<InventoryItem, StoreError> {
    let snapshot = InventoryItemSnapshot {
        id: InventoryItemId::from_uuid(get(row, "id")?),
        product: parse_slug(get(row, "product_slug")?)?,
        sku: Sku::parse(get::<String>(row, "sku")?).map_err(corrupt)?,
        state: parse_enum(row, "state")?,
        condition_notes: get(row, "condition_notes")?,
        quarantine_until: get(row, "quarantine_until")?,
        retirement_reason: get(row, "retirement_reason")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        version: to_u64(get(row, "version")?)?,
    };
    InventoryItem::restore(snapshot).map_err(corrupt)
}

fn subscription_from_row(row: &PgRow) -> Result<Subscription, StoreError> {
    let snapshot = SubscriptionSnapshot {
        id: SubscriptionId::from_uuid(get(row, "id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        status: parse_enum(row, "status")?,
        cycle_start: get(row, "cycle_start_date")?,
        cycle_end: get(row, "cycle_end_date")?,
        next_billing: get(row, "next_billing_date")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        version: to_u64(get(row, "version")?)?,
    };
    Subscription::restore(snapshot).map_err(corrupt)
}

fn box_from_row(row: &PgRow) -> Result<RentalBox, StoreError> {
    let cycle: i32 = get(row, "cycle_number")?;
    let snapshot = RentalBoxSnapshot {
        id: BoxId::from_uuid(get(row, "id")?),
        subscription_id: SubscriptionId::from_uuid(get(row, "subscription_id")?),
        cycle_number: u32::try_from(cycle)
            .map_err(|_| StoreError::Corrupt(format!("negative cycle number: {cycle}")))?,
        start_date: get(row, "start_date")?,
        end_date: get(row, "end_date")?,
        return_by_date: get(row, "return_by_date")?,
        status: parse_enum(row, "status")?,
        return_label_url: get(row, "return_label_url")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        version: to_u64(get(row, "version")?)?,
    };
    RentalBox::restore(snapshot).map_err(corrupt)
}

/// Map SQLx errors to store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                StoreError::unique(db_err.constraint().unwrap_or("unknown"))
            } else {
                StoreError::backend(operation, db_err.message())
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other),
    }
}
