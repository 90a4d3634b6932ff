use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, OrderId, OrderLineId, Version};
use domain::{Customer, Order, OrderLine, OrderParts, OrderStatus, ProductId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{CustomerRepository, OrderRepository, OrderStoreError, PageRequest, Result};

const ORDER_COLUMNS: &str =
    "id, customer_id, customer_ref, status, version, created_at, updated_at";

/// PostgreSQL-backed order repository.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new repository over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn to_u32(column: &'static str, value: i32) -> Result<u32> {
        u32::try_from(value).map_err(|_| OrderStoreError::CorruptColumn {
            column,
            value: i64::from(value),
        })
    }

    fn to_i32(column: &'static str, value: impl Into<i64>) -> Result<i32> {
        let value = value.into();
        i32::try_from(value).map_err(|_| OrderStoreError::CorruptColumn { column, value })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        let line = OrderLine::restore(
            OrderLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            ProductId::new(row.try_get::<String, _>("product_id")?),
            Self::to_u32("order_quantity", row.try_get("order_quantity")?)?,
            Self::to_u32("quantity_allocated", row.try_get("quantity_allocated")?)?,
        )?;
        Ok(line)
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let status: String = row.try_get("status")?;

        Ok(Order::from(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            customer_ref: row.try_get("customer_ref")?,
            status: status.parse()?,
            lines,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    /// Loads the lines of several orders, grouped by order id.
    async fn load_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, order_quantity, quantity_allocated
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            grouped
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.load_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn save(&self, mut order: Order) -> Result<Order> {
        let order_id = order.id();
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let actual = Version::new(current.unwrap_or(0));
        if actual != order.version() {
            return Err(OrderStoreError::ConcurrencyConflict {
                order_id,
                expected: order.version(),
                actual,
            });
        }

        let next = actual.next();
        let now = Utc::now();

        if current.is_none() {
            sqlx::query(
                r#"
                INSERT INTO orders (id, customer_id, customer_ref, status, version, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(order.customer_id().as_uuid())
            .bind(order.customer_ref())
            .bind(order.status().as_str())
            .bind(next.as_i64())
            .bind(order.created_at())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent insert of the same id lost the race
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("orders_pkey")
                {
                    return OrderStoreError::ConcurrencyConflict {
                        order_id,
                        expected: Version::initial(),
                        actual: Version::first(),
                    };
                }
                OrderStoreError::Database(e)
            })?;
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET customer_ref = $2, status = $3, version = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(order.customer_ref())
            .bind(order.status().as_str())
            .bind(next.as_i64())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, position, product_id, order_quantity, quantity_allocated)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET quantity_allocated = EXCLUDED.quantity_allocated
                "#,
            )
            .bind(line.id().as_uuid())
            .bind(order_id.as_uuid())
            .bind(Self::to_i32("position", i64::try_from(position).unwrap_or(i64::MAX))?)
            .bind(line.product_id().as_str())
            .bind(Self::to_i32("order_quantity", line.order_quantity())?)
            .bind(Self::to_i32("quantity_allocated", line.quantity_allocated())?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        order.mark_persisted(next, now);
        tracing::debug!(%order_id, status = %order.status(), version = %next, "order saved");
        Ok(order)
    }

    async fn find_by_customer(
        &self,
        customer_id: CustomerId,
        page: PageRequest,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(customer_id.as_uuid())
        .bind(i64::from(page.size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }

    async fn count_by_customer(&self, customer_id: CustomerId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn find_all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(rows).await
    }
}

/// PostgreSQL-backed customer repository.
#[derive(Clone)]
pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name FROM customers WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Customer {
                id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn save(&self, customer: Customer) -> Result<Customer> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }
}
