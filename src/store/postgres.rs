use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::order::{
    AssignmentClaim, ClaimOutcome, NotificationOutcome, NotificationRecord, NotifyChannel, Order,
    OrderStatus,
};
use crate::domain::tenant::{Tenant, TenantStatus};

use super::{OrderScope, RouteWrite, StatusWrite, Store, TransitionWrite};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Production backend. The conditional writes the trait promises map onto
// single UPDATE ... WHERE statements (routing) and one transaction covering
// the status write, commission snapshot and tenant aggregate increments
// (settlement). Aggregates are incremented in place in SQL, never
// read-modify-written from a stale snapshot.
//
// ============================================================================

const ORDER_COLUMNS: &str = "id, customer, shipping_address, items, payment_method, \
     payment_status, items_price, packing_price, gift_wrap_price, shipping_price, \
     tax_price, discount_price, combo_discount, coupon_code, coupon_discount, \
     total_price, order_status, tenant_id, is_multi_tenant, routed_to_tenant, \
     commission_rate, commission_amount, tracking_number, created_at, status_changed_at";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connecting to Postgres")?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                customer JSONB NOT NULL,
                shipping_address JSONB NOT NULL,
                items JSONB NOT NULL,
                payment_method TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                items_price BIGINT NOT NULL,
                packing_price BIGINT NOT NULL DEFAULT 0,
                gift_wrap_price BIGINT NOT NULL DEFAULT 0,
                shipping_price BIGINT NOT NULL DEFAULT 0,
                tax_price BIGINT NOT NULL DEFAULT 0,
                discount_price BIGINT NOT NULL DEFAULT 0,
                combo_discount BIGINT,
                coupon_code TEXT,
                coupon_discount BIGINT NOT NULL DEFAULT 0,
                total_price BIGINT NOT NULL,
                order_status TEXT NOT NULL,
                tenant_id UUID,
                is_multi_tenant BOOLEAN NOT NULL DEFAULT FALSE,
                routed_to_tenant BOOLEAN NOT NULL DEFAULT FALSE,
                commission_rate DOUBLE PRECISION,
                commission_amount BIGINT,
                tracking_number TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                status_changed_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tenants (
                id UUID PRIMARY KEY,
                business_name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL,
                status TEXT NOT NULL,
                commission_rate DOUBLE PRECISION NOT NULL,
                total_orders BIGINT NOT NULL DEFAULT 0,
                total_revenue BIGINT NOT NULL DEFAULT 0,
                total_commission BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assignment_claims (
                order_id UUID PRIMARY KEY,
                candidates JSONB NOT NULL,
                outcome JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notification_log (
                id BIGSERIAL PRIMARY KEY,
                order_id UUID NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                outcome JSONB NOT NULL,
                dedup_key TEXT NOT NULL,
                sent_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_tenant ON orders (tenant_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notification_log_order ON notification_log (order_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status_text: String = row.try_get("order_status")?;
    let order_status = OrderStatus::parse(&status_text)
        .ok_or_else(|| anyhow!("unknown order status in store: {status_text}"))?;
    let payment_text: String = row.try_get("payment_status")?;
    let payment_status = serde_json::from_value(serde_json::Value::String(payment_text))?;

    Ok(Order {
        id: row.try_get("id")?,
        customer: serde_json::from_value(row.try_get::<serde_json::Value, _>("customer")?)?,
        shipping_address: serde_json::from_value(
            row.try_get::<serde_json::Value, _>("shipping_address")?,
        )?,
        items: serde_json::from_value(row.try_get::<serde_json::Value, _>("items")?)?,
        payment_method: row.try_get("payment_method")?,
        payment_status,
        pricing: crate::domain::order::Pricing {
            items_price: row.try_get("items_price")?,
            packing_price: row.try_get("packing_price")?,
            gift_wrap_price: row.try_get("gift_wrap_price")?,
            shipping_price: row.try_get("shipping_price")?,
            tax_price: row.try_get("tax_price")?,
            discount_price: row.try_get("discount_price")?,
            combo_discount: row.try_get("combo_discount")?,
            coupon_code: row.try_get("coupon_code")?,
            coupon_discount: row.try_get("coupon_discount")?,
            total_price: row.try_get("total_price")?,
        },
        order_status,
        tenant_id: row.try_get("tenant_id")?,
        is_multi_tenant: row.try_get("is_multi_tenant")?,
        routed_to_tenant: row.try_get("routed_to_tenant")?,
        commission_rate: row.try_get("commission_rate")?,
        commission_amount: row.try_get("commission_amount")?,
        tracking_number: row.try_get("tracking_number")?,
        created_at: row.try_get("created_at")?,
        status_changed_at: row.try_get("status_changed_at")?,
    })
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant> {
    let status_text: String = row.try_get("status")?;
    let status = TenantStatus::parse(&status_text)
        .ok_or_else(|| anyhow!("unknown tenant status in store: {status_text}"))?;
    Ok(Tenant {
        id: row.try_get("id")?,
        business_name: row.try_get("business_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status,
        commission_rate: row.try_get("commission_rate")?,
        total_orders: row.try_get("total_orders")?,
        total_revenue: row.try_get("total_revenue")?,
        total_commission: row.try_get("total_commission")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        order.check_invariants()?;
        sqlx::query(
            "INSERT INTO orders (
                id, customer, shipping_address, items, payment_method, payment_status,
                items_price, packing_price, gift_wrap_price, shipping_price, tax_price,
                discount_price, combo_discount, coupon_code, coupon_discount, total_price,
                order_status, tenant_id, is_multi_tenant, routed_to_tenant,
                commission_rate, commission_amount, tracking_number, created_at, status_changed_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25
            )",
        )
        .bind(order.id)
        .bind(serde_json::to_value(&order.customer)?)
        .bind(serde_json::to_value(&order.shipping_address)?)
        .bind(serde_json::to_value(&order.items)?)
        .bind(&order.payment_method)
        .bind(serde_json::to_value(order.payment_status)?.as_str().map(str::to_owned))
        .bind(order.pricing.items_price)
        .bind(order.pricing.packing_price)
        .bind(order.pricing.gift_wrap_price)
        .bind(order.pricing.shipping_price)
        .bind(order.pricing.tax_price)
        .bind(order.pricing.discount_price)
        .bind(order.pricing.combo_discount)
        .bind(&order.pricing.coupon_code)
        .bind(order.pricing.coupon_discount)
        .bind(order.pricing.total_price)
        .bind(order.order_status.as_str())
        .bind(order.tenant_id)
        .bind(order.is_multi_tenant)
        .bind(order.routed_to_tenant)
        .bind(order.commission_rate)
        .bind(order.commission_amount)
        .bind(&order.tracking_number)
        .bind(order.created_at)
        .bind(order.status_changed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let rows = match scope {
            OrderScope::All => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            OrderScope::Tenant(tenant_id) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 ORDER BY created_at DESC"
                ))
                .bind(tenant_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(order_from_row).collect()
    }

    async fn route_order(&self, order_id: Uuid, tenant_id: Uuid) -> Result<RouteWrite> {
        // The whole race is this one conditional UPDATE.
        let row = sqlx::query(&format!(
            "UPDATE orders SET tenant_id = $2, routed_to_tenant = TRUE
             WHERE id = $1 AND routed_to_tenant = FALSE
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(RouteWrite::Routed(order_from_row(&row)?));
        }
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(order_id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(RouteWrite::AlreadyRouted)
        } else {
            Ok(RouteWrite::NotFound)
        }
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        expected_status: OrderStatus,
        write: StatusWrite,
    ) -> Result<TransitionWrite> {
        let mut tx = self.pool.begin().await?;

        let (rate, amount) = match &write.settlement {
            Some(s) => (Some(s.rate), Some(s.amount)),
            None => (None, None),
        };

        let row = sqlx::query(&format!(
            "UPDATE orders SET
                order_status = $2,
                status_changed_at = NOW(),
                tracking_number = COALESCE($3, tracking_number),
                commission_rate = COALESCE($4, commission_rate),
                commission_amount = COALESCE($5, commission_amount)
             WHERE id = $1 AND order_status = $6
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(write.new_status.as_str())
        .bind(&write.tracking_number)
        .bind(rate)
        .bind(amount)
        .bind(expected_status.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                        .bind(order_id)
                        .fetch_one(&self.pool)
                        .await?;
                return Ok(if exists {
                    TransitionWrite::StaleStatus
                } else {
                    TransitionWrite::NotFound
                });
            }
        };

        if let Some(settlement) = &write.settlement {
            if let Some(tenant_id) = settlement.tenant_id {
                let updated = sqlx::query(
                    "UPDATE tenants SET
                        total_orders = total_orders + 1,
                        total_revenue = total_revenue + $2,
                        total_commission = total_commission + $3
                     WHERE id = $1",
                )
                .bind(tenant_id)
                .bind(settlement.base)
                .bind(settlement.amount)
                .execute(&mut *tx)
                .await?
                .rows_affected();
                if updated != 1 {
                    // Fails closed: no order may be left Delivered without
                    // its commission landing on the tenant.
                    tx.rollback().await?;
                    bail!("settlement tenant not found: {tenant_id}");
                }
            }
        }

        let order = order_from_row(&row)?;
        tx.commit().await?;
        Ok(TransitionWrite::Applied(order))
    }

    async fn insert_tenant(&self, tenant: Tenant) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenants (
                id, business_name, email, phone, status, commission_rate,
                total_orders, total_revenue, total_commission, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(tenant.id)
        .bind(&tenant.business_name)
        .bind(&tenant.email)
        .bind(&tenant.phone)
        .bind(tenant.status.as_str())
        .bind(tenant.commission_rate)
        .bind(tenant.total_orders)
        .bind(tenant.total_revenue)
        .bind(tenant.total_commission)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn update_tenant_status(&self, tenant_id: Uuid, status: TenantStatus) -> Result<bool> {
        let affected = sqlx::query("UPDATE tenants SET status = $2 WHERE id = $1")
            .bind(tenant_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }

    async fn update_commission_rate(&self, tenant_id: Uuid, rate: f64) -> Result<bool> {
        let affected = sqlx::query("UPDATE tenants SET commission_rate = $2 WHERE id = $1")
            .bind(tenant_id)
            .bind(rate)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected == 1)
    }

    async fn put_claim(&self, claim: AssignmentClaim) -> Result<()> {
        sqlx::query(
            "INSERT INTO assignment_claims (order_id, candidates, outcome, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (order_id) DO UPDATE SET
                candidates = EXCLUDED.candidates,
                outcome = EXCLUDED.outcome,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(claim.order_id)
        .bind(serde_json::to_value(&claim.candidates)?)
        .bind(serde_json::to_value(&claim.outcome)?)
        .bind(claim.created_at)
        .bind(claim.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_claim(&self, order_id: Uuid) -> Result<Option<AssignmentClaim>> {
        let row = sqlx::query("SELECT * FROM assignment_claims WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| -> Result<AssignmentClaim> {
            Ok(AssignmentClaim {
                order_id: row.try_get("order_id")?,
                candidates: serde_json::from_value(
                    row.try_get::<serde_json::Value, _>("candidates")?,
                )?,
                outcome: serde_json::from_value(row.try_get::<serde_json::Value, _>("outcome")?)?,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
            })
        })
        .transpose()
    }

    async fn close_claim(&self, order_id: Uuid, outcome: ClaimOutcome) -> Result<()> {
        sqlx::query("UPDATE assignment_claims SET outcome = $2 WHERE order_id = $1")
            .bind(order_id)
            .bind(serde_json::to_value(&outcome)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn append_notification(&self, record: NotificationRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO notification_log (order_id, channel, status, outcome, dedup_key, sent_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.order_id)
        .bind(record.channel.as_str())
        .bind(record.status.as_str())
        .bind(serde_json::to_value(&record.outcome)?)
        .bind(&record.dedup_key)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn notifications_for(&self, order_id: Uuid) -> Result<Vec<NotificationRecord>> {
        let rows = sqlx::query(
            "SELECT order_id, channel, status, outcome, dedup_key, sent_at
             FROM notification_log WHERE order_id = $1 ORDER BY sent_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<NotificationRecord> {
                let channel_text: String = row.try_get("channel")?;
                let channel = match channel_text.as_str() {
                    "email" => NotifyChannel::Email,
                    "whatsapp" => NotifyChannel::Whatsapp,
                    other => bail!("unknown notification channel in store: {other}"),
                };
                let status_text: String = row.try_get("status")?;
                let status = OrderStatus::parse(&status_text)
                    .ok_or_else(|| anyhow!("unknown order status in store: {status_text}"))?;
                let outcome: NotificationOutcome =
                    serde_json::from_value(row.try_get::<serde_json::Value, _>("outcome")?)?;
                Ok(NotificationRecord {
                    order_id: row.try_get("order_id")?,
                    channel,
                    status,
                    outcome,
                    dedup_key: row.try_get("dedup_key")?,
                    sent_at: row.try_get("sent_at")?,
                })
            })
            .collect()
    }
}
