use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::order::{
    AssignmentClaim, ClaimOutcome, NotificationRecord, Order, OrderStatus,
};
use crate::domain::tenant::{Tenant, TenantStatus};

use super::{OrderScope, RouteWrite, StatusWrite, Store, TransitionWrite};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Backs demo mode and the concurrency tests. One mutex guards orders,
// tenants, claims and the notification log together, so every conditional
// write the trait promises to be atomic is a single critical section here.
//
// ============================================================================

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    tenants: HashMap<Uuid, Tenant>,
    claims: HashMap<Uuid, AssignmentClaim>,
    notifications: Vec<NotificationRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        order.check_invariants()?;
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.id) {
            bail!("order already exists: {}", order.id);
        }
        inner.orders.insert(order.id, order);
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let inner = self.inner.lock().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| match scope {
                OrderScope::All => true,
                OrderScope::Tenant(tenant_id) => o.tenant_id == Some(tenant_id),
            })
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    async fn route_order(&self, order_id: Uuid, tenant_id: Uuid) -> Result<RouteWrite> {
        let mut inner = self.inner.lock().await;
        let order = match inner.orders.get_mut(&order_id) {
            Some(order) => order,
            None => return Ok(RouteWrite::NotFound),
        };
        // Check-and-set under the store lock: the one genuine race.
        if order.routed_to_tenant {
            return Ok(RouteWrite::AlreadyRouted);
        }
        order.tenant_id = Some(tenant_id);
        order.routed_to_tenant = true;
        Ok(RouteWrite::Routed(order.clone()))
    }

    async fn transition_order(
        &self,
        order_id: Uuid,
        expected_status: OrderStatus,
        write: StatusWrite,
    ) -> Result<TransitionWrite> {
        let mut inner = self.inner.lock().await;

        // Settlement aggregates and the status write must land together;
        // resolve the tenant first so a missing record aborts cleanly.
        if let Some(settlement) = &write.settlement {
            if let Some(tenant_id) = settlement.tenant_id {
                if !inner.tenants.contains_key(&tenant_id) {
                    bail!("settlement tenant not found: {}", tenant_id);
                }
            }
        }

        let order = match inner.orders.get_mut(&order_id) {
            Some(order) => order,
            None => return Ok(TransitionWrite::NotFound),
        };
        if order.order_status != expected_status {
            return Ok(TransitionWrite::StaleStatus);
        }

        order.order_status = write.new_status;
        order.status_changed_at = Utc::now();
        if let Some(tracking) = write.tracking_number {
            order.tracking_number = Some(tracking);
        }
        if let Some(settlement) = &write.settlement {
            order.commission_rate = Some(settlement.rate);
            order.commission_amount = Some(settlement.amount);
        }
        let updated = order.clone();

        if let Some(settlement) = &write.settlement {
            if let Some(tenant_id) = settlement.tenant_id {
                // Existence checked above; increment in place.
                if let Some(tenant) = inner.tenants.get_mut(&tenant_id) {
                    tenant.total_orders += 1;
                    tenant.total_revenue += settlement.base;
                    tenant.total_commission += settlement.amount;
                }
            }
        }

        Ok(TransitionWrite::Applied(updated))
    }

    async fn insert_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.tenants.contains_key(&tenant.id) {
            bail!("tenant already exists: {}", tenant.id);
        }
        inner.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        let inner = self.inner.lock().await;
        Ok(inner.tenants.get(&tenant_id).cloned())
    }

    async fn update_tenant_status(&self, tenant_id: Uuid, status: TenantStatus) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_commission_rate(&self, tenant_id: Uuid, rate: f64) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.tenants.get_mut(&tenant_id) {
            Some(tenant) => {
                tenant.commission_rate = rate;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_claim(&self, claim: AssignmentClaim) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.claims.insert(claim.order_id, claim);
        Ok(())
    }

    async fn get_claim(&self, order_id: Uuid) -> Result<Option<AssignmentClaim>> {
        let inner = self.inner.lock().await;
        Ok(inner.claims.get(&order_id).cloned())
    }

    async fn close_claim(&self, order_id: Uuid, outcome: ClaimOutcome) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(claim) = inner.claims.get_mut(&order_id) {
            claim.outcome = outcome;
        }
        Ok(())
    }

    async fn append_notification(&self, record: NotificationRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.notifications.push(record);
        Ok(())
    }

    async fn notifications_for(&self, order_id: Uuid) -> Result<Vec<NotificationRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .notifications
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::order::{CustomerContact, OrderItem, PaymentStatus, Pricing, ShippingAddress};

    fn order(total: i64) -> Order {
        Order::place(
            CustomerContact {
                name: "Asha".into(),
                email: "asha@example.com".into(),
                phone: "+919900112233".into(),
            },
            ShippingAddress {
                address: "12 MG Road".into(),
                city: "Bengaluru".into(),
                postal_code: "560001".into(),
                country: "IN".into(),
            },
            vec![OrderItem {
                product_id: Uuid::new_v4(),
                name: "Mug".into(),
                price: total,
                quantity: 1,
                size: None,
                gift_wrap: false,
                custom_photo: None,
            }],
            "card".into(),
            PaymentStatus::Paid,
            Pricing {
                items_price: total,
                packing_price: 0,
                gift_wrap_price: 0,
                shipping_price: 0,
                tax_price: 0,
                discount_price: 0,
                combo_discount: None,
                coupon_code: None,
                coupon_discount: 0,
                total_price: total,
            },
            None,
            false,
        )
        .unwrap()
    }

    fn approved_tenant() -> Tenant {
        let mut tenant =
            Tenant::register("Clay & Kiln".into(), "a@b.c".into(), "+91".into(), 10.0).unwrap();
        tenant.status = TenantStatus::Approved;
        tenant
    }

    #[tokio::test]
    async fn test_route_order_is_first_writer_wins() {
        let store = MemoryStore::new();
        let order = order(100_000);
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(matches!(
            store.route_order(order_id, a).await.unwrap(),
            RouteWrite::Routed(_)
        ));
        assert!(matches!(
            store.route_order(order_id, b).await.unwrap(),
            RouteWrite::AlreadyRouted
        ));

        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.tenant_id, Some(a));
        assert!(stored.routed_to_tenant);
    }

    #[tokio::test]
    async fn test_concurrent_routes_have_exactly_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let order = order(100_000);
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.route_order(order_id, Uuid::new_v4()).await.unwrap()
            }));
        }

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                RouteWrite::Routed(_) => wins += 1,
                RouteWrite::AlreadyRouted => losses += 1,
                RouteWrite::NotFound => panic!("order vanished"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(losses, 15);
    }

    #[tokio::test]
    async fn test_transition_rejects_stale_status() {
        let store = MemoryStore::new();
        let order = order(100_000);
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let write = StatusWrite {
            new_status: OrderStatus::Accepted,
            tracking_number: None,
            settlement: None,
        };
        assert!(matches!(
            store
                .transition_order(order_id, OrderStatus::Pending, write.clone())
                .await
                .unwrap(),
            TransitionWrite::Applied(_)
        ));
        // Second writer still believes the order is Pending.
        assert!(matches!(
            store
                .transition_order(order_id, OrderStatus::Pending, write)
                .await
                .unwrap(),
            TransitionWrite::StaleStatus
        ));
    }

    #[tokio::test]
    async fn test_settlement_updates_tenant_aggregates_atomically() {
        let store = MemoryStore::new();
        let tenant = approved_tenant();
        let tenant_id = tenant.id;
        store.insert_tenant(tenant).await.unwrap();

        let mut order = order(100_000);
        order.tenant_id = Some(tenant_id);
        order.routed_to_tenant = true;
        order.order_status = OrderStatus::OutForDelivery;
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let write = StatusWrite {
            new_status: OrderStatus::Delivered,
            tracking_number: None,
            settlement: Some(super::super::SettlementWrite {
                tenant_id: Some(tenant_id),
                rate: 10.0,
                amount: 10_000,
                base: 100_000,
            }),
        };
        let result = store
            .transition_order(order_id, OrderStatus::OutForDelivery, write)
            .await
            .unwrap();
        let updated = match result {
            TransitionWrite::Applied(order) => order,
            other => panic!("unexpected write result: {:?}", other),
        };
        assert_eq!(updated.commission_amount, Some(10_000));

        let tenant = store.get_tenant(tenant_id).await.unwrap().unwrap();
        assert_eq!(tenant.total_orders, 1);
        assert_eq!(tenant.total_revenue, 100_000);
        assert_eq!(tenant.total_commission, 10_000);
    }

    #[tokio::test]
    async fn test_settlement_fails_closed_when_tenant_missing() {
        let store = MemoryStore::new();
        let mut order = order(100_000);
        let ghost = Uuid::new_v4();
        order.tenant_id = Some(ghost);
        order.routed_to_tenant = true;
        order.order_status = OrderStatus::OutForDelivery;
        let order_id = order.id;
        store.insert_order(order).await.unwrap();

        let write = StatusWrite {
            new_status: OrderStatus::Delivered,
            tracking_number: None,
            settlement: Some(super::super::SettlementWrite {
                tenant_id: Some(ghost),
                rate: 10.0,
                amount: 10_000,
                base: 100_000,
            }),
        };
        let err = store
            .transition_order(order_id, OrderStatus::OutForDelivery, write)
            .await;
        assert!(err.is_err());

        // No partial application: the order must not be left Delivered.
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::OutForDelivery);
        assert!(stored.commission_amount.is_none());
    }

    #[tokio::test]
    async fn test_list_orders_scoped_by_tenant() {
        let store = MemoryStore::new();
        let tenant_id = Uuid::new_v4();

        let mut mine = order(50_000);
        mine.tenant_id = Some(tenant_id);
        mine.routed_to_tenant = true;
        let mine_id = mine.id;
        store.insert_order(mine).await.unwrap();
        store.insert_order(order(70_000)).await.unwrap();

        let all = store.list_orders(OrderScope::All).await.unwrap();
        assert_eq!(all.len(), 2);

        let scoped = store
            .list_orders(OrderScope::Tenant(tenant_id))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, mine_id);
    }

    #[tokio::test]
    async fn test_notification_log_keeps_duplicate_keys() {
        let store = MemoryStore::new();
        let order_id = Uuid::new_v4();
        for _ in 0..2 {
            store
                .append_notification(NotificationRecord::new(
                    order_id,
                    crate::domain::order::NotifyChannel::Email,
                    OrderStatus::Shipped,
                    crate::domain::order::NotificationOutcome::Sent,
                ))
                .await
                .unwrap();
        }
        let records = store.notifications_for(order_id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dedup_key, records[1].dedup_key);
    }
}
