mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{
    AssignmentClaim, ClaimOutcome, NotificationRecord, Order, OrderStatus,
};
use crate::domain::tenant::{Tenant, TenantStatus};

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ============================================================================
// Store - Single Point of Truth and Concurrency Control
// ============================================================================
//
// The engines above this trait are stateless; every contended mutation is
// expressed as a conditional write the backend must apply atomically:
//
// 1. `route_order` - check-and-set on `routed_to_tenant` false -> true.
//    Exactly one concurrent caller wins; losers see `AlreadyRouted`.
// 2. `transition_order` - the status write succeeds only if the order still
//    holds the status the caller read, and commits the commission snapshot
//    plus tenant aggregate increments in the same transaction.
//
// Callers may be spread across processes, so no in-memory locking above
// this seam counts for anything; the guarantees live in the backend.
//
// ============================================================================

/// Read scope for order listings. Filtering by tenant identity is an
/// authorization rule, not a UI nicety.
#[derive(Debug, Clone, Copy)]
pub enum OrderScope {
    All,
    Tenant(Uuid),
}

/// Commission values to commit alongside a `Delivered` transition.
#[derive(Debug, Clone)]
pub struct SettlementWrite {
    /// `None` for platform-fulfilled orders: snapshot only, no aggregates.
    pub tenant_id: Option<Uuid>,
    pub rate: f64,
    pub amount: i64,
    /// Commissionable base, added to the tenant's `total_revenue`.
    pub base: i64,
}

#[derive(Debug, Clone)]
pub struct StatusWrite {
    pub new_status: OrderStatus,
    pub tracking_number: Option<String>,
    pub settlement: Option<SettlementWrite>,
}

#[derive(Debug)]
pub enum RouteWrite {
    /// This caller won; the returned order reflects the committed route.
    Routed(Order),
    /// A concurrent claim won first, or the order already had an owner.
    AlreadyRouted,
    NotFound,
}

#[derive(Debug)]
pub enum TransitionWrite {
    Applied(Order),
    /// The order no longer holds the status the caller read.
    StaleStatus,
    NotFound,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- orders ---
    async fn insert_order(&self, order: Order) -> Result<()>;
    async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>>;
    async fn route_order(&self, order_id: Uuid, tenant_id: Uuid) -> Result<RouteWrite>;
    async fn transition_order(
        &self,
        order_id: Uuid,
        expected_status: OrderStatus,
        write: StatusWrite,
    ) -> Result<TransitionWrite>;

    // --- tenants ---
    async fn insert_tenant(&self, tenant: Tenant) -> Result<()>;
    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>>;
    async fn update_tenant_status(&self, tenant_id: Uuid, status: TenantStatus) -> Result<bool>;
    async fn update_commission_rate(&self, tenant_id: Uuid, rate: f64) -> Result<bool>;

    // --- broadcast claims ---
    async fn put_claim(&self, claim: AssignmentClaim) -> Result<()>;
    async fn get_claim(&self, order_id: Uuid) -> Result<Option<AssignmentClaim>>;
    async fn close_claim(&self, order_id: Uuid, outcome: ClaimOutcome) -> Result<()>;

    // --- notification log ---
    async fn append_notification(&self, record: NotificationRecord) -> Result<()>;
    async fn notifications_for(&self, order_id: Uuid) -> Result<Vec<NotificationRecord>>;
}
