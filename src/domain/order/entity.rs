use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{
    CustomerContact, OrderItem, OrderStatus, PaymentStatus, Pricing, ShippingAddress,
};

// ============================================================================
// Order Entity - Source of Truth for Routing, Status and Commission
// ============================================================================
//
// Orders are created by the checkout collaborator in `Pending` and mutated
// only through the assignment engine (tenant fields) and the status engine
// (status, commission snapshot). Orders are never deleted; cancellation is
// a terminal status, not a removal.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer: CustomerContact,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    #[serde(flatten)]
    pub pricing: Pricing,
    pub order_status: OrderStatus,

    // Routing. `routed_to_tenant == true` implies `tenant_id` is set;
    // `None` with `routed_to_tenant == false` means unassigned or
    // platform-fulfilled.
    pub tenant_id: Option<Uuid>,
    pub is_multi_tenant: bool,
    pub routed_to_tenant: bool,

    // Commission snapshot, populated only at settlement and immutable
    // afterwards. Set iff `order_status == Delivered`.
    pub commission_rate: Option<f64>,
    pub commission_amount: Option<i64>,

    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

impl Order {
    /// Validate and construct a new order in `Pending`. If checkout already
    /// resolved single-tenant ownership the order starts routed.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        customer: CustomerContact,
        shipping_address: ShippingAddress,
        items: Vec<OrderItem>,
        payment_method: String,
        payment_status: PaymentStatus,
        pricing: Pricing,
        tenant_id: Option<Uuid>,
        is_multi_tenant: bool,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::Invalid("order items cannot be empty".into()));
        }
        for item in &items {
            if item.quantity <= 0 {
                return Err(OrderError::Invalid(format!(
                    "invalid quantity {} for item {}",
                    item.quantity, item.name
                )));
            }
            if item.price < 0 {
                return Err(OrderError::Invalid(format!(
                    "negative price for item {}",
                    item.name
                )));
            }
        }
        if !pricing.is_consistent() {
            return Err(OrderError::Invalid(format!(
                "totalPrice {} does not match priced components {}",
                pricing.total_price,
                pricing.computed_total()
            )));
        }

        let now = Utc::now();
        let order = Self {
            id: Uuid::new_v4(),
            customer,
            shipping_address,
            items,
            payment_method,
            payment_status,
            pricing,
            order_status: OrderStatus::Pending,
            routed_to_tenant: tenant_id.is_some(),
            tenant_id,
            is_multi_tenant,
            commission_rate: None,
            commission_amount: None,
            tracking_number: None,
            created_at: now,
            status_changed_at: now,
        };
        order.check_invariants()?;
        Ok(order)
    }

    /// Structural invariants that must hold at every observed state.
    pub fn check_invariants(&self) -> Result<(), OrderError> {
        if !self.pricing.is_consistent() {
            return Err(OrderError::Invalid(
                "totalPrice diverged from priced components".into(),
            ));
        }
        // Discounts may never push the order below zero; a negative base
        // would settle negative commission.
        if self.pricing.total_price < 0 {
            return Err(OrderError::Invalid(format!(
                "totalPrice cannot be negative: {}",
                self.pricing.total_price
            )));
        }
        if self.routed_to_tenant != self.tenant_id.is_some() {
            return Err(OrderError::Invalid(
                "routedToTenant flag out of sync with tenantId".into(),
            ));
        }
        let settled = self.commission_rate.is_some() && self.commission_amount.is_some();
        if settled != (self.order_status == OrderStatus::Delivered) {
            return Err(OrderError::Invalid(
                "commission snapshot must be present exactly when Delivered".into(),
            ));
        }
        Ok(())
    }

    pub fn owned_by(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
