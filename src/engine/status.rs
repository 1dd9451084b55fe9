use std::sync::Arc;

use uuid::Uuid;

use crate::domain::order::{NotifyChannel, Order, OrderError, OrderStatus};
use crate::metrics::Metrics;
use crate::notify::{Dispatcher, NotifySummary};
use crate::store::{SettlementWrite, StatusWrite, Store, TransitionWrite};

use super::{commission, CallerContext, CallerRole, EngineError};

// ============================================================================
// Status State Machine
// ============================================================================
//
// Validates and applies order-status transitions per caller role. Platform
// admins may jump anywhere except out of a terminal state; the owning tenant
// may only advance one step along the canonical sequence. Entering
// `Delivered` settles commission in the same store transaction as the
// status write - partial application is not an acceptable outcome.
//
// ============================================================================

/// Result of a committed transition. The notification summary is the
/// partial-success side of the operation: a failed send never rolls the
/// status back.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub order: Order,
    pub notification: Option<NotifySummary>,
    /// True when the call was an idempotent re-entry of a terminal state.
    pub no_op: bool,
}

pub struct StatusEngine {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
}

impl StatusEngine {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<Dispatcher>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            dispatcher,
            metrics,
        }
    }

    pub async fn transition(
        &self,
        ctx: CallerContext,
        order_id: Uuid,
        new_status: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<TransitionOutcome, EngineError> {
        if let Some(tracking) = &tracking_number {
            if tracking.trim().is_empty() {
                return Err(OrderError::Invalid("tracking number cannot be empty".into()).into());
            }
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        let current = order.order_status;

        // Re-entering the current status is a no-op, not a re-application;
        // in particular Delivered -> Delivered must not settle twice.
        if new_status == current {
            return Ok(TransitionOutcome {
                order,
                notification: None,
                no_op: true,
            });
        }

        // No transitions are legal out of a terminal state, for any role.
        if current.is_terminal() {
            return Err(OrderError::IllegalTransition {
                from: current,
                to: new_status,
            }
            .into());
        }

        self.authorize(ctx, &order, current, new_status)?;

        let settlement = if new_status == OrderStatus::Delivered {
            Some(self.prepare_settlement(&order).await?)
        } else {
            None
        };
        let settled_amount = settlement.as_ref().map(|s| s.amount);

        let write = StatusWrite {
            new_status,
            tracking_number,
            settlement,
        };
        let updated = match self.store.transition_order(order_id, current, write).await {
            Ok(TransitionWrite::Applied(order)) => order,
            Ok(TransitionWrite::StaleStatus) => {
                self.metrics.transition_conflicts.inc();
                return Err(OrderError::ConcurrentModification.into());
            }
            Ok(TransitionWrite::NotFound) => return Err(OrderError::NotFound(order_id).into()),
            // The settlement write could not complete; the triggering
            // transition aborts with it.
            Err(error) if new_status == OrderStatus::Delivered => {
                return Err(OrderError::SettlementFailure(error.to_string()).into())
            }
            Err(error) => return Err(error.into()),
        };

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %new_status,
            "order status transitioned"
        );
        self.metrics.record_transition(new_status.as_str());
        if let Some(amount) = settled_amount {
            self.metrics.record_settlement(amount);
        }

        let notification = self
            .dispatcher
            .notify_status(&updated, &[NotifyChannel::Email], new_status, None)
            .await;

        Ok(TransitionOutcome {
            order: updated,
            notification: Some(notification),
            no_op: false,
        })
    }

    fn authorize(
        &self,
        ctx: CallerContext,
        order: &Order,
        current: OrderStatus,
        new_status: OrderStatus,
    ) -> Result<(), EngineError> {
        match ctx.role {
            // Administrative override: any target, including skips.
            CallerRole::Admin => Ok(()),
            CallerRole::Tenant => {
                let tenant_id = ctx
                    .tenant_id
                    .ok_or_else(|| OrderError::Invalid("tenant caller without id".into()))?;
                if !order.owned_by(tenant_id) {
                    return Err(OrderError::NotOwner.into());
                }
                // Owning tenant may only advance one canonical step.
                if current.next() != Some(new_status) {
                    return Err(OrderError::IllegalTransition {
                        from: current,
                        to: new_status,
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    /// Snapshot the owning tenant's rate for this delivery. Fails closed
    /// when the tenant record is missing; platform-fulfilled orders settle
    /// a zero snapshot with no aggregate bump.
    async fn prepare_settlement(&self, order: &Order) -> Result<SettlementWrite, EngineError> {
        let base = order.pricing.total_price;
        match order.tenant_id {
            Some(tenant_id) => {
                let tenant = self.store.get_tenant(tenant_id).await?.ok_or_else(|| {
                    OrderError::SettlementFailure(format!("tenant record missing: {tenant_id}"))
                })?;
                let settlement = commission::settle(base, tenant.commission_rate);
                Ok(SettlementWrite {
                    tenant_id: Some(tenant_id),
                    rate: settlement.rate,
                    amount: settlement.commission,
                    base,
                })
            }
            None => Ok(SettlementWrite {
                tenant_id: None,
                rate: 0.0,
                amount: 0,
                base,
            }),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
