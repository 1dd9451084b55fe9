mod gateway;
mod invoice;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::order::{
    NotificationOutcome, NotificationRecord, NotifyChannel, Order, OrderStatus,
};
use crate::domain::tenant::Tenant;
use crate::metrics::Metrics;
use crate::store::Store;

pub use gateway::{whatsapp_link, EmailGateway, HttpEmailGateway, LogOnlyEmailGateway};
pub use invoice::{InvoiceService, ShareResult};

// ============================================================================
// Notification Dispatcher
// ============================================================================
//
// Best-effort and non-blocking relative to the state machine: a failed send
// never rolls back an order mutation. Every attempt is appended to the
// notification log and reported per channel in the returned summary -
// failures are surfaced, not swallowed, and never auto-retried.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel: NotifyChannel,
    pub outcome: NotificationOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NotifySummary {
    pub results: Vec<ChannelResult>,
}

impl NotifySummary {
    pub fn all_delivered(&self) -> bool {
        self.results
            .iter()
            .all(|r| !matches!(r.outcome, NotificationOutcome::Failed(_)))
    }
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailGateway>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailGateway>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            email,
            metrics,
        }
    }

    fn compose(order: &Order, status: OrderStatus, tracking: Option<&str>) -> (String, String) {
        let subject = format!("Your order is {status}");
        let mut body = match status {
            OrderStatus::Pending => format!(
                "Hi {}, we received your order and are finding a seller for it.",
                order.customer.name
            ),
            OrderStatus::Accepted => format!(
                "Hi {}, a seller has accepted your order and will start preparing it.",
                order.customer.name
            ),
            OrderStatus::Processing => format!(
                "Hi {}, your order is being prepared.",
                order.customer.name
            ),
            OrderStatus::Packed => format!(
                "Hi {}, your order has been packed and is ready to ship.",
                order.customer.name
            ),
            OrderStatus::Shipped => format!(
                "Hi {}, your order has shipped.",
                order.customer.name
            ),
            OrderStatus::OutForDelivery => format!(
                "Hi {}, your order is out for delivery today.",
                order.customer.name
            ),
            OrderStatus::Delivered => format!(
                "Hi {}, your order has been delivered. Thank you for shopping with us!",
                order.customer.name
            ),
            OrderStatus::Cancelled => format!(
                "Hi {}, your order has been cancelled.",
                order.customer.name
            ),
        };
        let tracking = tracking.or(order.tracking_number.as_deref());
        if let Some(tracking) = tracking {
            body.push_str(&format!(" Tracking number: {tracking}."));
        }
        (subject, body)
    }

    /// Send a status notification on the given channels and log every
    /// attempt. Resends for the same (order, status, channel) key are
    /// deliberate and allowed.
    pub async fn notify_status(
        &self,
        order: &Order,
        channels: &[NotifyChannel],
        status: OrderStatus,
        tracking: Option<&str>,
    ) -> NotifySummary {
        let (subject, body) = Self::compose(order, status, tracking);
        let mut summary = NotifySummary::default();

        for &channel in channels {
            let outcome = match channel {
                NotifyChannel::Email => {
                    match self.email.send(&order.customer.email, &subject, &body).await {
                        Ok(()) => NotificationOutcome::Sent,
                        Err(error) => {
                            tracing::warn!(
                                order_id = %order.id,
                                error = %error,
                                "email notification failed"
                            );
                            NotificationOutcome::Failed(error.to_string())
                        }
                    }
                }
                NotifyChannel::Whatsapp => {
                    NotificationOutcome::LinkGenerated(whatsapp_link(&order.customer.phone, &body))
                }
            };

            self.metrics.record_notification(
                channel.as_str(),
                match &outcome {
                    NotificationOutcome::Sent => "sent",
                    NotificationOutcome::LinkGenerated(_) => "link",
                    NotificationOutcome::Failed(_) => "failed",
                },
            );

            let record = NotificationRecord::new(order.id, channel, status, outcome.clone());
            if let Err(error) = self.store.append_notification(record).await {
                tracing::error!(order_id = %order.id, error = %error, "failed to log notification");
            }

            summary.results.push(ChannelResult { channel, outcome });
        }

        self.metrics
            .gateway_breaker_open
            .set(self.email.breaker_open().await as i64);

        summary
    }

    /// Customer notice after a successful assignment or claim.
    pub async fn order_assigned(&self, order: &Order) {
        let summary = self
            .notify_status(order, &[NotifyChannel::Email], order.order_status, None)
            .await;
        if !summary.all_delivered() {
            tracing::warn!(order_id = %order.id, "order-assigned notice not delivered");
        }
    }

    /// Offer notice to every broadcast candidate. Not recorded per order -
    /// these go to tenants, not the customer.
    pub async fn broadcast_offer(&self, order: &Order, candidates: &[Tenant]) {
        for tenant in candidates {
            let subject = "New order available".to_string();
            let body = format!(
                "{}, a new order worth {} paise is available for fulfillment. First to accept wins.",
                tenant.business_name, order.pricing.total_price
            );
            if let Err(error) = self.email.send(&tenant.email, &subject, &body).await {
                tracing::warn!(
                    order_id = %order.id,
                    tenant_id = %tenant.id,
                    error = %error,
                    "broadcast offer not delivered"
                );
            }
        }
    }

    /// "No longer available" notice to broadcast losers.
    pub async fn offer_closed(&self, order: &Order, losers: &[Tenant]) {
        for tenant in losers {
            let subject = "Order no longer available".to_string();
            let body = format!(
                "{}, the broadcast order has been claimed by another seller.",
                tenant.business_name
            );
            if let Err(error) = self.email.send(&tenant.email, &subject, &body).await {
                tracing::warn!(
                    order_id = %order.id,
                    tenant_id = %tenant.id,
                    error = %error,
                    "offer-closed notice not delivered"
                );
            }
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Unit Tests
// ============================================================================
