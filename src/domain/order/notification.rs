use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Notification Records
// ============================================================================
//
// Every delivery attempt is appended to the notification log with its dedup
// key. Duplicate keys are allowed - tenants and admins may deliberately
// resend for the same status - but each attempt leaves its own record so
// nothing fails silently.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyChannel {
    Email,
    Whatsapp,
}

impl NotifyChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyChannel::Email => "email",
            NotifyChannel::Whatsapp => "whatsapp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum NotificationOutcome {
    /// Email handed to the gateway.
    Sent,
    /// WhatsApp deep-link produced for manual send.
    LinkGenerated(String),
    /// Delivery failed; reported to the caller, never retried internally.
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub order_id: Uuid,
    pub channel: NotifyChannel,
    pub status: OrderStatus,
    pub outcome: NotificationOutcome,
    pub dedup_key: String,
    pub sent_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn new(
        order_id: Uuid,
        channel: NotifyChannel,
        status: OrderStatus,
        outcome: NotificationOutcome,
    ) -> Self {
        Self {
            dedup_key: dedup_key(order_id, status, channel),
            order_id,
            channel,
            status,
            outcome,
            sent_at: Utc::now(),
        }
    }
}

/// Idempotency key: one logical notification per (order, status, channel).
pub fn dedup_key(order_id: Uuid, status: OrderStatus, channel: NotifyChannel) -> String {
    format!("{}:{}:{}", order_id, status, channel.as_str())
}
