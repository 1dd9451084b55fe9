use uuid::Uuid;

use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order is already routed to a tenant")]
    AlreadyRouted,

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("tenant does not own this order")]
    NotOwner,

    #[error("order was modified concurrently, re-read and retry")]
    ConcurrentModification,

    #[error("commission settlement failed: {0}")]
    SettlementFailure(String),

    #[error("claim window for this order has expired")]
    ClaimExpired,

    #[error("tenant is not a candidate for this broadcast order")]
    NotCandidate,

    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("invalid order: {0}")]
    Invalid(String),
}
