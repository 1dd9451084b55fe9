use uuid::Uuid;

use super::entity::TenantStatus;

// ============================================================================
// Tenant Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("tenant {id} is not eligible (status: {status})")]
    NotEligible { id: Uuid, status: TenantStatus },

    #[error("tenant not found: {0}")]
    NotFound(Uuid),

    #[error("commission rate must be between 0 and 100, got {0}")]
    InvalidRate(f64),
}
