mod assignment;
mod commission;
mod status;

use uuid::Uuid;

use crate::domain::order::OrderError;
use crate::domain::tenant::TenantError;
use crate::utils::IsTransient;

pub use assignment::AssignmentEngine;
pub use status::{StatusEngine, TransitionOutcome};

// ============================================================================
// Engine Layer - Stateless Services over the Store
// ============================================================================

/// Explicit per-request caller identity. The engines never hold session
/// state; authorization is decided from this context on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Admin,
    Tenant,
}

#[derive(Debug, Clone, Copy)]
pub struct CallerContext {
    pub role: CallerRole,
    pub tenant_id: Option<Uuid>,
}

impl CallerContext {
    pub fn admin() -> Self {
        Self {
            role: CallerRole::Admin,
            tenant_id: None,
        }
    }

    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            role: CallerRole::Tenant,
            tenant_id: Some(tenant_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl IsTransient for EngineError {
    fn is_transient(&self) -> bool {
        matches!(self, EngineError::Order(OrderError::ConcurrentModification))
    }
}
