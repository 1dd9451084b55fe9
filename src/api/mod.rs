mod handlers;

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use uuid::Uuid;

use crate::engine::{AssignmentEngine, CallerContext, CallerRole, EngineError, StatusEngine};
use crate::metrics::Metrics;
use crate::notify::{Dispatcher, InvoiceService};
use crate::store::Store;

use crate::domain::order::OrderError;
use crate::domain::tenant::TenantError;

pub use handlers::configure;

// ============================================================================
// HTTP Surface
// ============================================================================
//
// Thin handlers over the engines: parse, authorize from headers, call one
// engine operation, map the error. Caller identity arrives in headers set
// by the upstream auth proxy (`x-caller-role`, `x-tenant-id`); this service
// trusts them and enforces only the resulting scope rules.
//
// ============================================================================

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub assignment: AssignmentEngine,
    pub status: StatusEngine,
    pub dispatcher: Arc<Dispatcher>,
    pub invoices: InvoiceService,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "upstream_failure", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(serde_json::json!({
            "error": self.kind,
            "message": self.message,
        }))
    }
}

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        let message = error.to_string();
        match &error {
            EngineError::Order(order) => match order {
                OrderError::AlreadyRouted => {
                    Self::new(StatusCode::CONFLICT, "already_routed", message)
                }
                OrderError::ConcurrentModification => {
                    Self::new(StatusCode::CONFLICT, "conflict", message)
                }
                OrderError::IllegalTransition { .. } => {
                    Self::new(StatusCode::UNPROCESSABLE_ENTITY, "illegal_transition", message)
                }
                OrderError::NotOwner => Self::new(StatusCode::FORBIDDEN, "not_owner", message),
                OrderError::NotCandidate => {
                    Self::new(StatusCode::FORBIDDEN, "not_candidate", message)
                }
                OrderError::ClaimExpired => Self::new(StatusCode::GONE, "claim_expired", message),
                OrderError::NotFound(_) => Self::not_found(message),
                OrderError::SettlementFailure(_) => {
                    Self::new(StatusCode::INTERNAL_SERVER_ERROR, "settlement_failure", message)
                }
                OrderError::Invalid(_) => Self::bad_request(message),
            },
            EngineError::Tenant(tenant) => match tenant {
                TenantError::NotEligible { .. } => {
                    Self::new(StatusCode::FORBIDDEN, "tenant_not_eligible", message)
                }
                TenantError::NotFound(_) => Self::not_found(message),
                TenantError::InvalidRate(_) => {
                    Self::new(StatusCode::BAD_REQUEST, "invalid_rate", message)
                }
            },
            EngineError::Store(_) => {
                tracing::error!(error = %error, "store failure surfaced to API");
                Self::internal("storage backend failure")
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        EngineError::Store(error).into()
    }
}

impl From<OrderError> for ApiError {
    fn from(error: OrderError) -> Self {
        EngineError::from(error).into()
    }
}

impl From<TenantError> for ApiError {
    fn from(error: TenantError) -> Self {
        EngineError::from(error).into()
    }
}

/// Resolve the caller from the auth proxy's identity headers.
pub fn caller(headers: &HeaderMap) -> Result<CallerContext, ApiError> {
    let role = headers
        .get("x-caller-role")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthenticated("missing x-caller-role header"))?;

    match role {
        "admin" => Ok(CallerContext::admin()),
        "tenant" => {
            let tenant_id = headers
                .get("x-tenant-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok())
                .ok_or_else(|| ApiError::bad_request("tenant caller requires x-tenant-id"))?;
            Ok(CallerContext::tenant(tenant_id))
        }
        other => Err(ApiError::unauthenticated(format!(
            "unknown caller role: {other}"
        ))),
    }
}

pub fn require_admin(ctx: CallerContext) -> Result<(), ApiError> {
    if ctx.role == CallerRole::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("platform admin role required"))
    }
}

pub fn require_tenant(ctx: CallerContext) -> Result<Uuid, ApiError> {
    match (ctx.role, ctx.tenant_id) {
        (CallerRole::Tenant, Some(tenant_id)) => Ok(tenant_id),
        _ => Err(ApiError::forbidden("tenant role required")),
    }
}
