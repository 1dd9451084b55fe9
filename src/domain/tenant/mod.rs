mod entity;
mod errors;

pub use entity::{validate_rate, Tenant, TenantStatus};
pub use errors::TenantError;
