use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::TenantError;

// ============================================================================
// Tenant Entity - Registry Record
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "pending",
            TenantStatus::Approved => "approved",
            TenantStatus::Rejected => "rejected",
            TenantStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<TenantStatus> {
        match s {
            "pending" => Some(TenantStatus::Pending),
            "approved" => Some(TenantStatus::Approved),
            "rejected" => Some(TenantStatus::Rejected),
            "suspended" => Some(TenantStatus::Suspended),
            _ => None,
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A marketplace tenant. The running aggregates are updated only at
/// commission settlement and never recomputed retroactively; `commission_rate`
/// applies to future settlements only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub business_name: String,
    pub email: String,
    pub phone: String,
    pub status: TenantStatus,
    /// Percent of the commissionable base, 0-100.
    pub commission_rate: f64,
    pub total_orders: i64,
    /// Paise.
    pub total_revenue: i64,
    /// Paise.
    pub total_commission: i64,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn register(
        business_name: String,
        email: String,
        phone: String,
        commission_rate: f64,
    ) -> Result<Self, TenantError> {
        validate_rate(commission_rate)?;
        Ok(Self {
            id: Uuid::new_v4(),
            business_name,
            email,
            phone,
            status: TenantStatus::Pending,
            commission_rate,
            total_orders: 0,
            total_revenue: 0,
            total_commission: 0,
            created_at: Utc::now(),
        })
    }

    /// Only approved tenants may receive or claim orders.
    pub fn is_eligible(&self) -> bool {
        self.status == TenantStatus::Approved
    }

    pub fn ensure_eligible(&self) -> Result<(), TenantError> {
        if self.is_eligible() {
            Ok(())
        } else {
            Err(TenantError::NotEligible {
                id: self.id,
                status: self.status,
            })
        }
    }
}

pub fn validate_rate(rate: f64) -> Result<(), TenantError> {
    if !(0.0..=100.0).contains(&rate) || !rate.is_finite() {
        return Err(TenantError::InvalidRate(rate));
    }
    Ok(())
}

// ============================================================================
// Unit Tests
// ============================================================================
