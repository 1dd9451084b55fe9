use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Assignment Claim - Broadcast Routing Window
// ============================================================================
//
// A broadcast offers one order to a set of approved tenants; the first
// tenant to claim it wins. The claim record is bookkeeping around that
// window - the authoritative race is decided by the store's conditional
// write on `routed_to_tenant`, never by this record alone.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Open,
    ClaimedBy(Uuid),
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentClaim {
    pub order_id: Uuid,
    pub candidates: Vec<Uuid>,
    pub outcome: ClaimOutcome,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AssignmentClaim {
    pub fn open(order_id: Uuid, candidates: Vec<Uuid>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            candidates,
            outcome: ClaimOutcome::Open,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_open(&self) -> bool {
        self.outcome == ClaimOutcome::Open
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_candidate(&self, tenant_id: Uuid) -> bool {
        self.candidates.contains(&tenant_id)
    }

    /// Candidates other than the winner, for "no longer available" notices.
    pub fn losers(&self, winner: Uuid) -> Vec<Uuid> {
        self.candidates
            .iter()
            .copied()
            .filter(|id| *id != winner)
            .collect()
    }
}
