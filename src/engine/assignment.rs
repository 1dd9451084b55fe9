use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::order::{AssignmentClaim, ClaimOutcome, Order, OrderError};
use crate::domain::tenant::{Tenant, TenantError};
use crate::metrics::Metrics;
use crate::notify::Dispatcher;
use crate::store::{RouteWrite, Store};

use super::EngineError;

// ============================================================================
// Assignment Engine
// ============================================================================
//
// Routes an order to exactly one tenant, either directly (super-admin picks
// one) or via broadcast (first approved tenant to claim wins). Both paths
// commit through the store's conditional route write, so concurrent callers
// across processes resolve to one winner - losers get `AlreadyRouted` and
// must not retry into success.
//
// ============================================================================

pub struct AssignmentEngine {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    claim_ttl: Duration,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<Metrics>,
        claim_ttl: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            metrics,
            claim_ttl,
        }
    }

    async fn eligible_tenant(&self, tenant_id: Uuid) -> Result<Tenant, EngineError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or(TenantError::NotFound(tenant_id))?;
        tenant.ensure_eligible()?;
        Ok(tenant)
    }

    /// Super-admin picks the fulfilling tenant outright.
    pub async fn assign_direct(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Order, EngineError> {
        self.eligible_tenant(tenant_id).await?;

        match self.store.route_order(order_id, tenant_id).await? {
            RouteWrite::Routed(order) => {
                tracing::info!(
                    order_id = %order_id,
                    tenant_id = %tenant_id,
                    "order assigned directly"
                );
                self.metrics.record_routed("direct");
                // Best-effort customer notice; never blocks the assignment.
                self.dispatcher.order_assigned(&order).await;
                Ok(order)
            }
            RouteWrite::AlreadyRouted => {
                self.metrics.claim_conflicts.inc();
                Err(OrderError::AlreadyRouted.into())
            }
            RouteWrite::NotFound => Err(OrderError::NotFound(order_id).into()),
        }
    }

    /// Offer the order to a set of approved tenants without touching it.
    /// The first tenant to `claim` wins the routing race.
    pub async fn broadcast(
        &self,
        order_id: Uuid,
        tenant_ids: Vec<Uuid>,
    ) -> Result<AssignmentClaim, EngineError> {
        if tenant_ids.is_empty() {
            return Err(OrderError::Invalid("broadcast candidate set is empty".into()).into());
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        if order.routed_to_tenant {
            return Err(OrderError::AlreadyRouted.into());
        }

        let mut candidates = Vec::with_capacity(tenant_ids.len());
        for tenant_id in &tenant_ids {
            candidates.push(self.eligible_tenant(*tenant_id).await?);
        }

        let claim = AssignmentClaim::open(order_id, tenant_ids, self.claim_ttl);
        self.store.put_claim(claim.clone()).await?;

        tracing::info!(
            order_id = %order_id,
            candidates = claim.candidates.len(),
            expires_at = %claim.expires_at,
            "broadcast claim window opened"
        );
        self.dispatcher.broadcast_offer(&order, &candidates).await;

        Ok(claim)
    }

    /// A tenant accepts a broadcast order. Exactly one concurrent caller
    /// succeeds; everyone else sees `AlreadyRouted`.
    pub async fn claim(&self, order_id: Uuid, tenant_id: Uuid) -> Result<Order, EngineError> {
        self.eligible_tenant(tenant_id).await?;

        // Claiming is only valid against an order an admin actually
        // broadcast; without a claim record nobody is a candidate.
        let claim = self
            .store
            .get_claim(order_id)
            .await?
            .ok_or(OrderError::NotCandidate)?;
        match &claim.outcome {
            ClaimOutcome::ClaimedBy(_) => return Err(OrderError::AlreadyRouted.into()),
            ClaimOutcome::Expired => return Err(OrderError::ClaimExpired.into()),
            ClaimOutcome::Open => {
                if claim.is_expired(Utc::now()) {
                    self.store
                        .close_claim(order_id, ClaimOutcome::Expired)
                        .await?;
                    return Err(OrderError::ClaimExpired.into());
                }
                if !claim.is_candidate(tenant_id) {
                    return Err(OrderError::NotCandidate.into());
                }
            }
        }

        match self.store.route_order(order_id, tenant_id).await? {
            RouteWrite::Routed(order) => {
                tracing::info!(
                    order_id = %order_id,
                    tenant_id = %tenant_id,
                    "broadcast claim won"
                );
                self.metrics.record_routed("claim");
                self.store
                    .close_claim(order_id, ClaimOutcome::ClaimedBy(tenant_id))
                    .await?;
                self.notify_losers(&order, &claim, tenant_id).await;
                self.dispatcher.order_assigned(&order).await;
                Ok(order)
            }
            RouteWrite::AlreadyRouted => {
                tracing::debug!(
                    order_id = %order_id,
                    tenant_id = %tenant_id,
                    "claim lost the routing race"
                );
                self.metrics.claim_conflicts.inc();
                Err(OrderError::AlreadyRouted.into())
            }
            RouteWrite::NotFound => Err(OrderError::NotFound(order_id).into()),
        }
    }

    async fn notify_losers(&self, order: &Order, claim: &AssignmentClaim, winner: Uuid) {
        let mut losers = Vec::new();
        for loser_id in claim.losers(winner) {
            match self.store.get_tenant(loser_id).await {
                Ok(Some(tenant)) => losers.push(tenant),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(tenant_id = %loser_id, error = %error, "could not load losing tenant");
                }
            }
        }
        self.dispatcher.offer_closed(order, &losers).await;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::testing as fixtures;
    use crate::domain::tenant::TenantStatus;
    use crate::notify::testing::MockEmailGateway;
    use crate::store::MemoryStore;

    struct Harness {
        engine: AssignmentEngine,
        store: Arc<MemoryStore>,
        gateway: Arc<MockEmailGateway>,
    }

    fn harness() -> Harness {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockEmailGateway::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            gateway.clone(),
            metrics.clone(),
        ));
        let engine = AssignmentEngine::new(
            store.clone(),
            dispatcher,
            metrics,
            Duration::minutes(30),
        );
        Harness {
            engine,
            store,
            gateway,
        }
    }

    async fn seed_tenant(store: &MemoryStore, status: TenantStatus, rate: f64) -> Uuid {
        let mut tenant =
            Tenant::register("Clay & Kiln".into(), "seller@example.com".into(), "+91".into(), rate)
                .unwrap();
        tenant.status = status;
        let id = tenant.id;
        store.insert_tenant(tenant).await.unwrap();
        id
    }

    async fn seed_order(store: &MemoryStore) -> Uuid {
        let order = fixtures::order(100_000, None);
        let id = order.id;
        store.insert_order(order).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_direct_assign_routes_and_notifies() {
        let h = harness();
        let tenant_id = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let order_id = seed_order(&h.store).await;

        let order = h.engine.assign_direct(order_id, tenant_id).await.unwrap();
        assert!(order.routed_to_tenant);
        assert_eq!(order.tenant_id, Some(tenant_id));

        // Customer got the "accepted" notice.
        let sent = h.gateway.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "asha@example.com");
    }

    #[tokio::test]
    async fn test_direct_assign_requires_approved_tenant() {
        let h = harness();
        let order_id = seed_order(&h.store).await;

        for status in [
            TenantStatus::Pending,
            TenantStatus::Rejected,
            TenantStatus::Suspended,
        ] {
            let tenant_id = seed_tenant(&h.store, status, 10.0).await;
            let err = h.engine.assign_direct(order_id, tenant_id).await.unwrap_err();
            assert!(matches!(
                err,
                EngineError::Tenant(TenantError::NotEligible { .. })
            ));
        }

        // The order must be untouched by the failed attempts.
        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert!(!order.routed_to_tenant);
    }

    #[tokio::test]
    async fn test_second_direct_assign_loses() {
        let h = harness();
        let first = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let second = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let order_id = seed_order(&h.store).await;

        h.engine.assign_direct(order_id, first).await.unwrap();
        let err = h.engine.assign_direct(order_id, second).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::AlreadyRouted)));

        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.tenant_id, Some(first));
    }

    #[tokio::test]
    async fn test_broadcast_rejects_empty_and_ineligible_sets() {
        let h = harness();
        let order_id = seed_order(&h.store).await;

        let err = h.engine.broadcast(order_id, vec![]).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::Invalid(_))));

        let approved = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let suspended = seed_tenant(&h.store, TenantStatus::Suspended, 10.0).await;
        let err = h
            .engine
            .broadcast(order_id, vec![approved, suspended])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Tenant(TenantError::NotEligible { .. })
        ));
    }

    #[tokio::test]
    async fn test_broadcast_notifies_candidates_without_routing() {
        let h = harness();
        let a = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let b = seed_tenant(&h.store, TenantStatus::Approved, 12.0).await;
        let order_id = seed_order(&h.store).await;

        let claim = h.engine.broadcast(order_id, vec![a, b]).await.unwrap();
        assert!(claim.is_open());
        assert_eq!(claim.candidates.len(), 2);

        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert!(!order.routed_to_tenant);

        // One offer per candidate.
        assert_eq!(h.gateway.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_claim_win_closes_claim_and_notifies_losers() {
        let h = harness();
        let winner = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let loser = seed_tenant(&h.store, TenantStatus::Approved, 12.0).await;
        let order_id = seed_order(&h.store).await;

        h.engine.broadcast(order_id, vec![winner, loser]).await.unwrap();
        let order = h.engine.claim(order_id, winner).await.unwrap();
        assert_eq!(order.tenant_id, Some(winner));

        let claim = h.store.get_claim(order_id).await.unwrap().unwrap();
        assert_eq!(claim.outcome, ClaimOutcome::ClaimedBy(winner));

        let err = h.engine.claim(order_id, loser).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::AlreadyRouted)));
    }

    #[tokio::test]
    async fn test_claim_without_broadcast_is_rejected() {
        let h = harness();
        let tenant_id = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let order_id = seed_order(&h.store).await;

        // No broadcast ever happened; an approved tenant must not be able
        // to route the order to itself.
        let err = h.engine.claim(order_id, tenant_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::NotCandidate)));

        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert!(!order.routed_to_tenant);
        assert_eq!(order.tenant_id, None);
    }

    #[tokio::test]
    async fn test_claim_rejects_non_candidate() {
        let h = harness();
        let candidate = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let outsider = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let order_id = seed_order(&h.store).await;

        h.engine.broadcast(order_id, vec![candidate]).await.unwrap();
        let err = h.engine.claim(order_id, outsider).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::NotCandidate)));
    }

    #[tokio::test]
    async fn test_expired_claim_window_rejected() {
        let h = harness();
        let tenant_id = seed_tenant(&h.store, TenantStatus::Approved, 10.0).await;
        let order_id = seed_order(&h.store).await;

        // Window that expired in the past.
        let claim = AssignmentClaim::open(order_id, vec![tenant_id], Duration::minutes(-1));
        h.store.put_claim(claim).await.unwrap();

        let err = h.engine.claim(order_id, tenant_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Order(OrderError::ClaimExpired)));

        let claim = h.store.get_claim(order_id).await.unwrap().unwrap();
        assert_eq!(claim.outcome, ClaimOutcome::Expired);
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_exactly_one_winner() {
        let h = harness();
        let order_id = seed_order(&h.store).await;

        let mut candidates = Vec::new();
        for _ in 0..8 {
            candidates.push(seed_tenant(&h.store, TenantStatus::Approved, 10.0).await);
        }
        h.engine.broadcast(order_id, candidates.clone()).await.unwrap();

        let engine = Arc::new(h.engine);
        let mut handles = Vec::new();
        for tenant_id in candidates {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.claim(order_id, tenant_id).await
            }));
        }

        let mut winners = Vec::new();
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(order) => winners.push(order.tenant_id.unwrap()),
                Err(EngineError::Order(OrderError::AlreadyRouted)) => losses += 1,
                Err(other) => panic!("unexpected claim error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(losses, 7);

        // The committed route belongs to the winner.
        let order = h.store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.tenant_id, Some(winners[0]));
        assert!(order.routed_to_tenant);
    }
}
