use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics - Prometheus metrics for observability
// ============================================================================
//
// Counters for the flows with consistency concerns:
// - routing (direct vs claim, lost races)
// - status transitions and optimistic-concurrency conflicts
// - commission settlements and settled amounts
// - notification delivery per channel
//
// Scraped via GET /metrics on the main HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_routed: IntCounterVec,
    pub claim_conflicts: IntCounter,

    pub status_transitions: IntCounterVec,
    pub transition_conflicts: IntCounter,

    pub settlements: IntCounter,
    pub commission_settled_paise: IntCounter,

    pub notifications: IntCounterVec,
    pub gateway_breaker_open: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_routed = IntCounterVec::new(
            Opts::new("orders_routed_total", "Orders routed to a tenant"),
            &["mode"],
        )?;
        registry.register(Box::new(orders_routed.clone()))?;

        let claim_conflicts = IntCounter::new(
            "claim_conflicts_total",
            "Claim or assign attempts that lost the routing race",
        )?;
        registry.register(Box::new(claim_conflicts.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("status_transitions_total", "Committed status transitions"),
            &["status"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let transition_conflicts = IntCounter::new(
            "transition_conflicts_total",
            "Status transitions rejected on a stale read",
        )?;
        registry.register(Box::new(transition_conflicts.clone()))?;

        let settlements = IntCounter::new(
            "commission_settlements_total",
            "Commission settlements committed",
        )?;
        registry.register(Box::new(settlements.clone()))?;

        let commission_settled_paise = IntCounter::new(
            "commission_settled_paise_total",
            "Total commission settled, in paise",
        )?;
        registry.register(Box::new(commission_settled_paise.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Notification attempts"),
            &["channel", "outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let gateway_breaker_open = IntGauge::new(
            "notification_gateway_breaker_open",
            "Notification gateway circuit breaker (0=closed, 1=open)",
        )?;
        registry.register(Box::new(gateway_breaker_open.clone()))?;

        Ok(Self {
            registry,
            orders_routed,
            claim_conflicts,
            status_transitions,
            transition_conflicts,
            settlements,
            commission_settled_paise,
            notifications,
            gateway_breaker_open,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_routed(&self, mode: &str) {
        self.orders_routed.with_label_values(&[mode]).inc();
    }

    pub fn record_transition(&self, status: &str) {
        self.status_transitions.with_label_values(&[status]).inc();
    }

    pub fn record_settlement(&self, amount_paise: i64) {
        self.settlements.inc();
        if amount_paise > 0 {
            self.commission_settled_paise.inc_by(amount_paise as u64);
        }
    }

    pub fn record_notification(&self, channel: &str, outcome: &str) {
        self.notifications
            .with_label_values(&[channel, outcome])
            .inc();
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
