use std::time::{Duration, Instant};

use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Protects the outbound notification gateways: after repeated failures the
// breaker opens and calls fail fast instead of tying up request handlers on
// a dead dependency. This is fail-fast only - the dispatcher never retries
// a send on its own.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Open,
    HalfOpen,
}

struct State {
    phase: Phase,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    state: Mutex<State>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                phase: Phase::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            cooldown,
        }
    }

    /// Whether a call may proceed. An open breaker lets one probe through
    /// once the cooldown has elapsed.
    pub async fn allow(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.phase {
            Phase::Closed | Phase::HalfOpen => true,
            Phase::Open => {
                let elapsed = state
                    .opened_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!("circuit breaker half-open, probing gateway");
                    state.phase = Phase::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Closed {
            tracing::info!("circuit breaker closed after successful probe");
        }
        state.phase = Phase::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_failures += 1;
        match state.phase {
            Phase::Closed if state.consecutive_failures >= self.failure_threshold => {
                tracing::warn!(
                    failures = state.consecutive_failures,
                    "circuit breaker opened"
                );
                state.phase = Phase::Open;
                state.opened_at = Some(Instant::now());
            }
            Phase::HalfOpen => {
                tracing::warn!("probe failed, circuit breaker reopened");
                state.phase = Phase::Open;
                state.opened_at = Some(Instant::now());
            }
            _ => {}
        }
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }
}
