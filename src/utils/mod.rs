mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, Phase};
pub use retry::{retry_on_conflict, IsTransient};
