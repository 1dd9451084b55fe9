use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::utils::{CircuitBreaker, Phase};

// ============================================================================
// Outbound Gateways
// ============================================================================
//
// Email delivery and WhatsApp link generation. The email service is a
// black-box HTTP collaborator: calls are bounded by a timeout and guarded
// by a circuit breaker, and a failure is reported to the caller - never
// retried here.
//
// ============================================================================

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    /// True while the transport is failing fast.
    async fn breaker_open(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct EmailPayload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

pub struct HttpEmailGateway {
    client: reqwest::Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl HttpEmailGateway {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building email gateway client")?;
        Ok(Self {
            client,
            base_url,
            breaker: CircuitBreaker::new(5, Duration::from_secs(30)),
        })
    }
}

#[async_trait]
impl EmailGateway for HttpEmailGateway {
    async fn breaker_open(&self) -> bool {
        self.breaker.phase().await == Phase::Open
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if !self.breaker.allow().await {
            bail!("email gateway unavailable (circuit open)");
        }

        let result = self
            .client
            .post(format!("{}/send", self.base_url))
            .json(&EmailPayload { to, subject, body })
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => {
                self.breaker.record_success().await;
                tracing::debug!(to = %to, subject = %subject, "email handed to gateway");
                Ok(())
            }
            Err(error) => {
                self.breaker.record_failure().await;
                Err(error).context("email gateway send")
            }
        }
    }
}

/// Demo-mode gateway: logs the message instead of delivering it.
pub struct LogOnlyEmailGateway;

#[async_trait]
impl EmailGateway for LogOnlyEmailGateway {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "email gateway not configured, logging only");
        Ok(())
    }
}

/// Deep link for manual WhatsApp send; the message is never delivered
/// autonomously on this channel.
pub fn whatsapp_link(phone: &str, message: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("https://wa.me/{}?text={}", digits, urlencoding::encode(message))
}
