use serde::Deserialize;

// ============================================================================
// Runtime Configuration
// ============================================================================
//
// Layered: optional `config/orderhub.toml`, then `ORDERHUB_*` environment
// variables on top. Everything has a workable default so a bare
// `cargo run` starts a demo instance on the in-memory store.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Postgres connection string. Absent means the in-memory store.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Outbound email gateway base URL. Absent means log-only delivery.
    #[serde(default)]
    pub email_gateway_url: Option<String>,

    #[serde(default = "default_renderer_url")]
    pub invoice_renderer_url: String,

    /// Invoice upload target. Absent means sharing degrades to the raw
    /// renderer URL.
    #[serde(default)]
    pub invoice_storage_url: Option<String>,

    /// Timeout applied to each outbound HTTP call.
    #[serde(default = "default_outbound_timeout_ms")]
    pub outbound_timeout_ms: u64,

    /// How long a broadcast offer stays claimable.
    #[serde(default = "default_claim_ttl_minutes")]
    pub claim_ttl_minutes: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_renderer_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_outbound_timeout_ms() -> u64 {
    5_000
}

fn default_claim_ttl_minutes() -> i64 {
    30
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/orderhub").required(false))
            .add_source(config::Environment::with_prefix("ORDERHUB"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
