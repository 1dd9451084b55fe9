use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod api;
mod config;
mod domain;
mod engine;
mod metrics;
mod notify;
mod store;
mod utils;

use api::AppState;
use config::Settings;
use engine::{AssignmentEngine, StatusEngine};
use metrics::Metrics;
use notify::{Dispatcher, EmailGateway, HttpEmailGateway, InvoiceService, LogOnlyEmailGateway};
use store::{MemoryStore, PgStore, Store};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orderhub=debug".into()),
        )
        .init();

    let settings = Settings::load()?;
    let outbound_timeout = Duration::from_millis(settings.outbound_timeout_ms);

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => {
            let store = PgStore::connect(url).await?;
            tracing::info!("connected to Postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("no database_url configured, using in-memory store (demo mode)");
            Arc::new(MemoryStore::new())
        }
    };

    let email: Arc<dyn EmailGateway> = match &settings.email_gateway_url {
        Some(url) => Arc::new(HttpEmailGateway::new(url.clone(), outbound_timeout)?),
        None => {
            tracing::warn!("no email_gateway_url configured, notifications are log-only");
            Arc::new(LogOnlyEmailGateway)
        }
    };

    let metrics = Arc::new(Metrics::new()?);
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), email, metrics.clone()));
    let invoices = InvoiceService::new(
        settings.invoice_renderer_url.clone(),
        settings.invoice_storage_url.clone(),
        outbound_timeout,
    )?;
    let assignment = AssignmentEngine::new(
        store.clone(),
        dispatcher.clone(),
        metrics.clone(),
        chrono::Duration::minutes(settings.claim_ttl_minutes),
    );
    let status = StatusEngine::new(store.clone(), dispatcher.clone(), metrics.clone());

    let state = web::Data::new(AppState {
        store,
        assignment,
        status,
        dispatcher,
        invoices,
        metrics,
    });

    tracing::info!(
        host = %settings.host,
        port = settings.port,
        "starting orderhub HTTP server"
    );
    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind((settings.host.as_str(), settings.port))?
        .run()
        .await?;

    Ok(())
}
