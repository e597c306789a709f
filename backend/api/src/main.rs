//! FoodAid API — entry point.
//!
//! Wires up configuration, the SQLite pool, the shared outbound HTTP
//! client, and the Axum router, then starts the expiry sweeper alongside
//! the server.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use foodaid_api::api::{self, AppState};
use foodaid_api::auth::IdentityClient;
use foodaid_api::config::Config;
use foodaid_api::geo::GeocodeClient;
use foodaid_api::payments::PayPalClient;
use foodaid_api::push::PushClient;
use foodaid_api::{db, sweep};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // HTTP client shared by every outbound integration.
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = Arc::new(AppState {
        identity: IdentityClient::new(client.clone(), &config),
        geo: GeocodeClient::new(client.clone(), &config),
        push: PushClient::new(client.clone(), &config),
        paypal: PayPalClient::new(client, &config),
        pool,
        config,
    });

    tokio::spawn(sweep::run(state.clone()));

    let app = api::router(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
