//! Token exchange gateway server.
//!
//! Reads `HUBSPOT_CLIENT_ID`, `HUBSPOT_CLIENT_SECRET`, `GATEWAY_ALLOWED_REDIRECTS` and
//! `PORT`, then serves `POST /oauth/token` on `0.0.0.0:$PORT`. Log verbosity follows
//! `RUST_LOG`.

// std
use std::{net::SocketAddr, sync::Arc};
// crates.io
use color_eyre::Result;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
// self
use oauth2_popup::{
	gateway::{GatewayConfig, TokenGateway, server},
	provider::presets,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::registry()
		.with(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("info,oauth2_popup=debug,tower_http=debug")),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = GatewayConfig::from_env()?;

	if !config.has_credentials() {
		tracing::warn!("OAuth client credentials are not configured; every exchange will fail.");
	}

	let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
	let gateway = TokenGateway::new(presets::hubspot()?, config)?;
	let listener = TcpListener::bind(addr).await?;

	tracing::info!(%addr, "Token exchange gateway listening.");

	axum::serve(listener, server::router(Arc::new(gateway))).await?;

	Ok(())
}
