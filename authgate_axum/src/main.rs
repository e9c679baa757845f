use std::sync::Arc;

use authgate_axum::{config::Opts, router};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    let listen = opts.listen;
    let state = opts.into_state()?;

    tracing::info!(
        %listen,
        authority = state.authority(),
        issuer = state.issuer(),
        "starting resource server"
    );

    let listener = tokio::net::TcpListener::bind(listen).await?;
    axum::serve(listener, router(Arc::new(state))).await?;

    Ok(())
}
