//! Sample methods client.
//!
//! Run with: cargo run -p methods-client-demo
//!
//! Hosts the sample service on an in-process bus, then connects, discovers
//! it, joins a session, makes three quick calls and two concurrent Pi calls.
//! Set `PI_ITERATIONS` to shorten the Pi calculation.

use std::sync::Arc;

use anyhow::Context;
use bus_session_client::{BusSessionClient, bus::MemoryBus};
use bus_session_core::{BusTransport, ClientConfig};
use bus_session_sample::{SampleProxy, SampleService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PI_ITERATIONS: u64 = 1_000_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let pi_iterations = match std::env::var("PI_ITERATIONS") {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid PI_ITERATIONS: {raw:?}"))?,
        Err(_) => DEFAULT_PI_ITERATIONS,
    };

    // Stand-in for the remote side.
    let bus = Arc::new(MemoryBus::new());
    bus.advertise(
        &config.service_name,
        config.contact_port,
        &config.object_path,
        Arc::new(SampleService::new()),
    )?;

    let transport: Arc<dyn BusTransport> = bus;
    let client = BusSessionClient::new(transport, config.clone());

    client
        .connect(&config.app_name)
        .await
        .context("bus connect failed")?;
    client
        .discover(&config.service_name)
        .await
        .context("find advertised name failed")?;

    let session = client
        .await_session(config.join_timeout)
        .await
        .context("no session joined")?;
    let proxy = SampleProxy::bind(&client, &session);

    match proxy.ping("Hello World").await {
        Ok(reply) => tracing::info!("Ping : {reply}"),
        Err(e) => tracing::error!("Ping failed: {e}"),
    }
    match proxy.concatenate("The Eagle ", "has landed!").await {
        Ok(reply) => tracing::info!("Concatenate : {reply}"),
        Err(e) => tracing::error!("Concatenate failed: {e}"),
    }
    match proxy.fibonacci(4).await {
        Ok(reply) => tracing::info!("Fibonacci(4) : {reply}"),
        Err(e) => tracing::error!("Fibonacci failed: {e}"),
    }

    let workers: Vec<_> = (1..=2)
        .map(|worker| {
            let proxy = proxy.clone();
            tokio::spawn(async move {
                tracing::info!(worker, "Starting Pi calculation");
                match proxy.pi(pi_iterations).await {
                    Ok(pi) => tracing::info!(worker, "Pi({pi_iterations}) = {pi}"),
                    Err(e) => tracing::error!(worker, "Pi failed: {e}"),
                }
            })
        })
        .collect();

    for worker in workers {
        if let Err(e) = worker.await {
            tracing::error!("Pi worker panicked: {e}");
        }
    }

    client.disconnect().await?;
    Ok(())
}
