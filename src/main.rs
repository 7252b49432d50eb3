mod command;
mod config;
mod fleet;
mod receiver;
mod transport;

use anyhow::Result;
use command::{ExecutionDispatcher, FleetValidator};
use config::WorkerConfig;
use fleet::{FleetBackend, FleetSeed, SimulatedFleet};
use futures::future::{join_all, try_join_all};
use receiver::{EchoReceiver, ExecuteCommandReceiver, MessageReceiver};
use std::sync::Arc;
use transport::{MessageChannel, TcpChannel};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = WorkerConfig::from_env()?;

    info!("Run command worker starting");
    info!("  Messaging host: {}", config.messaging_host);
    info!(
        "  Wait for command execution: {}",
        config.wait_for_command_execution
    );

    let seed = match &config.fleet_seed {
        Some(path) => FleetSeed::load(path)?,
        None => FleetSeed::sample(),
    };
    let fleet: Arc<dyn FleetBackend> = Arc::new(
        SimulatedFleet::new(seed, config.simulated_steps)
            .with_retention(config.simulated_retention),
    );
    info!("  Fleet backend: {}", fleet.name());

    let tcp = TcpChannel::bind(&config.messaging_host).await?;
    info!("  Publishers connect to: {}", tcp.local_addr());
    let channel: Arc<dyn MessageChannel> = Arc::new(tcp);

    let validator = Arc::new(FleetValidator::new(fleet.clone()));
    let dispatcher = Arc::new(ExecutionDispatcher::new(
        fleet.clone(),
        validator,
        config.dispatch_options(),
    ));

    let receivers: Vec<Box<dyn MessageReceiver>> = vec![
        Box::new(ExecuteCommandReceiver::new(channel.clone(), dispatcher)),
        Box::new(EchoReceiver::new(channel.clone())),
    ];

    try_join_all(receivers.iter().map(|r| r.receive())).await?;
    info!("Run command worker started ({} receivers)", receivers.len());

    tokio::signal::ctrl_c().await?;

    info!("Stopping run command worker");
    join_all(receivers.iter().map(|r| r.stop())).await;

    Ok(())
}
