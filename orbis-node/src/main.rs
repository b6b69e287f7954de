use std::sync::Arc;

use clap::Parser;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tokio::sync::mpsc;
use tracing::{error, info};

use orbis_common::auth::Ed25519Authenticator;
use orbis_common::utils::time::SystemClock;
use orbis_node::cli::Args;
use orbis_node::config::NodeConfig;
use orbis_node::events::NodeEvent;
use orbis_node::memory::{
    InMemoryBlockStore, InMemoryTxStore, LoopbackNetwork, StaticAccounts, StaticValidatorSource,
};
use orbis_node::node::OrbisNode;
use orbis_node::runtime::maestro::Maestro;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,orbis_node=debug".into()),
        )
        .init();

    info!("--- STARTING ORBIS NODE ---");
    info!("Config: {}", args.config);

    let mut config = match NodeConfig::ensure_file(&args.config, &args.node_id) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    if args.observer {
        config.observer = true;
    }

    let mut csprng = OsRng;
    let auth = Arc::new(Ed25519Authenticator::new(SigningKey::generate(&mut csprng)));

    let node = Arc::new(OrbisNode::new(
        config.clone(),
        auth,
        Arc::new(StaticAccounts::default()),
        Arc::new(InMemoryTxStore::default()),
        Arc::new(LoopbackNetwork::new(config.node_id.clone())),
        Arc::new(InMemoryBlockStore::default()),
        Arc::new(SystemClock),
    ));

    let source = StaticValidatorSource {
        validators: config.validators.clone(),
    };
    node.sync_validators(&source).await;

    let (event_tx, event_rx) = mpsc::channel::<NodeEvent>(256);
    let maestro = Maestro::new(Arc::clone(&node));
    let maestro_task = tokio::spawn(maestro.run(event_rx));

    info!("Node [{}] started. Press Ctrl+C to stop.", config.node_id);
    tokio::signal::ctrl_c().await?;

    event_tx.send(NodeEvent::Shutdown).await.ok();
    maestro_task.await?;

    let status = node.get_status().await;
    info!(
        "Final state: role={:?} height={} blocks={}",
        status.consensus.role, status.consensus.last_confirmed_height, status.consensus.blocks_processed
    );
    Ok(())
}
