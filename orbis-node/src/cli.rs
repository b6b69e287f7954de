use clap::Parser;

/// Command-line arguments for the standalone node binary.
#[derive(Parser, Debug)]
#[command(name = "orbis-node", version, about = "Node-local BFT consensus core")]
pub struct Args {
    /// Path to the node configuration file (created if missing).
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Node id used when a config file has to be created.
    #[arg(long, default_value = "node-1")]
    pub node_id: String,

    /// Run as an observer: track consensus, never stand for election.
    #[arg(long)]
    pub observer: bool,
}
