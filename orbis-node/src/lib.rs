pub mod cli;
pub mod config;
pub mod events;
pub mod memory;
pub mod node;
pub mod runtime;

pub use config::NodeConfig;
pub use events::NodeEvent;
pub use node::OrbisNode;
pub use runtime::maestro::Maestro;
