pub mod engine;
pub mod error;
pub mod health;
pub mod ports;
pub mod registry;
pub mod round;

pub use engine::{ConsensusEngine, EngineConfig, Role, VoteOutcome};
pub use error::ConsensusError;
pub use health::HealthMonitor;
pub use registry::{ValidatorRegistry, ValidatorSet};
pub use round::ConsensusRound;
