pub mod block_producer;
pub mod consensus_driver;
pub mod maestro;
