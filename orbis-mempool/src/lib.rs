pub mod core;
pub mod ports;

pub use crate::core::pipeline::{
    AdmissionPipeline, BatchReceipt, PipelineConfig, TxOutcome, TxReceipt,
};
pub use crate::core::stats::PipelineStats;
pub use ports::{AccountView, TxStore};
