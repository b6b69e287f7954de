pub mod pipeline;
pub mod stats;
