//! utils.rs
//!
//! Common types and helper implementations shared across Orbis.

pub mod node_id;
pub use node_id::NodeId;

pub mod time;
