pub mod auth;
pub mod block;
pub mod error;
pub mod transactions;
pub mod utils;
pub mod validator;
pub mod vote;

pub use error::OrbisError;
pub use utils::NodeId;
