//! Scoring gateway: the only path from requests to the model.

mod config;
mod error;
mod gateway;


pub use config::GatewayConfig;
pub use error::ScoringError;
pub use gateway::ScoringGateway;
