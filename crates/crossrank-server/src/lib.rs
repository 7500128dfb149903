//! HTTP front end for the crossrank reranking pipeline.
//!
//! The binary in `main.rs` wires configuration, logging and shutdown around
//! [`gateway::create_router_with_state`]; integration tests use the same router.

pub mod gateway;
