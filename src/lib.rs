//! # Pipegate
//!
//! A synchronous HTTP gateway that hands each request body to a freshly
//! spawned stdio worker process and turns the process outcome into an HTTP
//! response.
//!
//! ## Modules
//!
//! - `config` - Injected gateway configuration (worker command, deadline, listen address)
//! - `gateway` - axum routes and the outcome-to-response translation
//! - `worker` - Subprocess bridging core: spawn, concurrent stream pumps, classification
pub mod config;
pub mod gateway;
pub mod worker;
