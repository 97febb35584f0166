//! maskgate gateway
//!
//! The HTTP surface of the gateway: configuration, the security-gate
//! middleware, route handlers, and the upstream dispatch layer. The binary
//! in `main.rs` wires these together; integration tests drive the router
//! directly against a local mock upstream.

pub mod config;
pub mod dispatch;
pub mod proxy;
pub mod routes;
