//! maskgate security
//!
//! The traffic security gate and the global rate limiter — the only shared
//! mutable state in the gateway. Each structure is guarded by its own lock,
//! and no lock is ever held across network I/O (the gate is fully
//! synchronous; dispatch happens after the gate has decided).

pub mod gate;
pub mod ratelimit;

pub use gate::{RequestInfo, RequestLogEntry, SecurityGate};
pub use ratelimit::RateLimiter;
