//! maskgate core
//!
//! Types shared across the maskgate gateway components:
//! - The gateway error taxonomy and `Result` alias
//! - Chat message wire types used by the dispatch layer

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::ChatMessage;
