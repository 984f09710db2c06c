//! Network Module
//!
//! Connection setup for handlers.
//!
//! ## Architecture
//! - One connection per handler, split into read and write halves
//! - No pooling or reconnection; a failed connection is closed by the caller

mod transport;

pub use transport::{connect, Transport};
