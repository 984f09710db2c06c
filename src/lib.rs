//! # memlink
//!
//! A client-side handler for the memcached binary protocol:
//! - One persistent connection per handler, strictly one command at a time
//! - Exact framing: every declared response body byte is consumed
//! - Batched gets streamed key by key from a worker thread
//! - Status classification into hit, miss, exists and failure
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Caller                                │
//! │        set / add / replace / append / prepend / gat          │
//! │        delete / touch            get / get_e (batched)       │
//! └───────────────┬─────────────────────────────┬───────────────┘
//!                 │                             │ handler moves in
//!                 │                             ▼
//!                 │                     ┌───────────────┐
//!                 │                     │ Batch worker  │──▶ BatchGet
//!                 │                     └───────┬───────┘    (stream)
//!                 ▼                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Handler                               │
//! │      BufWriter ──▶ codec ──▶ flush ──▶ header ──▶ classify    │
//! │      BufReader ◀── discard unread body ◀──────────────┘       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!               ┌───────────────┐
//!               │   Transport   │  (TCP, Unix socket)
//!               └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use memlink::{Config, GetRequest, Handler, SetRequest};
//!
//! # fn main() -> memlink::Result<()> {
//! let mut handler = Handler::connect(&Config::default())?;
//! handler.set(&SetRequest::new("greeting", "hello"))?;
//!
//! let mut batch = handler.get(GetRequest::from_keys(["greeting", "absent"]));
//! for response in batch.by_ref() {
//!     let response = response?;
//!     println!("{} miss={}", String::from_utf8_lossy(&response.key), response.miss);
//! }
//! let handler = batch.finish()?;
//! handler.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod metrics;
pub mod network;
pub mod protocol;
pub mod handler;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MemlinkError, Result};
pub use config::Config;
pub use handler::{
    BatchEvent, BatchGet, DeleteRequest, GatRequest, GetEResponse, GetRequest, GetResponse,
    Handler, SetRequest, TouchRequest,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use network::Transport;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of memlink
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
