//! Error types for memlink
//!
//! Provides a unified error type for all handler operations.
//!
//! A cache miss is never an error: get-like calls report it through the
//! `miss` flag of their response. `KeyNotFound` only surfaces from commands
//! that have no miss variant (delete, touch, replace).

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using MemlinkError
pub type Result<T> = std::result::Result<T, MemlinkError>;

/// Unified error type for memlink operations
#[derive(Debug, Error)]
pub enum MemlinkError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Classified Status Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Key exists")]
    KeyExists,

    #[error("Server error: {reason} (status 0x{status:04x})")]
    Server { status: u16, reason: &'static str },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Batch worker panicked")]
    WorkerPanicked,
}

impl MemlinkError {
    /// Build a server error for a raw status, naming it when the code is known.
    pub fn server(status: u16) -> Self {
        MemlinkError::Server {
            status,
            reason: Status::describe(status),
        }
    }

    /// Whether the connection framing can no longer be trusted.
    ///
    /// A handler that returned a fatal error must be closed and discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MemlinkError::Io(_) | MemlinkError::Protocol(_) | MemlinkError::WorkerPanicked
        )
    }

    /// The raw wire status behind a classified error, if there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            MemlinkError::KeyNotFound => Some(Status::KeyNotFound as u16),
            MemlinkError::KeyExists => Some(Status::KeyExists as u16),
            MemlinkError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
