//! Response definitions
//!
//! Status codes, the response header, and status classification.

use bytes::{Buf, BufMut};

use crate::error::{MemlinkError, Result};

use super::command::HEADER_SIZE;

/// Magic byte opening every response packet
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Response status codes defined by the binary protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Status {
    NoError = 0x0000,
    KeyNotFound = 0x0001,
    KeyExists = 0x0002,
    ValueTooLarge = 0x0003,
    InvalidArguments = 0x0004,
    ItemNotStored = 0x0005,
    NonNumericValue = 0x0006,
    WrongVbucket = 0x0007,
    AuthError = 0x0008,
    AuthContinue = 0x0009,
    UnknownCommand = 0x0081,
    OutOfMemory = 0x0082,
    NotSupported = 0x0083,
    InternalError = 0x0084,
    Busy = 0x0085,
    TempFailure = 0x0086,
}

impl Status {
    /// Try to convert a raw status to a known code
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Status::NoError),
            0x0001 => Some(Status::KeyNotFound),
            0x0002 => Some(Status::KeyExists),
            0x0003 => Some(Status::ValueTooLarge),
            0x0004 => Some(Status::InvalidArguments),
            0x0005 => Some(Status::ItemNotStored),
            0x0006 => Some(Status::NonNumericValue),
            0x0007 => Some(Status::WrongVbucket),
            0x0008 => Some(Status::AuthError),
            0x0009 => Some(Status::AuthContinue),
            0x0081 => Some(Status::UnknownCommand),
            0x0082 => Some(Status::OutOfMemory),
            0x0083 => Some(Status::NotSupported),
            0x0084 => Some(Status::InternalError),
            0x0085 => Some(Status::Busy),
            0x0086 => Some(Status::TempFailure),
            _ => None,
        }
    }

    /// Short description of a raw status, known or not
    pub fn describe(value: u16) -> &'static str {
        match Status::from_u16(value) {
            Some(Status::NoError) => "No error",
            Some(Status::KeyNotFound) => "Key not found",
            Some(Status::KeyExists) => "Key exists",
            Some(Status::ValueTooLarge) => "Value too large",
            Some(Status::InvalidArguments) => "Invalid arguments",
            Some(Status::ItemNotStored) => "Item not stored",
            Some(Status::NonNumericValue) => "Incr/Decr on non-numeric value",
            Some(Status::WrongVbucket) => "Wrong vbucket",
            Some(Status::AuthError) => "Authentication error",
            Some(Status::AuthContinue) => "Authentication continue",
            Some(Status::UnknownCommand) => "Unknown command",
            Some(Status::OutOfMemory) => "Out of memory",
            Some(Status::NotSupported) => "Not supported",
            Some(Status::InternalError) => "Internal error",
            Some(Status::Busy) => "Busy",
            Some(Status::TempFailure) => "Temporary failure",
            None => "Unknown status",
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Semantic outcome of a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    Exists,
    /// Any other status, kept raw for diagnostics
    Failure(u16),
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    /// Map the outcome onto the crate error type
    pub fn into_result(self) -> Result<()> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::NotFound => Err(MemlinkError::KeyNotFound),
            Outcome::Exists => Err(MemlinkError::KeyExists),
            Outcome::Failure(status) => Err(MemlinkError::server(status)),
        }
    }
}

/// Classify a raw wire status.
///
/// Total over `u16`: codes outside the known set are failures, never success.
pub fn classify(status: u16) -> Outcome {
    match Status::from_u16(status) {
        Some(Status::NoError) => Outcome::Success,
        Some(Status::KeyNotFound) => Outcome::NotFound,
        Some(Status::KeyExists) => Outcome::Exists,
        _ => Outcome::Failure(status),
    }
}

// =============================================================================
// Response Header
// =============================================================================

/// Binary protocol response header (24 bytes).
///
/// Same layout as the request header with the vbucket field replaced by
/// the status. The opcode is kept raw since it is only echoed back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_length: u16,
    pub extras_length: u8,
    pub data_type: u8,
    pub status: u16,
    /// extras_length + key_length + value length
    pub total_body_length: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl ResponseHeader {
    /// Header with the given status and no body
    pub fn new(opcode: u8, status: u16) -> Self {
        Self {
            opcode,
            status,
            ..Self::default()
        }
    }

    /// Decode a response header in place.
    ///
    /// A bad magic byte means the stream is no longer aligned on a header.
    pub fn decode_from(&mut self, bytes: &[u8; HEADER_SIZE]) -> Result<()> {
        let mut buf = &bytes[..];

        let magic = buf.get_u8();
        if magic != RESPONSE_MAGIC {
            return Err(MemlinkError::Protocol(format!(
                "Invalid response magic: 0x{:02x}",
                magic
            )));
        }

        self.opcode = buf.get_u8();
        self.key_length = buf.get_u16();
        self.extras_length = buf.get_u8();
        self.data_type = buf.get_u8();
        self.status = buf.get_u16();
        self.total_body_length = buf.get_u32();
        self.opaque = buf.get_u32();
        self.cas = buf.get_u64();
        Ok(())
    }

    /// Parse a response header into a new value
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut header = Self::default();
        header.decode_from(bytes)?;
        Ok(header)
    }

    /// Encode the header into a buffer
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(RESPONSE_MAGIC);
        buf.put_u8(self.opcode);
        buf.put_u16(self.key_length);
        buf.put_u8(self.extras_length);
        buf.put_u8(self.data_type);
        buf.put_u16(self.status);
        buf.put_u32(self.total_body_length);
        buf.put_u32(self.opaque);
        buf.put_u64(self.cas);
    }

    /// Classify this header's status
    pub fn outcome(&self) -> Outcome {
        classify(self.status)
    }

    /// Length of the value that follows extras and key.
    ///
    /// Errors when the declared body cannot hold the declared extras and key.
    pub fn value_length(&self) -> Result<usize> {
        let prefix = self.extras_length as u32 + self.key_length as u32;
        self.total_body_length
            .checked_sub(prefix)
            .map(|len| len as usize)
            .ok_or_else(|| {
                MemlinkError::Protocol(format!(
                    "Response body of {} bytes cannot hold {} extras and {} key bytes",
                    self.total_body_length, self.extras_length, self.key_length
                ))
            })
    }

    /// Reset every field before the header goes back to a pool
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
