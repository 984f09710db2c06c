//! Command definitions
//!
//! Opcodes and the request header written in front of every command.

use bytes::{Buf, BufMut};

use crate::error::{MemlinkError, Result};

/// Magic byte opening every request packet
pub const REQUEST_MAGIC: u8 = 0x80;

/// Fixed header size shared by requests and responses
pub const HEADER_SIZE: usize = 24;

/// Extras length of set/add/replace: flags (4) + exptime (4)
pub const STORE_EXTRAS_LEN: u8 = 8;

/// Extras length of touch/gat: exptime (4)
pub const EXPTIME_EXTRAS_LEN: u8 = 4;

/// Opcodes spoken by the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Append = 0x0E,
    Prepend = 0x0F,
    Touch = 0x1C,
    Gat = 0x1D,
    /// Get with expiration; the response extras carry flags then exptime.
    GetE = 0x40,
}

impl Opcode {
    /// Try to convert a byte to an opcode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Opcode::Get),
            0x01 => Some(Opcode::Set),
            0x02 => Some(Opcode::Add),
            0x03 => Some(Opcode::Replace),
            0x04 => Some(Opcode::Delete),
            0x0E => Some(Opcode::Append),
            0x0F => Some(Opcode::Prepend),
            0x1C => Some(Opcode::Touch),
            0x1D => Some(Opcode::Gat),
            0x40 => Some(Opcode::GetE),
            _ => None,
        }
    }

    /// Number of extras bytes this opcode carries in a request
    pub fn request_extras_len(self) -> u8 {
        match self {
            Opcode::Set | Opcode::Add | Opcode::Replace => STORE_EXTRAS_LEN,
            Opcode::Touch | Opcode::Gat => EXPTIME_EXTRAS_LEN,
            Opcode::Get | Opcode::GetE | Opcode::Delete | Opcode::Append | Opcode::Prepend => 0,
        }
    }

    /// Whether the request body ends with a value payload
    pub fn has_value(self) -> bool {
        matches!(
            self,
            Opcode::Set | Opcode::Add | Opcode::Replace | Opcode::Append | Opcode::Prepend
        )
    }
}

/// Binary protocol request header (24 bytes).
///
/// ```text
///   +---------------+---------------+---------------+---------------+
///  0| Magic         | Opcode        | Key length                    |
///   +---------------+---------------+---------------+---------------+
///  4| Extras length | Data type     | vbucket id                    |
///   +---------------+---------------+---------------+---------------+
///  8| Total body length                                             |
///   +---------------+---------------+---------------+---------------+
/// 12| Opaque                                                        |
///   +---------------+---------------+---------------+---------------+
/// 16| CAS                                                           |
///   |                                                               |
///   +---------------+---------------+---------------+---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub opcode: Opcode,
    pub key_length: u16,
    pub extras_length: u8,
    pub vbucket_id: u16,
    /// extras_length + key_length + value length
    pub total_body_length: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl RequestHeader {
    /// Build the header for `opcode` addressing `key` with a value of `value_len` bytes.
    ///
    /// Rejects keys and bodies the header fields cannot describe.
    pub fn for_key(opcode: Opcode, key: &[u8], value_len: usize, opaque: u32) -> Result<Self> {
        let key_length = u16::try_from(key.len()).map_err(|_| {
            MemlinkError::InvalidRequest(format!("key of {} bytes exceeds 65535", key.len()))
        })?;
        let extras_length = opcode.request_extras_len();

        let body = extras_length as usize + key.len() + value_len;
        let total_body_length = u32::try_from(body).map_err(|_| {
            MemlinkError::InvalidRequest(format!("body of {} bytes exceeds u32", body))
        })?;

        Ok(Self {
            opcode,
            key_length,
            extras_length,
            vbucket_id: 0,
            total_body_length,
            opaque,
            cas: 0,
        })
    }

    /// Encode the header into a buffer
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(REQUEST_MAGIC);
        buf.put_u8(self.opcode as u8);
        buf.put_u16(self.key_length);
        buf.put_u8(self.extras_length);
        buf.put_u8(0);
        buf.put_u16(self.vbucket_id);
        buf.put_u32(self.total_body_length);
        buf.put_u32(self.opaque);
        buf.put_u64(self.cas);
    }

    /// Parse a request header
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let mut buf = &bytes[..];

        let magic = buf.get_u8();
        if magic != REQUEST_MAGIC {
            return Err(MemlinkError::Protocol(format!(
                "Invalid request magic: 0x{:02x}",
                magic
            )));
        }

        let raw_opcode = buf.get_u8();
        let opcode = Opcode::from_u8(raw_opcode).ok_or_else(|| {
            MemlinkError::Protocol(format!("Unknown opcode: 0x{:02x}", raw_opcode))
        })?;
        let key_length = buf.get_u16();
        let extras_length = buf.get_u8();
        let _data_type = buf.get_u8();
        let vbucket_id = buf.get_u16();
        let total_body_length = buf.get_u32();
        let opaque = buf.get_u32();
        let cas = buf.get_u64();

        if (extras_length as u32 + key_length as u32) > total_body_length {
            return Err(MemlinkError::Protocol(format!(
                "Request body of {} bytes cannot hold {} extras and {} key bytes",
                total_body_length, extras_length, key_length
            )));
        }

        Ok(Self {
            opcode,
            key_length,
            extras_length,
            vbucket_id,
            total_body_length,
            opaque,
            cas,
        })
    }

    /// Length of the value that follows extras and key
    pub fn value_length(&self) -> usize {
        self.total_body_length as usize - self.extras_length as usize - self.key_length as usize
    }
}
