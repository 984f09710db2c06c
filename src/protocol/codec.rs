//! Protocol codec
//!
//! Stream-level encoding of commands and decoding of responses.
//!
//! ## Request Layout
//! ```text
//! ┌──────────────┬──────────────┬──────────┬─────────────────┐
//! │ Header (24)  │ Extras (0-8) │   Key    │  Value (stores) │
//! └──────────────┴──────────────┴──────────┴─────────────────┘
//! ```
//!
//! ### Extras by Command
//! - SET / ADD / REPLACE: flags (4) + exptime (4)
//! - TOUCH / GAT:         exptime (4)
//! - everything else:     none
//!
//! The `write_*_cmd` functions write header, extras and key only. Stores
//! follow up with the raw value bytes, so large payloads are never copied
//! into the command buffer.

use std::io::{self, BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MemlinkError, Result};

use super::command::{Opcode, RequestHeader, HEADER_SIZE};
use super::pool::{HeaderPool, PooledHeader};
use super::response::ResponseHeader;

/// Maximum body size accepted when parsing requests (16 MB)
pub const MAX_BODY_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding
// =============================================================================

/// Write the header, extras and key of a command.
///
/// Returns the number of bytes written.
fn write_frame<W: Write>(
    writer: &mut W,
    header: &RequestHeader,
    extras: &[u8],
    key: &[u8],
) -> Result<usize> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + extras.len() + key.len());
    header.encode(&mut buf);
    buf.put_slice(extras);
    buf.put_slice(key);

    writer.write_all(&buf)?;
    Ok(buf.len())
}

/// Write a storage command whose value of `value_len` bytes follows.
///
/// Flags and exptime only go on the wire for opcodes that carry them;
/// append and prepend ignore both.
pub fn write_store_cmd<W: Write>(
    writer: &mut W,
    opcode: Opcode,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    if !opcode.has_value() {
        return Err(MemlinkError::InvalidRequest(format!(
            "{:?} is not a storage command",
            opcode
        )));
    }

    let header = RequestHeader::for_key(opcode, key, value_len, opaque)?;

    let mut extras = [0u8; 8];
    extras[..4].copy_from_slice(&flags.to_be_bytes());
    extras[4..].copy_from_slice(&exptime.to_be_bytes());

    write_frame(
        writer,
        &header,
        &extras[..header.extras_length as usize],
        key,
    )
}

pub fn write_set_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    write_store_cmd(writer, Opcode::Set, key, flags, exptime, value_len, opaque)
}

pub fn write_add_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    write_store_cmd(writer, Opcode::Add, key, flags, exptime, value_len, opaque)
}

pub fn write_replace_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    write_store_cmd(writer, Opcode::Replace, key, flags, exptime, value_len, opaque)
}

pub fn write_append_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    write_store_cmd(writer, Opcode::Append, key, 0, 0, value_len, opaque)
}

pub fn write_prepend_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    value_len: usize,
    opaque: u32,
) -> Result<usize> {
    write_store_cmd(writer, Opcode::Prepend, key, 0, 0, value_len, opaque)
}

pub fn write_get_cmd<W: Write>(writer: &mut W, key: &[u8], opaque: u32) -> Result<usize> {
    let header = RequestHeader::for_key(Opcode::Get, key, 0, opaque)?;
    write_frame(writer, &header, &[], key)
}

pub fn write_gete_cmd<W: Write>(writer: &mut W, key: &[u8], opaque: u32) -> Result<usize> {
    let header = RequestHeader::for_key(Opcode::GetE, key, 0, opaque)?;
    write_frame(writer, &header, &[], key)
}

pub fn write_gat_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    exptime: u32,
    opaque: u32,
) -> Result<usize> {
    let header = RequestHeader::for_key(Opcode::Gat, key, 0, opaque)?;
    write_frame(writer, &header, &exptime.to_be_bytes(), key)
}

pub fn write_delete_cmd<W: Write>(writer: &mut W, key: &[u8], opaque: u32) -> Result<usize> {
    let header = RequestHeader::for_key(Opcode::Delete, key, 0, opaque)?;
    write_frame(writer, &header, &[], key)
}

pub fn write_touch_cmd<W: Write>(
    writer: &mut W,
    key: &[u8],
    exptime: u32,
    opaque: u32,
) -> Result<usize> {
    let header = RequestHeader::for_key(Opcode::Touch, key, 0, opaque)?;
    write_frame(writer, &header, &exptime.to_be_bytes(), key)
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Read one response header into a header borrowed from `pool`.
///
/// The caller must consume exactly `total_body_length` body bytes before
/// reading the next header.
pub fn read_response_header<'p, R: Read>(
    reader: &mut R,
    pool: &'p HeaderPool,
) -> Result<PooledHeader<'p>> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;

    let mut header = pool.acquire();
    header.decode_from(&bytes)?;
    Ok(header)
}

/// Skip exactly `len` bytes of the read stream.
///
/// Returns the number of bytes skipped; a stream that ends early is an
/// `UnexpectedEof` error, with the short count lost along with the framing.
pub fn discard<R: BufRead>(reader: &mut R, len: u64) -> io::Result<u64> {
    let mut remaining = len;
    while remaining > 0 {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended with {} of {} body bytes unread", remaining, len),
            ));
        }
        let step = available.len().min(remaining as usize);
        reader.consume(step);
        remaining -= step as u64;
    }
    Ok(len)
}

/// Read exactly `len` bytes into an owned buffer
pub fn read_exact_bytes<R: Read>(reader: &mut R, len: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(Bytes::from(buf))
}

// =============================================================================
// Server-side helpers
// =============================================================================

/// A fully read request
#[derive(Debug, Clone)]
pub struct Request {
    pub header: RequestHeader,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Request {
    /// Big-endian u32 at `offset` of the extras, if present
    pub fn extras_u32(&self, offset: usize) -> Option<u32> {
        let bytes = self.extras.get(offset..offset + 4)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Read a complete request from a stream
///
/// Blocks until a complete request is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let mut bytes = [0u8; HEADER_SIZE];
    reader.read_exact(&mut bytes)?;
    let header = RequestHeader::parse(&bytes)?;

    if header.total_body_length > MAX_BODY_SIZE {
        return Err(MemlinkError::Protocol(format!(
            "Request body too large: {} bytes (max {})",
            header.total_body_length, MAX_BODY_SIZE
        )));
    }

    let extras = read_exact_bytes(reader, header.extras_length as usize)?;
    let key = read_exact_bytes(reader, header.key_length as usize)?;
    let value = read_exact_bytes(reader, header.value_length())?;

    Ok(Request {
        header,
        extras,
        key,
        value,
    })
}

/// Write a response to a stream and flush it.
///
/// The length fields of `header` are derived from the body parts.
pub fn write_response<W: Write>(
    writer: &mut W,
    mut header: ResponseHeader,
    extras: &[u8],
    key: &[u8],
    value: &[u8],
) -> Result<usize> {
    header.extras_length = u8::try_from(extras.len())
        .map_err(|_| MemlinkError::InvalidRequest("extras exceed 255 bytes".to_string()))?;
    header.key_length = u16::try_from(key.len())
        .map_err(|_| MemlinkError::InvalidRequest("key exceeds 65535 bytes".to_string()))?;
    let body = extras.len() + key.len() + value.len();
    header.total_body_length = u32::try_from(body)
        .map_err(|_| MemlinkError::InvalidRequest(format!("body of {} bytes exceeds u32", body)))?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body);
    header.encode(&mut buf);
    buf.put_slice(extras);
    buf.put_slice(key);
    buf.put_slice(value);

    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(buf.len())
}
