//! Scripted in-memory transport
//!
//! Replies are queued up front; the protocol is strictly request/response,
//! so the handler always reads them in the order they were queued. Reading
//! past the script behaves like a peer that hung up.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use memlink::protocol::{read_request, write_response, Opcode, Request, ResponseHeader, Status};
use memlink::{Config, Handler, Transport};
use parking_lot::Mutex;

#[derive(Default)]
struct MockState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    shutdown: bool,
}

/// Both halves of the handler share one state
#[derive(Clone, Default)]
pub struct MockConn {
    state: Arc<Mutex<MockState>>,
}

impl MockConn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw reply bytes
    pub fn reply(&self, bytes: &[u8]) {
        self.state.lock().inbound.extend(bytes);
    }

    /// Reply bytes the handler has not read yet
    pub fn unread(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Everything the handler wrote, parsed into requests
    pub fn requests(&self) -> Vec<Request> {
        let bytes = self.state.lock().outbound.clone();
        let total = bytes.len() as u64;
        let mut cursor = Cursor::new(bytes);
        let mut requests = Vec::new();
        while cursor.position() < total {
            requests.push(read_request(&mut cursor).unwrap());
        }
        requests
    }

    pub fn written(&self) -> usize {
        self.state.lock().outbound.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }
}

impl Read for MockConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "shut down"));
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "shut down"));
        }
        state.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockConn {
    fn try_clone(&self) -> io::Result<Self> {
        Ok(self.clone())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.state.lock().shutdown = true;
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

pub fn setup_handler() -> (MockConn, Handler<MockConn>) {
    let conn = MockConn::new();
    let handler = Handler::new(conn.clone()).unwrap();
    (conn, handler)
}

pub fn setup_handler_with(config: &Config) -> (MockConn, Handler<MockConn>) {
    let conn = MockConn::new();
    let handler = Handler::with_config(conn.clone(), config).unwrap();
    (conn, handler)
}

fn encode(header: ResponseHeader, extras: &[u8], key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_response(&mut buffer, header, extras, key, value).unwrap();
    buffer
}

/// Bodyless success
pub fn ok(opcode: Opcode) -> Vec<u8> {
    encode(
        ResponseHeader::new(opcode as u8, Status::NoError as u16),
        b"",
        b"",
        b"",
    )
}

/// Any status with a diagnostic body, the way servers report errors
pub fn status(opcode: Opcode, status: u16, message: &str) -> Vec<u8> {
    encode(
        ResponseHeader::new(opcode as u8, status),
        b"",
        b"",
        message.as_bytes(),
    )
}

pub fn not_found(opcode: Opcode) -> Vec<u8> {
    status(opcode, Status::KeyNotFound as u16, "Not found")
}

/// Get/GAT hit: flags extras followed by the value
pub fn hit(opcode: Opcode, flags: u32, value: &[u8]) -> Vec<u8> {
    encode(
        ResponseHeader::new(opcode as u8, Status::NoError as u16),
        &flags.to_be_bytes(),
        b"",
        value,
    )
}

/// GetE hit: flags and exptime extras followed by the value
pub fn hit_e(flags: u32, exptime: u32, value: &[u8]) -> Vec<u8> {
    let mut extras = flags.to_be_bytes().to_vec();
    extras.extend_from_slice(&exptime.to_be_bytes());
    encode(
        ResponseHeader::new(Opcode::GetE as u8, Status::NoError as u16),
        &extras,
        b"",
        value,
    )
}

/// Hit that also echoes the key, as key-returning get variants do
pub fn hit_with_key(opcode: Opcode, flags: u32, key: &[u8], value: &[u8]) -> Vec<u8> {
    encode(
        ResponseHeader::new(opcode as u8, Status::NoError as u16),
        &flags.to_be_bytes(),
        key,
        value,
    )
}
