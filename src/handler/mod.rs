//! Handler Module
//!
//! Speaks the binary protocol over one connection.
//!
//! ## Responsibilities
//! - Encode each command, write it, flush, read the response header
//! - Classify the status into hit, miss or error
//! - Consume every body byte the server declared, whatever the outcome
//! - Stream batched gets from a worker that owns the connection
//!
//! ## Framing
//! Every response header announces a body length. The handler reads or
//! discards exactly that many bytes before the next command goes out, so a
//! failed command never leaves bytes behind for the next one to trip over.
//! If that discard itself fails the connection is lost and the I/O error
//! is returned in place of the classified one.

mod batch;
mod request;

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{MemlinkError, Result};
use crate::metrics::Metrics;
use crate::network::{self, Transport};
use crate::protocol::{
    discard, read_exact_bytes, read_response_header, write_delete_cmd, write_gat_cmd,
    write_gete_cmd, write_get_cmd, write_store_cmd, write_touch_cmd, HeaderPool, Opcode,
    Outcome, ResponseHeader, HEADER_SIZE,
};

pub use batch::{BatchEvent, BatchGet};
pub use request::{
    DeleteRequest, GatRequest, GetEResponse, GetRequest, GetResponse, SetRequest, TouchRequest,
};

use request::{BatchResponse, Fetched};

/// Handler for one connection to a cache server
///
/// ## Concurrency Model: one command at a time
///
/// Every method takes `&mut self`, and batched gets take the handler by
/// value for as long as their worker runs, so no two operations can ever
/// share the connection. [`BatchGet::finish`] hands the handler back.
pub struct Handler<T: Transport = TcpStream> {
    /// Read half (buffered)
    reader: BufReader<T>,

    /// Write half (buffered; flushed once per command)
    writer: BufWriter<T>,

    /// Recycled response headers, shared with batch workers
    pool: Arc<HeaderPool>,

    /// Byte and outcome counters
    metrics: Arc<Metrics>,

    /// Read-ahead allowed to batch workers
    batch_buffer: usize,

    /// Peer address for logging
    peer: String,
}

impl Handler<TcpStream> {
    /// Connect to the configured server
    pub fn connect(config: &Config) -> Result<Self> {
        let stream = network::connect(config)?;
        Self::with_config(stream, config)
    }
}

impl<T: Transport> Handler<T> {
    /// Wrap a connection using default buffer sizes
    pub fn new(conn: T) -> Result<Self> {
        Self::with_config(conn, &Config::default())
    }

    /// Wrap a connection using the buffer settings of `config`
    pub fn with_config(conn: T, config: &Config) -> Result<Self> {
        let peer = conn.peer();
        let read_half = conn.try_clone()?;

        Ok(Self {
            reader: BufReader::with_capacity(config.read_buffer_size, read_half),
            writer: BufWriter::with_capacity(config.write_buffer_size, conn),
            pool: Arc::new(HeaderPool::new(config.header_pool_capacity)),
            metrics: Arc::new(Metrics::new()),
            batch_buffer: config.batch_buffer,
            peer,
        })
    }

    /// Record into shared counters instead of the handler's own
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn header_pool(&self) -> &Arc<HeaderPool> {
        &self.pool
    }

    /// Get the peer address string
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Flush pending writes and shut the connection down.
    ///
    /// The shutdown is attempted even when the flush fails; the flush error
    /// wins.
    pub fn close(mut self) -> Result<()> {
        tracing::debug!("Closing connection to {}", self.peer);
        let flushed = self.writer.flush();
        let shut = self.writer.get_ref().shutdown();
        flushed?;
        shut?;
        Ok(())
    }

    // =========================================================================
    // Storage Commands
    // =========================================================================

    /// Store a value unconditionally
    pub fn set(&mut self, cmd: &SetRequest) -> Result<()> {
        self.store(Opcode::Set, cmd)
    }

    /// Store a value only if the key is absent.
    ///
    /// A live key yields `KeyExists`, which is the expected answer when
    /// probing for existence.
    pub fn add(&mut self, cmd: &SetRequest) -> Result<()> {
        self.store(Opcode::Add, cmd)
    }

    /// Store a value only if the key is present; otherwise `KeyNotFound`
    pub fn replace(&mut self, cmd: &SetRequest) -> Result<()> {
        self.store(Opcode::Replace, cmd)
    }

    /// Append to an existing value. Flags and exptime are not sent.
    pub fn append(&mut self, cmd: &SetRequest) -> Result<()> {
        self.store(Opcode::Append, cmd)
    }

    /// Prepend to an existing value. Flags and exptime are not sent.
    pub fn prepend(&mut self, cmd: &SetRequest) -> Result<()> {
        self.store(Opcode::Prepend, cmd)
    }

    fn store(&mut self, opcode: Opcode, cmd: &SetRequest) -> Result<()> {
        tracing::trace!(
            "{:?} {} ({} bytes) to {}",
            opcode,
            String::from_utf8_lossy(&cmd.key),
            cmd.data.len(),
            self.peer
        );
        self.metrics.record_command();

        let result = self.store_inner(opcode, cmd);
        self.track(result)
    }

    fn store_inner(&mut self, opcode: Opcode, cmd: &SetRequest) -> Result<()> {
        let written = write_store_cmd(
            &mut self.writer,
            opcode,
            &cmd.key,
            cmd.flags,
            cmd.exptime,
            cmd.data.len(),
            0,
        )?;
        self.writer.write_all(&cmd.data)?;
        self.metrics
            .add_bytes_written((written + cmd.data.len()) as u64);

        self.simple_response()
    }

    // =========================================================================
    // Read Commands
    // =========================================================================

    /// Batched get.
    ///
    /// The handler moves into a worker thread that fetches the keys in
    /// order and streams one [`GetResponse`] per key; a miss is a response
    /// with `miss` set, not an error. The first other error ends the
    /// stream. Call [`BatchGet::finish`] to get the handler back.
    pub fn get(self, cmd: GetRequest) -> BatchGet<GetResponse, T> {
        batch::spawn(self, cmd)
    }

    /// Batched get that also recovers each key's expiration
    pub fn get_e(self, cmd: GetRequest) -> BatchGet<GetEResponse, T> {
        batch::spawn(self, cmd)
    }

    /// Get-and-touch: fetch a key and set a new expiration.
    ///
    /// A miss is returned as a response with `miss` set.
    pub fn gat(&mut self, cmd: &GatRequest) -> Result<GetResponse> {
        tracing::trace!("GAT {} to {}", String::from_utf8_lossy(&cmd.key), self.peer);
        self.metrics.record_command();

        let result = self.fetch(Opcode::Gat, &cmd.key, cmd.exptime, cmd.opaque);
        let fetched = self.track(result)?;
        Ok(GetResponse::build(cmd.key.clone(), false, cmd.opaque, fetched))
    }

    /// Fetch one key for a batch worker and build its response
    pub(crate) fn fetch_for<R: BatchResponse>(
        &mut self,
        key: &[u8],
        quiet: bool,
        opaque: u32,
    ) -> Result<R> {
        let opcode = if R::WITH_EXPTIME {
            Opcode::GetE
        } else {
            Opcode::Get
        };
        self.metrics.record_command();

        let result = self.fetch(opcode, key, 0, opaque);
        let fetched = self.track(result)?;
        Ok(R::build(key.to_vec(), quiet, opaque, fetched))
    }

    /// Single-key read path shared by get, gete and gat.
    ///
    /// `Ok(None)` is a miss.
    fn fetch(
        &mut self,
        opcode: Opcode,
        key: &[u8],
        exptime: u32,
        opaque: u32,
    ) -> Result<Option<Fetched>> {
        let written = match opcode {
            Opcode::Get => write_get_cmd(&mut self.writer, key, opaque)?,
            Opcode::GetE => write_gete_cmd(&mut self.writer, key, opaque)?,
            Opcode::Gat => write_gat_cmd(&mut self.writer, key, exptime, opaque)?,
            other => {
                return Err(MemlinkError::InvalidRequest(format!(
                    "{:?} is not a read command",
                    other
                )))
            }
        };
        self.metrics.add_bytes_written(written as u64);
        self.writer.flush()?;

        let header = self.read_header()?;
        match header.outcome() {
            Outcome::Success => {}
            Outcome::NotFound => {
                self.skip_body(&header)?;
                self.metrics.record_miss();
                return Ok(None);
            }
            outcome => {
                self.skip_body(&header)?;
                return outcome.into_result().map(|()| None);
            }
        }

        self.read_value(&header, opcode == Opcode::GetE).map(Some)
    }

    /// Read the body of a successful get-like response.
    ///
    /// Layout: extras (flags, then exptime for gete), optional key echo,
    /// value. Extras beyond those decoded are skipped.
    fn read_value(&mut self, header: &ResponseHeader, with_exptime: bool) -> Result<Fetched> {
        let value_len = header.value_length()?;
        let extras_len = header.extras_length as usize;
        let needed = if with_exptime { 8 } else { 4 };
        if extras_len < needed {
            return Err(MemlinkError::Protocol(format!(
                "Get response carries {} extras bytes, expected at least {}",
                extras_len, needed
            )));
        }

        let extras = read_exact_bytes(&mut self.reader, extras_len)?;
        let flags = u32::from_be_bytes([extras[0], extras[1], extras[2], extras[3]]);
        let exptime = if with_exptime {
            u32::from_be_bytes([extras[4], extras[5], extras[6], extras[7]])
        } else {
            0
        };

        discard(&mut self.reader, header.key_length as u64)?;
        let data = read_exact_bytes(&mut self.reader, value_len)?;
        self.metrics.add_bytes_read(header.total_body_length as u64);

        Ok(Fetched {
            flags,
            exptime,
            cas: header.cas,
            data,
        })
    }

    // =========================================================================
    // Key Commands
    // =========================================================================

    /// Delete a key; an absent key yields `KeyNotFound`
    pub fn delete(&mut self, cmd: &DeleteRequest) -> Result<()> {
        tracing::trace!("DELETE {} to {}", String::from_utf8_lossy(&cmd.key), self.peer);
        self.metrics.record_command();

        let result = write_delete_cmd(&mut self.writer, &cmd.key, 0).and_then(|written| {
            self.metrics.add_bytes_written(written as u64);
            self.simple_response()
        });
        self.track(result)
    }

    /// Reset a key's expiration; an absent key yields `KeyNotFound`
    pub fn touch(&mut self, cmd: &TouchRequest) -> Result<()> {
        tracing::trace!("TOUCH {} to {}", String::from_utf8_lossy(&cmd.key), self.peer);
        self.metrics.record_command();

        let result =
            write_touch_cmd(&mut self.writer, &cmd.key, cmd.exptime, 0).and_then(|written| {
                self.metrics.add_bytes_written(written as u64);
                self.simple_response()
            });
        self.track(result)
    }

    // =========================================================================
    // Response Plumbing
    // =========================================================================

    /// Flush, read a header, consume its whole body and classify it.
    ///
    /// Used by commands whose success carries no payload.
    fn simple_response(&mut self) -> Result<()> {
        self.writer.flush()?;
        let header = self.read_header()?;
        self.skip_body(&header)?;
        header.outcome().into_result()
    }

    /// Read the next header and copy it out of the pool
    fn read_header(&mut self) -> Result<ResponseHeader> {
        let header = read_response_header(&mut self.reader, &self.pool)?.release();
        self.metrics.add_bytes_read(HEADER_SIZE as u64);
        Ok(header)
    }

    /// Discard the declared body of a response we do not decode
    fn skip_body(&mut self, header: &ResponseHeader) -> Result<()> {
        let len = header.total_body_length as u64;
        match discard(&mut self.reader, len) {
            Ok(n) => {
                self.metrics.add_bytes_read(n);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Lost framing with {}: discarding {} body bytes failed: {}",
                    self.peer,
                    len,
                    e
                );
                Err(MemlinkError::Io(e))
            }
        }
    }

    fn track<V>(&self, result: Result<V>) -> Result<V> {
        if let Err(ref e) = result {
            self.metrics.record_error();
            if e.is_fatal() {
                tracing::warn!("Connection to {} failed: {}", self.peer, e);
            }
        }
        result
    }
}
