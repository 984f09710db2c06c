//! Transport
//!
//! The duplex byte stream a handler runs over.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::config::Config;
use crate::error::Result;

/// A connection that can be split into independent read and write halves.
///
/// Both halves address the same underlying stream; the handler wraps one
/// in a buffered reader and the other in a buffered writer.
pub trait Transport: Read + Write + Send + Sized + 'static {
    /// Open a second handle onto the same stream
    fn try_clone(&self) -> io::Result<Self>;

    /// Shut down both directions; every handle becomes unusable
    fn shutdown(&self) -> io::Result<()>;

    /// Peer description for logging
    fn peer(&self) -> String {
        "unknown".to_string()
    }
}

impl Transport for TcpStream {
    fn try_clone(&self) -> io::Result<Self> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn try_clone(&self) -> io::Result<Self> {
        std::os::unix::net::UnixStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, Shutdown::Both)
    }
}

/// Open a TCP connection to the configured server
///
/// Applies the connect timeout, TCP_NODELAY and socket timeouts from `config`.
pub fn connect(config: &Config) -> Result<TcpStream> {
    let addr = config.resolve_addr()?;

    let stream = match config.connect_timeout() {
        Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
        None => TcpStream::connect(addr)?,
    };

    stream.set_nodelay(config.nodelay)?;
    stream.set_read_timeout(config.read_timeout())?;
    stream.set_write_timeout(config.write_timeout())?;

    tracing::debug!("Connected to {}", addr);
    Ok(stream)
}
