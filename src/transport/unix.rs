//! Unix domain socket transport

use crate::error::Result;
use crate::transport::Transport;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Blocking Unix domain socket connection to the daemon
pub struct UnixTransport {
    stream: UnixStream,
}

impl UnixTransport {
    /// Connect to the daemon socket
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref())?;
        log::debug!(
            "Transport: connected to {}",
            path.as_ref().display()
        );
        Ok(Self { stream })
    }
}

impl Transport for UnixTransport {
    fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf)?;
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf)?;
        Ok(())
    }
}
