//! Transport abstraction for daemon channels
//!
//! Each logical connection owns one transport. Production uses a Unix
//! domain socket per channel; tests substitute a scripted mock through the
//! same factory seam.

pub mod mock;
pub mod unix;

pub use mock::MockTransport;
pub use unix::UnixTransport;

use crate::error::Result;
use std::sync::Arc;

/// Byte stream to the daemon
///
/// Implementations block until the full buffer is moved; short reads and
/// writes never surface to the protocol engine.
pub trait Transport: Send {
    /// Write the whole buffer
    fn send(&mut self, buf: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes
    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Opens a transport for one channel, called once per connection
///
/// The argument is the daemon channel name the connection resolved to.
pub type TransportFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Transport>> + Send + Sync>;
