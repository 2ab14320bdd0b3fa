//! Scripted transport for tests
//!
//! Records every packet the client sends and serves replies from a
//! pre-loaded byte queue. Clones share state so a test can keep a handle
//! while the client owns the boxed transport.

use crate::error::{Error, Result};
use crate::protocol::{packet, Command, HEADER_LEN, PROTOCOL_VERSION};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    sent: Vec<Vec<u8>>,
    pending: VecDeque<u8>,
    fail_sends: bool,
}

/// In-memory transport with scripted replies
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one complete reply packet
    pub fn push_reply(&self, bytes: Vec<u8>) {
        self.inner.lock().pending.extend(bytes);
    }

    /// Queue a DONE reply with the given status
    pub fn push_done(&self, status: i32) {
        self.push_reply(reply(Command::Done, &status.to_le_bytes()));
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self) {
        self.inner.lock().fail_sends = true;
    }

    /// Packets sent so far, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().sent.clone()
    }

    /// Command tags of the packets sent so far
    pub fn sent_commands(&self) -> Vec<u16> {
        self.inner
            .lock()
            .sent
            .iter()
            .map(|p| u16::from_le_bytes([p[2], p[3]]))
            .collect()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, buf: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return Err(Error::Communication("mock send failure".to_string()));
        }
        inner.sent.push(buf.to_vec());
        Ok(())
    }

    fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.pending.len() < buf.len() {
            return Err(Error::Communication(format!(
                "mock reply queue short: want {}, have {}",
                buf.len(),
                inner.pending.len()
            )));
        }
        for slot in buf.iter_mut() {
            // len checked above
            *slot = inner.pending.pop_front().unwrap_or(0);
        }
        Ok(())
    }
}

/// Build a complete reply packet for scripting
pub fn reply(cmd: Command, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    buf.extend_from_slice(&(cmd as u16).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Build a GET_STRUCT reply packet for scripting
pub fn data_reply(state: i32, accuracy: i32, unit: i32, values: &[f32]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&state.to_le_bytes());
    payload.extend_from_slice(&accuracy.to_le_bytes());
    payload.extend_from_slice(&unit.to_le_bytes());
    payload.extend_from_slice(&(values.len() as i32).to_le_bytes());
    for i in 0..packet::REPLY_VALUES {
        let v = values.get(i).copied().unwrap_or(0.0);
        payload.extend_from_slice(&v.to_le_bytes());
    }
    reply(Command::GetStruct, &payload)
}

/// Build a GET_PROPERTY reply packet for scripting
pub fn property_reply(
    state: i32,
    unit: i32,
    min: f32,
    max: f32,
    resolution: f32,
    name: &str,
    vendor: &str,
) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&state.to_le_bytes());
    payload.extend_from_slice(&unit.to_le_bytes());
    payload.extend_from_slice(&min.to_le_bytes());
    payload.extend_from_slice(&max.to_le_bytes());
    payload.extend_from_slice(&resolution.to_le_bytes());
    let mut name_buf = [0u8; 32];
    let n = name.len().min(31);
    name_buf[..n].copy_from_slice(&name.as_bytes()[..n]);
    payload.extend_from_slice(&name_buf);
    let mut vendor_buf = [0u8; 32];
    let n = vendor.len().min(31);
    vendor_buf[..n].copy_from_slice(&vendor.as_bytes()[..n]);
    payload.extend_from_slice(&vendor_buf);
    reply(Command::GetProperty, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_sends_and_serves_replies() {
        let mock = MockTransport::new();
        mock.push_done(0);

        let mut boxed: Box<dyn Transport> = Box::new(mock.clone());
        boxed.send(&packet::hello("gyro_datastream")).unwrap();

        let mut hdr = [0u8; HEADER_LEN];
        boxed.recv_exact(&mut hdr).unwrap();
        assert_eq!(u16::from_le_bytes([hdr[2], hdr[3]]), Command::Done as u16);

        let mut status = [0u8; 4];
        boxed.recv_exact(&mut status).unwrap();
        assert_eq!(i32::from_le_bytes(status), 0);

        assert_eq!(mock.sent_commands(), vec![Command::Hello as u16]);
    }

    #[test]
    fn empty_queue_is_a_communication_error() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 4];
        assert!(matches!(
            mock.recv_exact(&mut buf),
            Err(Error::Communication(_))
        ));
    }

    #[test]
    fn fail_sends_flag() {
        let mut mock = MockTransport::new();
        mock.fail_sends();
        assert!(mock.send(&[1, 2, 3]).is_err());
    }
}
