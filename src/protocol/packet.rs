//! Packet codec: header framing plus typed request and reply payloads

use crate::error::{Error, Result};
use crate::protocol::{Command, RegType};

/// Protocol version spoken by this client
pub const PROTOCOL_VERSION: u16 = 1;

/// Fixed header length in bytes
pub const HEADER_LEN: usize = 8;

/// Number of value slots in a data reply
pub const REPLY_VALUES: usize = 12;

/// Length of the name and vendor fields in a property reply
const NAME_LEN: usize = 32;

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command tag
    pub cmd: u16,
    /// Length of the payload following the header
    pub payload_size: u32,
}

impl Header {
    /// Decode a header from exactly `HEADER_LEN` bytes
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self> {
        let version = u16::from_le_bytes([buf[0], buf[1]]);
        if version != PROTOCOL_VERSION {
            return Err(Error::InvalidPacket(format!(
                "unsupported protocol version {}",
                version
            )));
        }
        Ok(Header {
            cmd: u16::from_le_bytes([buf[2], buf[3]]),
            payload_size: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }
}

fn packet(cmd: Command, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    buf.extend_from_slice(&(cmd as u16).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// HELLO request carrying the channel name
pub fn hello(channel: &str) -> Vec<u8> {
    packet(Command::Hello, channel.as_bytes())
}

/// Payload-less request (BYEBYE, STOP)
pub fn empty(cmd: Command) -> Vec<u8> {
    packet(cmd, &[])
}

/// START request with the caller's start option
pub fn start(option: i32) -> Vec<u8> {
    packet(Command::Start, &option.to_le_bytes())
}

/// REG request: add, delete or probe an event subscription
pub fn reg(reg_type: RegType, event_id: u32, interval_ms: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&(reg_type as u32).to_le_bytes());
    payload.extend_from_slice(&event_id.to_le_bytes());
    payload.extend_from_slice(&interval_ms.to_le_bytes());
    packet(Command::Reg, &payload)
}

/// GET_STRUCT request for one data set
pub fn get_struct(data_id: u32) -> Vec<u8> {
    packet(Command::GetStruct, &data_id.to_le_bytes())
}

/// GET_PROPERTY request, `level` is a data id or `class << 16 | 1`
pub fn get_property(level: u32) -> Vec<u8> {
    packet(Command::GetProperty, &level.to_le_bytes())
}

/// SET_VALUE request for a channel property
pub fn set_value(class: u32, property: u32, value: i64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&class.to_le_bytes());
    payload.extend_from_slice(&property.to_le_bytes());
    payload.extend_from_slice(&value.to_le_bytes());
    packet(Command::SetValue, &payload)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(Error::InvalidPacket(format!(
                "payload truncated at byte {} (need {})",
                self.buf.len(),
                end
            )));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decode a DONE reply payload into the daemon status
pub fn decode_done(payload: &[u8]) -> Result<i32> {
    Cursor::new(payload).i32()
}

/// Decoded GET_STRUCT reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataReply {
    /// Daemon status, negative on rejection
    pub state: i32,
    pub accuracy: i32,
    pub unit: i32,
    pub values_num: i32,
    pub values: [f32; REPLY_VALUES],
}

/// Decode a GET_STRUCT reply payload
pub fn decode_data_reply(payload: &[u8]) -> Result<DataReply> {
    let mut c = Cursor::new(payload);
    let state = c.i32()?;
    let accuracy = c.i32()?;
    let unit = c.i32()?;
    let values_num = c.i32()?;
    let mut values = [0.0f32; REPLY_VALUES];
    for v in values.iter_mut() {
        *v = c.f32()?;
    }
    Ok(DataReply {
        state,
        accuracy,
        unit,
        values_num,
        values,
    })
}

/// Decoded GET_PROPERTY reply
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyReply {
    /// Daemon status, negative on rejection
    pub state: i32,
    pub unit: i32,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    pub name: String,
    pub vendor: String,
}

fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Decode a GET_PROPERTY reply payload
pub fn decode_property_reply(payload: &[u8]) -> Result<PropertyReply> {
    let mut c = Cursor::new(payload);
    let state = c.i32()?;
    let unit = c.i32()?;
    let min_range = c.f32()?;
    let max_range = c.f32()?;
    let resolution = c.f32()?;
    let name = fixed_str(c.take(NAME_LEN)?);
    let vendor = fixed_str(c.take(NAME_LEN)?);
    Ok(PropertyReply {
        state,
        unit,
        min_range,
        max_range,
        resolution,
        name,
        vendor,
    })
}
