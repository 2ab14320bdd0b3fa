//! Wire protocol spoken with the sensor daemon
//!
//! Little-endian binary framing: an 8-byte header (`version`, `cmd`,
//! `payload_size`) followed by a command-specific payload. Every request
//! except `Stop` is answered by exactly one reply.

pub mod packet;

pub use packet::{Header, HEADER_LEN, PROTOCOL_VERSION};

/// Command tags carried in the packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Command {
    /// Open a channel, payload is the channel name
    Hello = 1,
    /// Close the channel
    ByeBye = 2,
    /// Generic status reply
    Done = 3,
    /// Start streaming on the channel
    Start = 4,
    /// Stop streaming, send-only
    Stop = 5,
    /// Event registration (add/delete/check)
    Reg = 6,
    /// Fetch one data structure
    GetStruct = 7,
    /// Fetch channel or data-set properties
    GetProperty = 8,
    /// Set a channel property value
    SetValue = 9,
}

/// Sub-type of a `Reg` request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RegType {
    /// Subscribe to an event
    Add = 1,
    /// Drop a subscription
    Del = 2,
    /// Probe whether the daemon supports an event
    Check = 3,
}
