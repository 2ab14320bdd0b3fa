//! Connection and subscription bookkeeping
//!
//! All shared client state lives here behind one mutex. The tables never
//! perform I/O; the client clones transports and callbacks out under the
//! lock and drops it before touching the wire or user code.

pub mod arena;
pub mod index;

pub use arena::Arena;
pub use index::EventIndex;

use crate::store::WatcherId;
use crate::timer::TimerState;
use crate::transport::Transport;
use crate::types::{EventPayload, SensorClass, SensorSample};
use parking_lot::Mutex;
use std::sync::Arc;

/// Maximum concurrent connections per client
pub const CONNECTION_CAP: usize = 16;

/// Maximum concurrent subscriptions per client
pub const SUBSCRIPTION_CAP: usize = 64;

/// Stable key of a connection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub(crate) usize);

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key of a subscription slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubId(pub(crate) usize);

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Channel open, not streaming
    Stopped,
    /// Streaming, events delivered
    Started,
    /// Stopped by the power coordinator, resumed on display-on
    Paused,
}

/// Callback invoked with the event id and its payload
pub type EventCallback = Arc<Mutex<dyn FnMut(u32, &EventPayload) + Send>>;

/// Shared transport of one connection
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// One open daemon channel
pub struct Connection {
    pub class: SensorClass,
    pub state: ConnState,
    pub transport: SharedTransport,
    /// Subscriptions owned by this connection, bounded per class
    pub subs: Vec<SubId>,
    /// Exempt from display-off pausing when set
    pub wake_on_event: bool,
    /// Start option replayed by the power coordinator on resume
    pub start_option: i32,
}

impl Connection {
    pub fn new(class: SensorClass, transport: SharedTransport) -> Self {
        Self {
            class,
            state: ConnState::Stopped,
            transport,
            subs: Vec::new(),
            wake_on_event: false,
            start_option: 0,
        }
    }
}

/// Delivery binding of one subscription
pub enum Binding {
    /// Store watcher on the event's notification key
    Notification {
        key: String,
        watcher: Option<WatcherId>,
    },
    /// Periodic data fetch
    Poll {
        data_id: u32,
        interval_ms: u32,
        timer: TimerState,
        /// Last fetched sample, written only by this subscription's tick
        scratch: SensorSample,
    },
}

/// One event subscription
pub struct Subscription {
    pub owner: Handle,
    pub event_id: u32,
    pub callback: EventCallback,
    pub binding: Binding,
}

/// All client state guarded by the table mutex
pub struct Tables {
    pub connections: Arena<Connection>,
    pub subs: Arena<Subscription>,
    pub index: EventIndex,
}

impl Tables {
    pub fn new() -> Self {
        Self {
            connections: Arena::with_capacity(CONNECTION_CAP),
            subs: Arena::with_capacity(SUBSCRIPTION_CAP),
            index: EventIndex::new(),
        }
    }

    /// Subscription owned by `handle` for `event_id`, if any
    pub fn find_sub(&self, handle: Handle, event_id: u32) -> Option<SubId> {
        let conn = self.connections.get(handle.0)?;
        conn.subs
            .iter()
            .copied()
            .find(|s| self.subs.get(s.0).is_some_and(|sub| sub.event_id == event_id))
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}
