//! Sensor client: public API and request/response engine
//!
//! A `SensorClient` multiplexes up to 16 logical connections to the sensor
//! daemon, each carrying up to 64 event subscriptions overall. All table
//! bookkeeping sits behind one mutex; transports and callbacks are cloned
//! out under the lock and used only after it is dropped, so a blocking
//! exchange never stalls other callers.

pub mod dispatch;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::events::{self, Delivery};
use crate::power::{self, PowerState};
use crate::protocol::{packet, Command, Header, RegType, HEADER_LEN};
use crate::rotation;
use crate::store::{self, SignalStore, MemoryStore};
use crate::tables::{
    Binding, ConnState, Connection, EventCallback, Handle, SharedTransport, SubId, Subscription,
    Tables,
};
use crate::timer::{ThreadTimerDriver, TimerDriver, TimerId, TimerState};
use crate::transport::{Transport, TransportFactory, UnixTransport};
use crate::types::{
    data, DataProperties, EventCondition, ConditionOp, EventPayload, RotationState, SensorClass,
    SensorProperties, SensorSample, SensorUnit,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Channel property selecting wake-on-event behavior
pub const PROPERTY_WAKEUP: u32 = 1;

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) tables: Mutex<Tables>,
    pub(crate) factory: TransportFactory,
    pub(crate) store: Arc<dyn SignalStore>,
    pub(crate) timers: Arc<dyn TimerDriver>,
    pub(crate) power: Mutex<PowerState>,
}

/// Client-side runtime of the sensor access framework
pub struct SensorClient {
    inner: Arc<ClientInner>,
}

impl SensorClient {
    /// Client with the production runtime: Unix socket transports, the
    /// in-process signal store and thread-backed timers
    pub fn new(config: ClientConfig) -> Self {
        let socket_path = config.daemon.socket_path.clone();
        let factory: TransportFactory = Arc::new(move |_channel: &str| {
            Ok(Box::new(UnixTransport::connect(&socket_path)?) as Box<dyn Transport>)
        });
        Self::with_runtime(
            config,
            factory,
            Arc::new(MemoryStore::new()),
            Arc::new(ThreadTimerDriver::new()),
        )
    }

    /// Client with caller-supplied transport, store and timer seams
    pub fn with_runtime(
        config: ClientConfig,
        factory: TransportFactory,
        store: Arc<dyn SignalStore>,
        timers: Arc<dyn TimerDriver>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                tables: Mutex::new(Tables::new()),
                factory,
                store,
                timers,
                power: Mutex::new(PowerState::new()),
            }),
        }
    }

    /// Signal store this client watches and queries
    pub fn store(&self) -> Arc<dyn SignalStore> {
        Arc::clone(&self.inner.store)
    }

    /// Open a connection to one sensor class
    pub fn connect(&self, class: SensorClass) -> Result<Handle> {
        let channel = class.channel_name();
        let transport = (self.inner.factory)(channel)?;
        let shared: SharedTransport = Arc::new(Mutex::new(transport));

        exchange_done(&shared, &packet::hello(channel))?;

        let handle = {
            let mut tables = self.inner.tables.lock();
            let conn = Connection::new(class, Arc::clone(&shared));
            match tables.connections.insert(conn) {
                Some(idx) => Handle(idx),
                None => {
                    // daemon side closes with the dropped transport
                    return Err(Error::Exhausted("connection table"));
                }
            }
        };

        power::attach(&self.inner);
        log::info!("Client: connected class={:?} handle={}", class, handle);
        Ok(handle)
    }

    /// Close a connection, tearing down every subscription it owns
    pub fn disconnect(&self, handle: Handle) -> Result<()> {
        let transport = self.transport_of(handle)?;
        if let Err(e) = exchange_done(&transport, &packet::empty(Command::ByeBye)) {
            log::warn!("Client: byebye failed on handle {}: {}", handle, e);
        }
        self.inner.release(handle);
        log::info!("Client: disconnected handle={}", handle);
        Ok(())
    }

    /// Start streaming on a connection
    ///
    /// A negative daemon status is propagated raw in `DaemonRejected`.
    pub fn start(&self, handle: Handle, option: i32) -> Result<()> {
        let transport = self.transport_of(handle)?;
        self.stateful(handle, exchange_done(&transport, &packet::start(option)))?;

        let mut tables = self.inner.tables.lock();
        if let Some(conn) = tables.connections.get_mut(handle.0) {
            conn.state = ConnState::Started;
            conn.start_option = option;
        }
        log::debug!("Client: started handle={} option={}", handle, option);
        Ok(())
    }

    /// Stop streaming, send-only with no reply
    pub fn stop(&self, handle: Handle) -> Result<()> {
        let transport = self.transport_of(handle)?;
        let sent = {
            let mut t = transport.lock();
            t.send(&packet::empty(Command::Stop))
        };
        self.stateful(handle, sent)?;

        let mut tables = self.inner.tables.lock();
        if let Some(conn) = tables.connections.get_mut(handle.0) {
            conn.state = ConnState::Stopped;
        }
        log::debug!("Client: stopped handle={}", handle);
        Ok(())
    }

    /// Subscribe a callback to an event on a connection
    ///
    /// `condition` selects the poll interval for polled events: an `Equal`
    /// condition with a positive value is the interval in milliseconds, no
    /// condition means the configured default. Any other condition is
    /// rejected for polled events and ignored for notification events.
    pub fn register_event<F>(
        &self,
        handle: Handle,
        event_id: u32,
        condition: Option<EventCondition>,
        callback: F,
    ) -> Result<()>
    where
        F: FnMut(u32, &EventPayload) + Send + 'static,
    {
        let spec = events::lookup(event_id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown event 0x{:x}", event_id)))?;

        let transport = {
            let tables = self.inner.tables.lock();
            let conn = tables
                .connections
                .get(handle.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
            if conn.class != spec.class {
                return Err(Error::InvalidArgument(format!(
                    "event 0x{:x} does not belong to {:?}",
                    event_id, conn.class
                )));
            }
            if tables.find_sub(handle, event_id).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "event 0x{:x} already registered on handle {}",
                    event_id, handle
                )));
            }
            if conn.subs.len() >= conn.class.max_event_slots() {
                return Err(Error::Exhausted("per-connection event slots"));
            }
            Arc::clone(&conn.transport)
        };

        let interval = self.interval_from(condition);
        let reg_interval = interval.unwrap_or(self.inner.config.events.default_interval_ms);

        self.stateful(
            handle,
            exchange_done(&transport, &packet::reg(RegType::Add, event_id, reg_interval)),
        )?;
        // the daemon saw the registration; an unusable condition only
        // matters for polled events, notification delivery ignores it
        let interval_ms = match interval {
            Some(ms) => ms,
            None if spec.delivery == Delivery::Notification => reg_interval,
            None => {
                return Err(Error::InvalidArgument(
                    "condition must be Equal with a positive interval".to_string(),
                ))
            }
        };

        let callback: EventCallback = Arc::new(Mutex::new(callback));
        let binding = match spec.delivery {
            Delivery::Notification => Binding::Notification {
                key: events::notification_key(event_id),
                watcher: None,
            },
            Delivery::Poll => Binding::Poll {
                data_id: spec.poll_data_id,
                interval_ms,
                timer: TimerState::Unarmed,
                scratch: SensorSample::undefined(),
            },
        };

        let sub_id = {
            let mut tables = self.inner.tables.lock();
            let sub = Subscription {
                owner: handle,
                event_id,
                callback,
                binding,
            };
            let sub_id = match tables.subs.insert(sub) {
                Some(idx) => SubId(idx),
                None => {
                    drop(tables);
                    let _ = exchange_done(&transport, &packet::reg(RegType::Del, event_id, 0));
                    return Err(Error::Exhausted("subscription table"));
                }
            };
            if let Some(conn) = tables.connections.get_mut(handle.0) {
                conn.subs.push(sub_id);
            }
            if spec.delivery == Delivery::Notification {
                if let Err(e) = tables.index.add(event_id, sub_id) {
                    tables.subs.remove(sub_id.0);
                    if let Some(conn) = tables.connections.get_mut(handle.0) {
                        conn.subs.retain(|s| *s != sub_id);
                    }
                    drop(tables);
                    let _ = exchange_done(&transport, &packet::reg(RegType::Del, event_id, 0));
                    return Err(e);
                }
            }
            sub_id
        };

        match spec.delivery {
            Delivery::Notification => {
                let key = events::notification_key(event_id);
                let watcher = install_watcher(&self.inner, sub_id, event_id, &key);
                let mut tables = self.inner.tables.lock();
                if let Some(sub) = tables.subs.get_mut(sub_id.0) {
                    if let Binding::Notification { watcher: slot, .. } = &mut sub.binding {
                        *slot = Some(watcher);
                    }
                }
            }
            Delivery::Poll => {
                let timer = arm_poll_timer(&self.inner, sub_id, interval_ms);
                let mut tables = self.inner.tables.lock();
                if let Some(sub) = tables.subs.get_mut(sub_id.0) {
                    if let Binding::Poll { timer: slot, .. } = &mut sub.binding {
                        *slot = TimerState::Armed {
                            id: timer,
                            interval_ms,
                        };
                    }
                }
            }
        }

        log::debug!(
            "Client: registered event 0x{:x} on handle {} ({:?})",
            event_id,
            handle,
            spec.delivery
        );
        Ok(())
    }

    /// Drop one event subscription
    pub fn unregister_event(&self, handle: Handle, event_id: u32) -> Result<()> {
        let (sub_id, transport) = {
            let tables = self.inner.tables.lock();
            let sub_id = tables.find_sub(handle, event_id).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "event 0x{:x} not registered on handle {}",
                    event_id, handle
                ))
            })?;
            let conn = tables
                .connections
                .get(handle.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
            (sub_id, Arc::clone(&conn.transport))
        };

        self.stateful(
            handle,
            exchange_done(&transport, &packet::reg(RegType::Del, event_id, 0)),
        )?;

        let teardown = {
            let mut tables = self.inner.tables.lock();
            tables.index.remove(event_id, sub_id);
            if let Some(conn) = tables.connections.get_mut(handle.0) {
                conn.subs.retain(|s| *s != sub_id);
            }
            tables.subs.remove(sub_id.0).map(|sub| sub.binding)
        };
        self.inner.teardown_binding(teardown);

        log::debug!("Client: unregistered event 0x{:x} on handle {}", event_id, handle);
        Ok(())
    }

    /// Change the poll interval of a polled subscription
    ///
    /// The old timer is destroyed and a fresh one armed; an armed timer's
    /// interval is never mutated in place.
    pub fn change_event_condition(
        &self,
        handle: Handle,
        event_id: u32,
        condition: EventCondition,
    ) -> Result<()> {
        let interval_ms = self.interval_from(Some(condition)).ok_or_else(|| {
            Error::InvalidArgument("condition must be Equal with a positive interval".to_string())
        })?;

        let (sub_id, transport, old_timer) = {
            let tables = self.inner.tables.lock();
            let sub_id = tables.find_sub(handle, event_id).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "event 0x{:x} not registered on handle {}",
                    event_id, handle
                ))
            })?;
            let sub = tables
                .subs
                .get(sub_id.0)
                .ok_or_else(|| Error::InvalidArgument("stale subscription".to_string()))?;
            let old_timer = match &sub.binding {
                Binding::Poll { timer, .. } => *timer,
                Binding::Notification { .. } => {
                    return Err(Error::InvalidArgument(format!(
                        "event 0x{:x} is not a polled event",
                        event_id
                    )))
                }
            };
            let conn = tables
                .connections
                .get(handle.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
            (sub_id, Arc::clone(&conn.transport), old_timer)
        };

        self.stateful(
            handle,
            exchange_done(&transport, &packet::reg(RegType::Add, event_id, interval_ms)),
        )?;

        if let TimerState::Armed { id, .. } = old_timer {
            self.inner.timers.disarm(id);
        }
        let timer = arm_poll_timer(&self.inner, sub_id, interval_ms);
        let mut tables = self.inner.tables.lock();
        if let Some(sub) = tables.subs.get_mut(sub_id.0) {
            if let Binding::Poll {
                timer: slot,
                interval_ms: ms,
                ..
            } = &mut sub.binding
            {
                *slot = TimerState::Armed {
                    id: timer,
                    interval_ms,
                };
                *ms = interval_ms;
            }
        }
        Ok(())
    }

    /// Fetch one data structure synchronously
    ///
    /// While the connection is not started `out` is filled with undefined
    /// sentinels and `NotStarted` is returned. Transport failures here do
    /// not release the handle.
    pub fn get_data(&self, handle: Handle, data_id: u32, out: &mut SensorSample) -> Result<()> {
        if !data::is_known(data_id) {
            return Err(Error::InvalidArgument(format!("unknown data id 0x{:x}", data_id)));
        }
        let transport = {
            let tables = self.inner.tables.lock();
            let conn = tables
                .connections
                .get(handle.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
            if SensorClass::from_raw(data_id >> 16) != Some(conn.class) {
                return Err(Error::InvalidArgument(format!(
                    "data id 0x{:x} does not belong to {:?}",
                    data_id, conn.class
                )));
            }
            if conn.state != ConnState::Started {
                out.set_undefined();
                return Err(Error::NotStarted);
            }
            Arc::clone(&conn.transport)
        };

        let payload = exchange(&transport, &packet::get_struct(data_id), Command::GetStruct)?;
        let reply = packet::decode_data_reply(&payload)?;
        if reply.state < 0 {
            out.set_undefined();
            return Err(Error::DaemonRejected(reply.state));
        }

        out.accuracy = reply.accuracy;
        out.unit = SensorUnit::from_raw(reply.unit);
        out.timestamp_us = now_micros();
        out.values_num = (reply.values_num.max(0) as usize).min(packet::REPLY_VALUES);
        out.values = reply.values;
        Ok(())
    }

    /// Query the static properties of a sensor class
    ///
    /// Opens a transient channel for the query and closes it again.
    pub fn get_properties(&self, class: SensorClass) -> Result<SensorProperties> {
        let level = (class as u32) << 16 | 0x0001;
        let payload =
            self.transient_exchange(class, &packet::get_property(level), Command::GetProperty)?;
        let reply = packet::decode_property_reply(&payload)?;
        if reply.state < 0 {
            return Err(Error::DaemonRejected(reply.state));
        }
        Ok(SensorProperties {
            unit: SensorUnit::from_raw(reply.unit),
            min_range: reply.min_range,
            max_range: reply.max_range,
            resolution: reply.resolution,
            name: reply.name,
            vendor: reply.vendor,
        })
    }

    /// Query the properties of one data set
    pub fn get_data_properties(&self, data_id: u32) -> Result<DataProperties> {
        if !data::is_known(data_id) {
            return Err(Error::InvalidArgument(format!("unknown data id 0x{:x}", data_id)));
        }
        let class = SensorClass::from_raw(data_id >> 16)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown data id 0x{:x}", data_id)))?;
        let payload =
            self.transient_exchange(class, &packet::get_property(data_id), Command::GetProperty)?;
        let reply = packet::decode_property_reply(&payload)?;
        if reply.state < 0 {
            return Err(Error::DaemonRejected(reply.state));
        }
        Ok(DataProperties {
            unit: SensorUnit::from_raw(reply.unit),
            min_range: reply.min_range,
            max_range: reply.max_range,
            resolution: reply.resolution,
        })
    }

    /// Set a channel property on a transient connection
    pub fn set_property(&self, class: SensorClass, property_id: u32, value: i64) -> Result<()> {
        let payload = self.transient_exchange(
            class,
            &packet::set_value(class as u32, property_id, value),
            Command::Done,
        )?;
        let status = packet::decode_done(&payload)?;
        if status < 0 {
            return Err(Error::DaemonRejected(status));
        }
        Ok(())
    }

    /// Probe whether the daemon supports an event
    pub fn is_event_available(&self, class: SensorClass, event_id: u32) -> Result<bool> {
        let payload = self.transient_exchange(
            class,
            &packet::reg(RegType::Check, event_id, 0),
            Command::Done,
        )?;
        Ok(packet::decode_done(&payload)? >= 0)
    }

    /// Keep this connection streaming while the display sleeps
    pub fn set_wakeup(&self, handle: Handle) -> Result<()> {
        self.set_wakeup_flag(handle, true)
    }

    /// Return this connection to normal display-off pausing
    pub fn unset_wakeup(&self, handle: Handle) -> Result<()> {
        self.set_wakeup_flag(handle, false)
    }

    /// Whether wake-on-event is set, answered locally
    pub fn wakeup_enabled(&self, handle: Handle) -> Result<bool> {
        let tables = self.inner.tables.lock();
        let conn = tables
            .connections
            .get(handle.0)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
        Ok(conn.wake_on_event)
    }

    /// One-shot rotation estimate from a fresh accelerometer sample
    ///
    /// Connects, starts, fetches, stops and disconnects a transient
    /// accelerometer connection. The display basis is read from the store.
    pub fn check_rotation(&self) -> Result<RotationState> {
        let handle = self.connect(SensorClass::Accelerometer)?;
        let result = (|| {
            self.start(handle, 0)?;
            let mut sample = SensorSample::undefined();
            self.get_data(handle, data::ACCEL_BASE, &mut sample)?;
            let _ = self.stop(handle);
            if sample.values_num < 3 {
                return Err(Error::InvalidPacket(format!(
                    "accelerometer sample carries {} values",
                    sample.values_num
                )));
            }
            let basis = self.inner.store.get_int(store::LCD_TYPE_KEY).unwrap_or(0);
            Ok(rotation::estimate(
                sample.values[0],
                sample.values[1],
                sample.values[2],
                basis.max(0) as u32,
            ))
        })();
        let _ = self.disconnect(handle);
        result
    }

    fn set_wakeup_flag(&self, handle: Handle, enabled: bool) -> Result<()> {
        let (transport, class) = {
            let tables = self.inner.tables.lock();
            let conn = tables
                .connections
                .get(handle.0)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
            (Arc::clone(&conn.transport), conn.class)
        };
        self.stateful(
            handle,
            exchange_done(
                &transport,
                &packet::set_value(class as u32, PROPERTY_WAKEUP, i64::from(enabled)),
            ),
        )?;
        let mut tables = self.inner.tables.lock();
        if let Some(conn) = tables.connections.get_mut(handle.0) {
            conn.wake_on_event = enabled;
        }
        Ok(())
    }

    fn interval_from(&self, condition: Option<EventCondition>) -> Option<u32> {
        match condition {
            None => Some(self.inner.config.events.default_interval_ms),
            Some(c) if c.op == ConditionOp::Equal && c.value > 0.0 => Some(c.value as u32),
            Some(_) => None,
        }
    }

    fn transport_of(&self, handle: Handle) -> Result<SharedTransport> {
        let tables = self.inner.tables.lock();
        let conn = tables
            .connections
            .get(handle.0)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown handle {}", handle)))?;
        Ok(Arc::clone(&conn.transport))
    }

    /// Apply the release rule of stateful calls: a dead transport frees
    /// the handle, everything else leaves it alone
    fn stateful<T>(&self, handle: Handle, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if matches!(e, Error::Communication(_) | Error::Io(_)) => {
                log::warn!("Client: releasing handle {} after transport failure", handle);
                self.inner.release(handle);
                Err(e)
            }
            other => other,
        }
    }

    fn transient_exchange(
        &self,
        class: SensorClass,
        request: &[u8],
        expect: Command,
    ) -> Result<Vec<u8>> {
        let channel = class.channel_name();
        let mut transport = (self.inner.factory)(channel)?;
        let payload = raw_exchange(transport.as_mut(), &packet::hello(channel), Command::Done)?;
        let status = packet::decode_done(&payload)?;
        if status < 0 {
            return Err(Error::DaemonRejected(status));
        }
        let reply = raw_exchange(transport.as_mut(), request, expect)?;
        let _ = raw_exchange(
            transport.as_mut(),
            &packet::empty(Command::ByeBye),
            Command::Done,
        );
        Ok(reply)
    }
}

impl ClientInner {
    /// Free a connection slot and every subscription it owns
    pub(crate) fn release(&self, handle: Handle) {
        let bindings = {
            let mut tables = self.tables.lock();
            let Some(conn) = tables.connections.remove(handle.0) else {
                return;
            };
            let mut bindings = Vec::with_capacity(conn.subs.len());
            for sub_id in conn.subs {
                tables.index.purge(sub_id);
                if let Some(sub) = tables.subs.remove(sub_id.0) {
                    bindings.push(sub.binding);
                }
            }
            bindings
        };
        for binding in bindings {
            self.teardown_binding(Some(binding));
        }
        power::detach(self);
    }

    /// Stop the watcher or timer behind a removed subscription
    pub(crate) fn teardown_binding(&self, binding: Option<Binding>) {
        match binding {
            Some(Binding::Notification {
                watcher: Some(id), ..
            }) => self.store.unwatch(id),
            Some(Binding::Poll {
                timer: TimerState::Armed { id, .. },
                ..
            }) => self.timers.disarm(id),
            _ => {}
        }
    }
}

/// One request, one reply on a shared transport
pub(crate) fn exchange(
    transport: &SharedTransport,
    request: &[u8],
    expect: Command,
) -> Result<Vec<u8>> {
    let mut t = transport.lock();
    raw_exchange(t.as_mut(), request, expect)
}

/// One request, one reply on a raw transport
pub(crate) fn raw_exchange(
    transport: &mut dyn Transport,
    request: &[u8],
    expect: Command,
) -> Result<Vec<u8>> {
    transport.send(request)?;
    let mut hdr = [0u8; HEADER_LEN];
    transport.recv_exact(&mut hdr)?;
    let header = Header::decode(&hdr)?;
    let mut payload = vec![0u8; header.payload_size as usize];
    if header.payload_size > 0 {
        transport.recv_exact(&mut payload)?;
    }
    if header.cmd != expect as u16 {
        return Err(Error::ProtocolViolation {
            expected: expect as u16,
            actual: header.cmd,
        });
    }
    Ok(payload)
}

/// DONE-replied exchange, mapping a negative status to `DaemonRejected`
pub(crate) fn exchange_done(transport: &SharedTransport, request: &[u8]) -> Result<i32> {
    let payload = exchange(transport, request, Command::Done)?;
    let status = packet::decode_done(&payload)?;
    if status < 0 {
        return Err(Error::DaemonRejected(status));
    }
    Ok(status)
}

/// Arm the poll timer of one subscription
pub(crate) fn arm_poll_timer(
    inner: &Arc<ClientInner>,
    sub_id: SubId,
    interval_ms: u32,
) -> TimerId {
    let weak = Arc::downgrade(inner);
    inner.timers.arm(
        interval_ms,
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.poll_tick(sub_id);
            }
        }),
    )
}

/// Install the store watcher of one notification subscription
pub(crate) fn install_watcher(
    inner: &Arc<ClientInner>,
    sub_id: SubId,
    event_id: u32,
    key: &str,
) -> crate::store::WatcherId {
    let weak = Arc::downgrade(inner);
    inner.store.watch(
        key,
        Box::new(move |_key, value| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver_notification(sub_id, event_id, value);
            }
        }),
    )
}

pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
