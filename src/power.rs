//! Power-state coordinator
//!
//! Watches the display and shutdown keys on the signal store and pauses,
//! resumes or tears down connections accordingly. The watchers are
//! installed when the first connection opens and removed when the last
//! one is released.

use crate::client::{arm_poll_timer, exchange_done, ClientInner};
use crate::protocol::{packet, Command};
use crate::store::{self, WatcherId};
use crate::tables::{Binding, ConnState, Handle, SharedTransport, SubId};
use crate::timer::TimerState;
use std::sync::Arc;

/// Listener bookkeeping, guarded by the client's power mutex
pub(crate) struct PowerState {
    live_connections: u32,
    pm_watcher: Option<WatcherId>,
    off_watcher: Option<WatcherId>,
}

impl PowerState {
    pub(crate) fn new() -> Self {
        Self {
            live_connections: 0,
            pm_watcher: None,
            off_watcher: None,
        }
    }
}

/// Count one more live connection, installing the watchers on the first
pub(crate) fn attach(inner: &Arc<ClientInner>) {
    let mut power = inner.power.lock();
    power.live_connections += 1;
    if power.live_connections > 1 {
        return;
    }

    let weak = Arc::downgrade(inner);
    power.pm_watcher = Some(inner.store.watch(
        store::PM_STATE_KEY,
        Box::new(move |_key, value| {
            if let Some(inner) = weak.upgrade() {
                match value {
                    store::PM_STATE_OFF => pause_all(&inner),
                    store::PM_STATE_ON => resume_all(&inner),
                    _ => {}
                }
            }
        }),
    ));
    let weak = Arc::downgrade(inner);
    power.off_watcher = Some(inner.store.watch(
        store::POWER_OFF_KEY,
        Box::new(move |_key, value| {
            if value != 0 {
                if let Some(inner) = weak.upgrade() {
                    log::info!("Power: system shutdown, tearing down all connections");
                    teardown_all(&inner);
                }
            }
        }),
    ));
    log::debug!("Power: listeners attached");
}

/// Count one connection gone, removing the watchers after the last
pub(crate) fn detach(inner: &ClientInner) {
    let mut power = inner.power.lock();
    if power.live_connections == 0 {
        return;
    }
    power.live_connections -= 1;
    if power.live_connections > 0 {
        return;
    }
    if let Some(id) = power.pm_watcher.take() {
        inner.store.unwatch(id);
    }
    if let Some(id) = power.off_watcher.take() {
        inner.store.unwatch(id);
    }
    log::debug!("Power: listeners detached");
}

/// Display went dark: stop every pausable started connection
///
/// Poll timers are destroyed, not suspended; resume re-arms them from the
/// intervals recorded in the bindings. Notification watchers stay put.
pub(crate) fn pause_all(inner: &ClientInner) {
    let victims: Vec<(Handle, SharedTransport)> = {
        let tables = inner.tables.lock();
        tables
            .connections
            .iter()
            .filter(|(_, c)| {
                c.state == ConnState::Started && !c.wake_on_event && !c.class.always_on()
            })
            .map(|(idx, c)| (Handle(idx), Arc::clone(&c.transport)))
            .collect()
    };

    for (handle, transport) in victims {
        let sent = transport.lock().send(&packet::empty(Command::Stop));
        if let Err(e) = sent {
            log::warn!("Power: stop failed on handle {}: {}", handle, e);
        }
        let timer_ids: Vec<_> = {
            let mut tables = inner.tables.lock();
            let Some(conn) = tables.connections.get_mut(handle.0) else {
                continue;
            };
            conn.state = ConnState::Paused;
            let subs = conn.subs.clone();
            let mut ids = Vec::new();
            for sub_id in subs {
                if let Some(sub) = tables.subs.get_mut(sub_id.0) {
                    if let Binding::Poll { timer, .. } = &mut sub.binding {
                        if let TimerState::Armed { id, .. } = *timer {
                            ids.push(id);
                            *timer = TimerState::Unarmed;
                        }
                    }
                }
            }
            ids
        };
        for id in timer_ids {
            inner.timers.disarm(id);
        }
        log::info!("Power: paused handle {}", handle);
    }
}

/// Display came back: restart every paused connection
pub(crate) fn resume_all(inner: &Arc<ClientInner>) {
    let targets: Vec<(Handle, SharedTransport, i32, Vec<(SubId, u32)>)> = {
        let tables = inner.tables.lock();
        tables
            .connections
            .iter()
            .filter(|(_, c)| c.state == ConnState::Paused)
            .map(|(idx, c)| {
                let polls = c
                    .subs
                    .iter()
                    .filter_map(|sub_id| {
                        tables.subs.get(sub_id.0).and_then(|sub| match &sub.binding {
                            Binding::Poll { interval_ms, .. } => Some((*sub_id, *interval_ms)),
                            Binding::Notification { .. } => None,
                        })
                    })
                    .collect();
                (Handle(idx), Arc::clone(&c.transport), c.start_option, polls)
            })
            .collect()
    };

    for (handle, transport, option, polls) in targets {
        if let Err(e) = exchange_done(&transport, &packet::start(option)) {
            log::warn!("Power: resume start failed on handle {}: {}", handle, e);
            continue;
        }
        {
            let mut tables = inner.tables.lock();
            if let Some(conn) = tables.connections.get_mut(handle.0) {
                conn.state = ConnState::Started;
            }
        }
        for (sub_id, interval_ms) in polls {
            let id = arm_poll_timer(inner, sub_id, interval_ms);
            let mut tables = inner.tables.lock();
            if let Some(sub) = tables.subs.get_mut(sub_id.0) {
                if let Binding::Poll { timer, .. } = &mut sub.binding {
                    *timer = TimerState::Armed { id, interval_ms };
                }
            }
        }
        log::info!("Power: resumed handle {}", handle);
    }
}

/// System is powering off: unconditionally release every connection
///
/// No REG/Del is exchanged per subscription: BYEBYE closes the channel
/// and the daemon drops every registration tied to it.
pub(crate) fn teardown_all(inner: &ClientInner) {
    let handles: Vec<usize> = {
        let tables = inner.tables.lock();
        tables.connections.indices()
    };
    for idx in handles {
        let transport = {
            let tables = inner.tables.lock();
            tables.connections.get(idx).map(|c| Arc::clone(&c.transport))
        };
        if let Some(transport) = transport {
            let mut t = transport.lock();
            let _ = t.send(&packet::empty(Command::Stop));
            drop(t);
            let _ = exchange_done(&transport, &packet::empty(Command::ByeBye));
        }
        inner.release(Handle(idx));
    }
}
