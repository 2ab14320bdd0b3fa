//! Hand-driven timer driver for tests

use crate::timer::{TickCallback, TimerDriver, TimerId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Slot {
    interval_ms: u32,
    tick: Arc<Mutex<TickCallback>>,
}

#[derive(Default)]
struct Inner {
    slots: BTreeMap<TimerId, Slot>,
    next_id: TimerId,
}

/// Timer driver that only fires when a test says so
#[derive(Clone, Default)]
pub struct ManualTimerDriver {
    inner: Arc<Mutex<Inner>>,
}

impl ManualTimerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire one timer once
    pub fn fire(&self, id: TimerId) {
        let tick = self
            .inner
            .lock()
            .slots
            .get(&id)
            .map(|s| Arc::clone(&s.tick));
        if let Some(tick) = tick {
            (tick.lock())();
        }
    }

    /// Fire every armed timer once, in arming order
    pub fn fire_all(&self) {
        let ticks: Vec<Arc<Mutex<TickCallback>>> = self
            .inner
            .lock()
            .slots
            .values()
            .map(|s| Arc::clone(&s.tick))
            .collect();
        for tick in ticks {
            (tick.lock())();
        }
    }

    /// Currently armed timers as (id, interval) pairs
    pub fn armed(&self) -> Vec<(TimerId, u32)> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|(id, s)| (*id, s.interval_ms))
            .collect()
    }
}

impl TimerDriver for ManualTimerDriver {
    fn arm(&self, interval_ms: u32, tick: TickCallback) -> TimerId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.insert(
            id,
            Slot {
                interval_ms,
                tick: Arc::new(Mutex::new(tick)),
            },
        );
        id
    }

    fn disarm(&self, id: TimerId) {
        self.inner.lock().slots.remove(&id);
    }
}
