//! Thread-backed timer driver

use crate::timer::{TickCallback, TimerDriver, TimerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Inner {
    cancels: HashMap<TimerId, Arc<AtomicBool>>,
    next_id: TimerId,
}

/// One named worker thread per armed timer
///
/// Disarm is asynchronous: the flag is set and the thread exits at its
/// next wakeup without being joined.
#[derive(Clone, Default)]
pub struct ThreadTimerDriver {
    inner: Arc<Mutex<Inner>>,
}

impl ThreadTimerDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerDriver for ThreadTimerDriver {
    fn arm(&self, interval_ms: u32, mut tick: TickCallback) -> TimerId {
        let cancel = Arc::new(AtomicBool::new(false));
        let (id, cancel_for_thread) = {
            let mut inner = self.inner.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.cancels.insert(id, Arc::clone(&cancel));
            (id, cancel)
        };

        let spawn = thread::Builder::new()
            .name(format!("poll-timer-{}", id))
            .spawn(move || {
                let interval = Duration::from_millis(u64::from(interval_ms));
                loop {
                    thread::sleep(interval);
                    if cancel_for_thread.load(Ordering::SeqCst) {
                        break;
                    }
                    tick();
                }
            });
        if let Err(e) = spawn {
            log::error!("Timer: failed to spawn tick thread {}: {}", id, e);
            self.inner.lock().cancels.remove(&id);
        }
        id
    }

    fn disarm(&self, id: TimerId) {
        if let Some(cancel) = self.inner.lock().cancels.remove(&id) {
            cancel.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn ticks_until_disarmed() {
        let driver = ThreadTimerDriver::new();
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let id = driver.arm(
            5,
            Box::new(move || {
                count2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        thread::sleep(Duration::from_millis(60));
        driver.disarm(id);
        let at_disarm = count.load(Ordering::SeqCst);
        assert!(at_disarm >= 2, "timer never ticked");

        thread::sleep(Duration::from_millis(40));
        let after = count.load(Ordering::SeqCst);
        assert!(after <= at_disarm + 1, "timer kept ticking after disarm");
    }

    #[test]
    fn disarm_unknown_id_is_a_noop() {
        let driver = ThreadTimerDriver::new();
        driver.disarm(42);
    }
}
