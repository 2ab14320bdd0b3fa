//! Periodic timers driving the poll delivery path
//!
//! One timer per polled subscription. The driver trait keeps the client
//! logic free of threads; tests fire ticks by hand through the manual
//! driver.

pub mod manual;
pub mod thread;

pub use manual::ManualTimerDriver;
pub use thread::ThreadTimerDriver;

/// Identifier of an armed timer
pub type TimerId = u64;

/// Tick callback
pub type TickCallback = Box<dyn FnMut() + Send>;

/// Arms and disarms periodic timers
pub trait TimerDriver: Send + Sync {
    /// Arm a timer firing every `interval_ms` milliseconds
    fn arm(&self, interval_ms: u32, tick: TickCallback) -> TimerId;

    /// Disarm a timer; unknown ids are ignored
    fn disarm(&self, id: TimerId);
}

/// Armed/unarmed state of one subscription's timer
///
/// Interval changes go through disarm then arm; an armed timer's interval
/// is never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Unarmed,
    Armed { id: TimerId, interval_ms: u32 },
}
