//! Shared signal store
//!
//! The daemon publishes event notifications and the platform publishes
//! power state through a small key/value store with change watchers. The
//! trait seam lets tests drive both paths from an in-process store.

pub mod memory;

pub use memory::MemoryStore;

/// Display power state key, 1 = on, 3 = off
pub const PM_STATE_KEY: &str = "memory/pm/state";

/// Display on value of `PM_STATE_KEY`
pub const PM_STATE_ON: i32 = 1;

/// Display off value of `PM_STATE_KEY`
pub const PM_STATE_OFF: i32 = 3;

/// System shutdown key, non-zero = powering off
pub const POWER_OFF_KEY: &str = "memory/sysman/power_off";

/// Display basis key consulted by the rotation estimator
pub const LCD_TYPE_KEY: &str = "memory/sensor/lcd_type";

/// Identifier of an installed watcher
pub type WatcherId = u64;

/// Change callback: key and its new integer value
pub type WatchCallback = Box<dyn FnMut(&str, i32) + Send>;

/// Key/value signal store with change notification
pub trait SignalStore: Send + Sync {
    /// Read an integer key, `None` when unset
    fn get_int(&self, key: &str) -> Option<i32>;

    /// Write an integer key and fire its watchers
    fn set_int(&self, key: &str, value: i32);

    /// Install a watcher on one key
    fn watch(&self, key: &str, callback: WatchCallback) -> WatcherId;

    /// Remove a watcher; unknown ids are ignored
    fn unwatch(&self, id: WatcherId);
}
