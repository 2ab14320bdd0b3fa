//! Per-event subscriber index
//!
//! One ordered list of subscription ids per known event. The notification
//! path walks the list for the changed event; registration and release
//! keep it consistent with the subscription arena.

use crate::error::{Error, Result};
use crate::events::{self, EVENT_COUNT};
use crate::tables::SubId;

/// Upper bound on subscribers listed for one event
pub const LIST_CAP: usize = 16;

/// Subscriber lists for every known event
pub struct EventIndex {
    lists: [Vec<SubId>; EVENT_COUNT],
}

impl EventIndex {
    pub fn new() -> Self {
        Self {
            lists: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Append a subscriber to an event's list
    ///
    /// Idempotent: an id already listed is left where it is. A full list
    /// rejects new ids with `Exhausted`.
    pub fn add(&mut self, event_id: u32, sub: SubId) -> Result<()> {
        let slot = events::slot_of(event_id)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown event 0x{:x}", event_id)))?;
        let list = &mut self.lists[slot];
        if list.contains(&sub) {
            return Ok(());
        }
        if list.len() >= LIST_CAP {
            return Err(Error::Exhausted("event index list"));
        }
        list.push(sub);
        Ok(())
    }

    /// Remove a subscriber from an event's list, preserving the order of
    /// the remaining entries
    pub fn remove(&mut self, event_id: u32, sub: SubId) {
        if let Some(slot) = events::slot_of(event_id) {
            self.lists[slot].retain(|s| *s != sub);
        }
    }

    /// Purge a subscriber from every list (connection release path)
    pub fn purge(&mut self, sub: SubId) {
        for list in self.lists.iter_mut() {
            list.retain(|s| *s != sub);
        }
    }

    /// Subscribers of one event, in registration order
    pub fn subscribers(&self, event_id: u32) -> &[SubId] {
        match events::slot_of(event_id) {
            Some(slot) => &self.lists[slot],
            None => &[],
        }
    }

    /// Total listed subscribers across all events
    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventIndex {
    fn default() -> Self {
        Self::new()
    }
}
