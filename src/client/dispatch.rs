//! Event delivery: notification fan-out and poll ticks
//!
//! Both paths re-check the owning connection's state at delivery time, so
//! a connection paused or stopped after registration silently drops its
//! events instead of queuing them.

use crate::client::{exchange, ClientInner};
use crate::error::Error;
use crate::events::{self, PayloadShape};
use crate::protocol::{packet, Command};
use crate::tables::{Binding, ConnState, SubId};
use crate::types::{EventPayload, SensorSample, SensorUnit};

impl ClientInner {
    /// Deliver one store notification to one subscription
    ///
    /// Called from the subscription's store watcher with the raw integer
    /// the daemon published.
    pub(crate) fn deliver_notification(&self, sub_id: SubId, event_id: u32, value: i32) {
        let Some(spec) = events::lookup(event_id) else {
            return;
        };
        let payload = match spec.payload {
            PayloadShape::Scalar => {
                if value < 0 {
                    log::warn!(
                        "Dispatch: dropping negative value {} for event 0x{:x}",
                        value,
                        event_id
                    );
                    return;
                }
                EventPayload::Scalar(value)
            }
            PayloadShape::PanTilt => {
                // a zero pan carries no movement
                if value == 0 {
                    return;
                }
                EventPayload::PanTilt {
                    x: (value >> 16) as i16,
                    y: (value & 0xFFFF) as i16,
                }
            }
            PayloadShape::Sample => return,
        };

        let callback = {
            let tables = self.tables.lock();
            // only indexed subscriptions are live
            if !tables.index.subscribers(event_id).contains(&sub_id) {
                return;
            }
            let Some(sub) = tables.subs.get(sub_id.0) else {
                return;
            };
            let started = tables
                .connections
                .get(sub.owner.0)
                .is_some_and(|c| c.state == ConnState::Started);
            if !started {
                return;
            }
            std::sync::Arc::clone(&sub.callback)
        };
        (callback.lock())(event_id, &payload);
    }

    /// Run one poll tick for a polled subscription
    ///
    /// A tick on a connection that is not started, or whose fetch fails,
    /// is skipped; the timer stays armed either way.
    pub(crate) fn poll_tick(&self, sub_id: SubId) {
        let (event_id, data_id, transport, callback) = {
            let tables = self.tables.lock();
            let Some(sub) = tables.subs.get(sub_id.0) else {
                return;
            };
            let Binding::Poll { data_id, .. } = &sub.binding else {
                return;
            };
            let data_id = *data_id;
            let Some(conn) = tables.connections.get(sub.owner.0) else {
                return;
            };
            if conn.state != ConnState::Started {
                return;
            }
            (
                sub.event_id,
                data_id,
                std::sync::Arc::clone(&conn.transport),
                std::sync::Arc::clone(&sub.callback),
            )
        };

        let sample = match self.fetch_sample(&transport, data_id) {
            Ok(sample) => sample,
            Err(e) => {
                log::debug!(
                    "Dispatch: poll fetch failed for event 0x{:x}: {}",
                    event_id,
                    e
                );
                return;
            }
        };

        {
            let mut tables = self.tables.lock();
            if let Some(sub) = tables.subs.get_mut(sub_id.0) {
                if let Binding::Poll { scratch, .. } = &mut sub.binding {
                    *scratch = sample;
                }
            } else {
                // unregistered while fetching
                return;
            }
        }
        (callback.lock())(event_id, &EventPayload::Sample(sample));
    }

    fn fetch_sample(
        &self,
        transport: &crate::tables::SharedTransport,
        data_id: u32,
    ) -> crate::error::Result<SensorSample> {
        let payload = exchange(transport, &packet::get_struct(data_id), Command::GetStruct)?;
        let reply = packet::decode_data_reply(&payload)?;
        if reply.state < 0 {
            return Err(Error::DaemonRejected(reply.state));
        }
        Ok(SensorSample {
            accuracy: reply.accuracy,
            unit: SensorUnit::from_raw(reply.unit),
            timestamp_us: crate::client::now_micros(),
            values_num: (reply.values_num.max(0) as usize).min(packet::REPLY_VALUES),
            values: reply.values,
        })
    }
}
