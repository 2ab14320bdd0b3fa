//! Static event classification table
//!
//! Every known event identifier is described exactly once here; both the
//! registration path and the dispatch path consult the same table, so the
//! delivery mode and payload shape of an event can never drift apart.

use crate::types::{event, SensorClass};

/// How events of one identifier reach their subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Pushed through the shared signal store
    Notification,
    /// Fetched by a periodic synchronous data request
    Poll,
}

/// Payload shape produced for one event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Single integer state value
    Scalar,
    /// Packed signed 16-bit pair (panning-style events)
    PanTilt,
    /// Structured sample filled by a data fetch
    Sample,
}

/// One entry of the classification table
#[derive(Debug, Clone, Copy)]
pub struct EventSpec {
    /// Event identifier
    pub event_id: u32,
    /// Owning sensor class
    pub class: SensorClass,
    /// Delivery mechanism
    pub delivery: Delivery,
    /// Callback payload shape
    pub payload: PayloadShape,
    /// Data set requested on each poll tick (Poll events only)
    pub poll_data_id: u32,
}

const fn notify(event_id: u32, class: SensorClass, payload: PayloadShape) -> EventSpec {
    EventSpec {
        event_id,
        class,
        delivery: Delivery::Notification,
        payload,
        poll_data_id: 0,
    }
}

const fn poll(event_id: u32, class: SensorClass, data_set: u32) -> EventSpec {
    EventSpec {
        event_id,
        class,
        delivery: Delivery::Poll,
        payload: PayloadShape::Sample,
        poll_data_id: (event_id & 0xFFFF_0000) | data_set,
    }
}

/// All known event identifiers
///
/// The event index is sized by this table; the order here fixes the index
/// slot of each identifier.
pub const EVENT_TABLE: [EventSpec; 19] = [
    notify(event::ACCEL_ROTATION_CHECK, SensorClass::Accelerometer, PayloadShape::Scalar),
    poll(event::ACCEL_RAW_REPORT, SensorClass::Accelerometer, 0x0001),
    notify(event::ACCEL_SET_HORIZON, SensorClass::Accelerometer, PayloadShape::Scalar),
    poll(event::ACCEL_ORIENTATION_REPORT, SensorClass::Accelerometer, 0x0002),
    notify(event::GEOMAG_CALIBRATION_NEEDED, SensorClass::Geomagnetic, PayloadShape::Scalar),
    poll(event::GEOMAG_RAW_REPORT, SensorClass::Geomagnetic, 0x0002),
    poll(event::GEOMAG_ATTITUDE_REPORT, SensorClass::Geomagnetic, 0x0001),
    notify(event::LIGHT_CHANGE_LEVEL, SensorClass::Light, PayloadShape::Scalar),
    poll(event::LIGHT_LEVEL_REPORT, SensorClass::Light, 0x0001),
    poll(event::LIGHT_LUX_REPORT, SensorClass::Light, 0x0002),
    notify(event::PROXI_CHANGE_STATE, SensorClass::Proximity, PayloadShape::Scalar),
    poll(event::PROXI_STATE_REPORT, SensorClass::Proximity, 0x0001),
    poll(event::PROXI_DISTANCE_REPORT, SensorClass::Proximity, 0x0002),
    poll(event::GYRO_RAW_REPORT, SensorClass::Gyroscope, 0x0001),
    notify(event::MOTION_SNAP, SensorClass::Motion, PayloadShape::Scalar),
    notify(event::MOTION_SHAKE, SensorClass::Motion, PayloadShape::Scalar),
    notify(event::MOTION_DOUBLETAP, SensorClass::Motion, PayloadShape::Scalar),
    notify(event::MOTION_PANNING, SensorClass::Motion, PayloadShape::PanTilt),
    notify(event::MOTION_TOP_TO_BOTTOM, SensorClass::Motion, PayloadShape::Scalar),
];

/// Number of known event identifiers
pub const EVENT_COUNT: usize = EVENT_TABLE.len();

/// Look up the table entry for an event identifier
pub fn lookup(event_id: u32) -> Option<&'static EventSpec> {
    EVENT_TABLE.iter().find(|e| e.event_id == event_id)
}

/// Index slot of an event identifier within the table
pub fn slot_of(event_id: u32) -> Option<usize> {
    EVENT_TABLE.iter().position(|e| e.event_id == event_id)
}

/// Signal store key prefix for per-event notification keys
pub const SENSOR_KEY_PREFIX: &str = "memory/sensor/";

/// Derive the signal store key an event identifier is published on
pub fn notification_key(event_id: u32) -> String {
    format!("{}{:x}", SENSOR_KEY_PREFIX, event_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event;

    #[test]
    fn table_has_unique_ids() {
        for (i, a) in EVENT_TABLE.iter().enumerate() {
            for b in EVENT_TABLE.iter().skip(i + 1) {
                assert_ne!(a.event_id, b.event_id, "duplicate event id");
            }
        }
    }

    #[test]
    fn ids_embed_their_class() {
        for spec in EVENT_TABLE.iter() {
            assert_eq!(
                SensorClass::from_raw(spec.event_id >> 16),
                Some(spec.class)
            );
        }
    }

    #[test]
    fn poll_entries_carry_a_data_id() {
        for spec in EVENT_TABLE.iter() {
            match spec.delivery {
                Delivery::Poll => {
                    assert_eq!(spec.payload, PayloadShape::Sample);
                    assert_eq!(spec.poll_data_id >> 16, spec.event_id >> 16);
                    assert_ne!(spec.poll_data_id & 0xFFFF, 0);
                }
                Delivery::Notification => assert_eq!(spec.poll_data_id, 0),
            }
        }
    }

    #[test]
    fn raw_and_orientation_use_distinct_data_sets() {
        let raw = lookup(event::ACCEL_RAW_REPORT).unwrap();
        let orient = lookup(event::ACCEL_ORIENTATION_REPORT).unwrap();
        assert_eq!(raw.poll_data_id & 0xFFFF, 0x0001);
        assert_eq!(orient.poll_data_id & 0xFFFF, 0x0002);
        // geomag maps the other way around: attitude is the base set
        let attitude = lookup(event::GEOMAG_ATTITUDE_REPORT).unwrap();
        assert_eq!(attitude.poll_data_id & 0xFFFF, 0x0001);
    }

    #[test]
    fn notification_key_format() {
        assert_eq!(
            notification_key(event::ACCEL_ROTATION_CHECK),
            "memory/sensor/10001"
        );
        assert_eq!(
            notification_key(event::MOTION_PANNING),
            "memory/sensor/8000008"
        );
    }

    #[test]
    fn unknown_event_not_found() {
        assert!(lookup(0xdead_beef).is_none());
        assert!(slot_of(0xdead_beef).is_none());
    }
}
