//! End-to-end client scenarios over the mock transport, the in-process
//! signal store and the manual timer driver.

use parking_lot::Mutex;
use sensord_client::client::SensorClient;
use sensord_client::config::ClientConfig;
use sensord_client::error::Error;
use sensord_client::events;
use sensord_client::protocol::Command;
use sensord_client::store::{self, MemoryStore, SignalStore};
use sensord_client::timer::ManualTimerDriver;
use sensord_client::transport::{mock, MockTransport, Transport, TransportFactory};
use sensord_client::types::{
    data, event, ConditionOp, EventCondition, EventPayload, SensorClass, SensorSample,
    ACCURACY_UNDEFINED,
};
use std::sync::Arc;

const CMD_HELLO: u16 = 1;
const CMD_BYEBYE: u16 = 2;
const CMD_START: u16 = 4;
const CMD_STOP: u16 = 5;
const CMD_REG: u16 = 6;
const CMD_GET_STRUCT: u16 = 7;
const CMD_GET_PROPERTY: u16 = 8;

struct Harness {
    client: SensorClient,
    store: MemoryStore,
    timers: ManualTimerDriver,
    mocks: Arc<Mutex<Vec<(String, MockTransport)>>>,
    scripts: Arc<Mutex<Vec<Vec<Vec<u8>>>>>,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        let timers = ManualTimerDriver::new();
        let mocks: Arc<Mutex<Vec<(String, MockTransport)>>> = Arc::new(Mutex::new(Vec::new()));
        let scripts: Arc<Mutex<Vec<Vec<Vec<u8>>>>> = Arc::new(Mutex::new(Vec::new()));

        let mocks_in_factory = Arc::clone(&mocks);
        let scripts_in_factory = Arc::clone(&scripts);
        let factory: TransportFactory = Arc::new(move |channel: &str| {
            let mock = MockTransport::new();
            // every connection opens with a HELLO/DONE exchange
            mock.push_done(0);
            let mut scripts = scripts_in_factory.lock();
            if !scripts.is_empty() {
                for reply in scripts.remove(0) {
                    mock.push_reply(reply);
                }
            }
            drop(scripts);
            mocks_in_factory
                .lock()
                .push((channel.to_string(), mock.clone()));
            Ok(Box::new(mock) as Box<dyn Transport>)
        });

        let client = SensorClient::with_runtime(
            ClientConfig::default(),
            factory,
            Arc::new(store.clone()),
            Arc::new(timers.clone()),
        );
        Self {
            client,
            store,
            timers,
            mocks,
            scripts,
        }
    }

    fn last_mock(&self) -> MockTransport {
        let mocks = self.mocks.lock();
        mocks.last().map(|(_, m)| m.clone()).unwrap()
    }

    /// Queue replies for the next transport the factory hands out, after
    /// its HELLO reply
    fn script_next(&self, replies: Vec<Vec<u8>>) {
        self.scripts.lock().push(replies);
    }
}

type Recorded = Arc<Mutex<Vec<(u32, EventPayload)>>>;

fn recorder() -> (Recorded, impl FnMut(u32, &EventPayload) + Send + 'static) {
    let log: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |event_id: u32, payload: &EventPayload| {
        sink.lock().push((event_id, payload.clone()));
    })
}

#[test]
fn connect_resolves_channel_and_says_hello() {
    let h = Harness::new();
    h.client.connect(SensorClass::Gyroscope).unwrap();

    let mocks = h.mocks.lock();
    assert_eq!(mocks.len(), 1);
    assert_eq!(mocks[0].0, "gyro_datastream");
    assert_eq!(mocks[0].1.sent_commands(), vec![CMD_HELLO]);
}

#[test]
fn connection_table_exhaustion() {
    let h = Harness::new();
    for _ in 0..16 {
        h.client.connect(SensorClass::Accelerometer).unwrap();
    }
    assert!(matches!(
        h.client.connect(SensorClass::Accelerometer),
        Err(Error::Exhausted(_))
    ));
}

#[test]
fn register_unregister_round_trip_restores_state() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();
    // first connection installs the two power watchers
    assert_eq!(h.store.watcher_count(), 2);

    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::ACCEL_ROTATION_CHECK, None, cb)
        .unwrap();
    assert_eq!(h.store.watcher_count(), 3);

    mock.push_done(0);
    h.client
        .unregister_event(handle, event::ACCEL_ROTATION_CHECK)
        .unwrap();
    assert_eq!(h.store.watcher_count(), 2);

    mock.push_done(0);
    h.client.disconnect(handle).unwrap();
    assert_eq!(h.store.watcher_count(), 0);
    assert_eq!(
        mock.sent_commands(),
        vec![CMD_HELLO, CMD_REG, CMD_REG, CMD_BYEBYE]
    );
}

#[test]
fn duplicate_registration_is_rejected() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Motion).unwrap();
    let mock = h.last_mock();

    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::MOTION_SNAP, None, cb)
        .unwrap();

    let (_log2, cb2) = recorder();
    assert!(matches!(
        h.client.register_event(handle, event::MOTION_SNAP, None, cb2),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn get_data_before_start_fills_sentinels() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();

    let mut sample = SensorSample::undefined();
    sample.values_num = 5; // stale content to be wiped
    let err = h
        .client
        .get_data(handle, data::ACCEL_BASE, &mut sample)
        .unwrap_err();
    assert!(matches!(err, Error::NotStarted));
    assert_eq!(sample.accuracy, ACCURACY_UNDEFINED);
    assert_eq!(sample.values_num, 0);
    assert_eq!(sample.timestamp_us, 0);
}

#[test]
fn get_data_after_start_fills_values() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    mock.push_reply(mock::data_reply(0, 2, 1, &[0.1, 3.0, 9.8]));
    let mut sample = SensorSample::undefined();
    h.client
        .get_data(handle, data::ACCEL_BASE, &mut sample)
        .unwrap();
    assert_eq!(sample.values_num, 3);
    assert_eq!(sample.values[2], 9.8);
    assert_eq!(sample.accuracy, 2);
    assert!(sample.timestamp_us > 0);
}

#[test]
fn start_propagates_raw_daemon_status() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Light).unwrap();
    let mock = h.last_mock();

    mock.push_done(-7);
    assert!(matches!(
        h.client.start(handle, 0),
        Err(Error::DaemonRejected(-7))
    ));
}

#[test]
fn mismatched_reply_tag_keeps_the_handle() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Light).unwrap();
    let mock = h.last_mock();

    // a GET_STRUCT-tagged reply where a DONE is due
    mock.push_reply(mock::data_reply(0, 1, 4, &[10.0]));
    assert!(matches!(
        h.client.start(handle, 0),
        Err(Error::ProtocolViolation { .. })
    ));

    // the channel stays usable, nothing was released
    assert!(!h.client.wakeup_enabled(handle).unwrap());
    assert_eq!(h.store.watcher_count(), 2);
}

#[test]
fn transport_failure_on_get_data_keeps_the_handle() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    mock.fail_sends();
    let mut sample = SensorSample::undefined();
    assert!(matches!(
        h.client.get_data(handle, data::ACCEL_BASE, &mut sample),
        Err(Error::Communication(_))
    ));

    // read-only fetch failure does not release the connection
    assert!(!h.client.wakeup_enabled(handle).unwrap());
    assert_eq!(h.store.watcher_count(), 2);
}

#[test]
fn transport_failure_on_stateful_call_releases_the_handle() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Light).unwrap();
    let mock = h.last_mock();

    mock.fail_sends();
    assert!(matches!(
        h.client.start(handle, 0),
        Err(Error::Communication(_))
    ));
    // slot is gone, power listeners are detached
    assert!(matches!(
        h.client.wakeup_enabled(handle),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(h.store.watcher_count(), 0);
}

#[test]
fn notification_delivers_only_while_started() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();
    let key = events::notification_key(event::ACCEL_ROTATION_CHECK);

    let (log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::ACCEL_ROTATION_CHECK, None, cb)
        .unwrap();

    // not started yet: dropped
    h.store.set_int(&key, 2);
    assert!(log.lock().is_empty());

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();
    h.store.set_int(&key, 3);
    assert_eq!(
        log.lock().as_slice(),
        &[(event::ACCEL_ROTATION_CHECK, EventPayload::Scalar(3))]
    );

    // negative values are dropped
    h.store.set_int(&key, -1);
    assert_eq!(log.lock().len(), 1);

    h.client.stop(handle).unwrap();
    h.store.set_int(&key, 4);
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn panning_unpacks_the_axis_pair_and_suppresses_zero() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Motion).unwrap();
    let mock = h.last_mock();
    let key = events::notification_key(event::MOTION_PANNING);

    let (log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::MOTION_PANNING, None, cb)
        .unwrap();
    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    h.store.set_int(&key, 0);
    assert!(log.lock().is_empty());

    // x = 5 in the high half, y = -5 in the low half
    h.store.set_int(&key, 5 << 16 | 0xFFFB);
    assert_eq!(
        log.lock().as_slice(),
        &[(event::MOTION_PANNING, EventPayload::PanTilt { x: 5, y: -5 })]
    );
}

#[test]
fn poll_ticks_fetch_and_deliver_samples() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Gyroscope).unwrap();
    let mock = h.last_mock();

    let (log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(
            handle,
            event::GYRO_RAW_REPORT,
            Some(EventCondition::interval_ms(50)),
            cb,
        )
        .unwrap();
    assert_eq!(h.timers.armed().len(), 1);
    assert_eq!(h.timers.armed()[0].1, 50);

    // not started: the tick is a no-op and the timer stays armed
    h.timers.fire_all();
    assert!(log.lock().is_empty());
    assert_eq!(h.timers.armed().len(), 1);

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    mock.push_reply(mock::data_reply(0, 1, 8, &[0.5, -0.5, 0.25]));
    h.timers.fire_all();
    let log = log.lock();
    assert_eq!(log.len(), 1);
    let (id, payload) = &log[0];
    assert_eq!(*id, event::GYRO_RAW_REPORT);
    match payload {
        EventPayload::Sample(sample) => {
            assert_eq!(sample.values_num, 3);
            assert_eq!(sample.values[0], 0.5);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn failed_poll_fetch_skips_the_tick_but_keeps_the_timer() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Gyroscope).unwrap();
    let mock = h.last_mock();

    let (log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::GYRO_RAW_REPORT, None, cb)
        .unwrap();
    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    // no reply queued: the fetch fails
    h.timers.fire_all();
    assert!(log.lock().is_empty());
    assert_eq!(h.timers.armed().len(), 1);
}

#[test]
fn change_condition_rearms_at_the_new_interval() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();

    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(
            handle,
            event::ACCEL_RAW_REPORT,
            Some(EventCondition::interval_ms(100)),
            cb,
        )
        .unwrap();
    let before = h.timers.armed();
    assert_eq!(before[0].1, 100);

    mock.push_done(0);
    h.client
        .change_event_condition(handle, event::ACCEL_RAW_REPORT, EventCondition::interval_ms(20))
        .unwrap();
    let after = h.timers.armed();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].1, 20);
    assert_ne!(before[0].0, after[0].0, "timer must be rebuilt, not mutated");
}

#[test]
fn unusable_condition_rejected_for_poll_ignored_for_notification() {
    let h = Harness::new();
    let bad = EventCondition {
        op: ConditionOp::GreaterThan,
        value: 1.0,
    };

    // notification events shrug a bad condition off
    let motion = h.client.connect(SensorClass::Motion).unwrap();
    let mock = h.last_mock();
    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(motion, event::MOTION_SNAP, Some(bad), cb)
        .unwrap();

    // polled events reject it, after the daemon saw the registration
    let accel = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();
    let (_log2, cb2) = recorder();
    mock.push_done(0);
    assert!(matches!(
        h.client
            .register_event(accel, event::ACCEL_RAW_REPORT, Some(bad), cb2),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(mock.sent_commands(), vec![CMD_HELLO, CMD_REG]);
    assert!(h.timers.armed().is_empty());
}

#[test]
fn condition_on_notification_event_is_rejected() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Motion).unwrap();
    let mock = h.last_mock();

    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::MOTION_SNAP, None, cb)
        .unwrap();
    assert!(matches!(
        h.client
            .change_event_condition(handle, event::MOTION_SNAP, EventCondition::interval_ms(20)),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn display_off_pauses_and_display_on_resumes() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();

    let (_log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(
            handle,
            event::ACCEL_RAW_REPORT,
            Some(EventCondition::interval_ms(100)),
            cb,
        )
        .unwrap();
    mock.push_done(0);
    h.client.start(handle, 0).unwrap();
    assert_eq!(h.timers.armed().len(), 1);

    // display off: STOP goes out, the timer is destroyed
    h.store.set_int(store::PM_STATE_KEY, store::PM_STATE_OFF);
    assert!(h.timers.armed().is_empty());
    assert_eq!(*mock.sent_commands().last().unwrap(), CMD_STOP);

    // display on: START replays the recorded option, timer re-armed at 100
    mock.push_done(0);
    h.store.set_int(store::PM_STATE_KEY, store::PM_STATE_ON);
    let armed = h.timers.armed();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].1, 100);
    assert_eq!(*mock.sent_commands().last().unwrap(), CMD_START);

    // resumed connection polls again
    mock.push_reply(mock::data_reply(0, 1, 1, &[0.0, 0.0, 9.8]));
    h.timers.fire_all();
    assert_eq!(*mock.sent_commands().last().unwrap(), CMD_GET_STRUCT);
}

#[test]
fn wakeup_connections_keep_running_with_the_display_off() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Accelerometer).unwrap();
    let mock = h.last_mock();

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();
    mock.push_done(0);
    h.client.set_wakeup(handle).unwrap();
    assert!(h.client.wakeup_enabled(handle).unwrap());

    h.store.set_int(store::PM_STATE_KEY, store::PM_STATE_OFF);
    // no STOP was sent
    assert_ne!(*mock.sent_commands().last().unwrap(), CMD_STOP);
}

#[test]
fn proximity_is_never_paused() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Proximity).unwrap();
    let mock = h.last_mock();

    mock.push_done(0);
    h.client.start(handle, 0).unwrap();
    h.store.set_int(store::PM_STATE_KEY, store::PM_STATE_OFF);
    assert_eq!(*mock.sent_commands().last().unwrap(), CMD_START);
}

#[test]
fn power_off_tears_everything_down() {
    let h = Harness::new();
    let a = h.client.connect(SensorClass::Accelerometer).unwrap();
    let g = h.client.connect(SensorClass::Gyroscope).unwrap();

    h.store.set_int(store::POWER_OFF_KEY, 1);
    // each channel is stopped and closed; BYEBYE drops the daemon-side
    // registrations with the channel
    for (_, mock) in h.mocks.lock().iter() {
        assert_eq!(mock.sent_commands(), vec![CMD_HELLO, CMD_STOP, CMD_BYEBYE]);
    }
    assert!(matches!(
        h.client.start(a, 0),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        h.client.start(g, 0),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(h.store.watcher_count(), 0);
}

#[test]
fn released_subscription_no_longer_receives_notifications() {
    let h = Harness::new();
    let handle = h.client.connect(SensorClass::Motion).unwrap();
    let mock = h.last_mock();
    let key = events::notification_key(event::MOTION_SHAKE);

    let (log, cb) = recorder();
    mock.push_done(0);
    h.client
        .register_event(handle, event::MOTION_SHAKE, None, cb)
        .unwrap();
    mock.push_done(0);
    h.client.start(handle, 0).unwrap();

    mock.push_done(0);
    h.client.disconnect(handle).unwrap();
    h.store.set_int(&key, 1);
    assert!(log.lock().is_empty());
}

#[test]
fn transient_property_query() {
    let h = Harness::new();
    h.script_next(vec![
        mock::property_reply(0, 1, -19.6, 19.6, 0.01, "accel_hw", "acme"),
        mock::reply(Command::Done, &0i32.to_le_bytes()),
    ]);

    let props = h.client.get_properties(SensorClass::Accelerometer).unwrap();
    assert_eq!(props.name, "accel_hw");
    assert_eq!(props.vendor, "acme");
    assert_eq!(props.max_range, 19.6);

    // the transient channel opened, queried and closed
    let mock = h.last_mock();
    assert_eq!(
        mock.sent_commands(),
        vec![CMD_HELLO, CMD_GET_PROPERTY, CMD_BYEBYE]
    );
}

#[test]
fn event_availability_probe() {
    let h = Harness::new();
    h.script_next(vec![
        mock::reply(Command::Done, &0i32.to_le_bytes()),
        mock::reply(Command::Done, &0i32.to_le_bytes()),
    ]);
    assert!(h
        .client
        .is_event_available(SensorClass::Motion, event::MOTION_SHAKE)
        .unwrap());

    h.script_next(vec![
        mock::reply(Command::Done, &(-1i32).to_le_bytes()),
        mock::reply(Command::Done, &0i32.to_le_bytes()),
    ]);
    assert!(!h
        .client
        .is_event_available(SensorClass::Motion, event::MOTION_DOUBLETAP)
        .unwrap());
}

#[test]
fn check_rotation_classifies_a_fresh_sample() {
    let h = Harness::new();
    h.store.set_int(store::LCD_TYPE_KEY, 0);
    h.script_next(vec![
        mock::reply(Command::Done, &0i32.to_le_bytes()), // start
        mock::data_reply(0, 2, 1, &[0.1, 3.0, 9.8]),
        mock::reply(Command::Done, &0i32.to_le_bytes()), // byebye
    ]);

    let state = h.client.check_rotation().unwrap();
    assert_eq!(state, sensord_client::types::RotationState::PortraitTop);
    // the transient connection is gone again
    assert_eq!(h.store.watcher_count(), 0);
}
