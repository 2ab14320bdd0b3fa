//! Core data types: sensor classes, samples, properties, event payloads.

/// Maximum values carried by one sample
pub const MAX_VALUES: usize = 12;

/// Undefined accuracy sentinel
pub const ACCURACY_UNDEFINED: i32 = -1;

/// Data unit indices reported by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SensorUnit {
    Undefined = 0,
    MetrePerSecondSquared = 1,
    MicroTesla = 2,
    Degree = 3,
    Lux = 4,
    Centimeter = 5,
    Level1To10 = 6,
    StateOnOff = 7,
    DegreePerSecond = 8,
}

impl SensorUnit {
    /// Map a raw daemon unit index, falling back to Undefined
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SensorUnit::MetrePerSecondSquared,
            2 => SensorUnit::MicroTesla,
            3 => SensorUnit::Degree,
            4 => SensorUnit::Lux,
            5 => SensorUnit::Centimeter,
            6 => SensorUnit::Level1To10,
            7 => SensorUnit::StateOnOff,
            8 => SensorUnit::DegreePerSecond,
            _ => SensorUnit::Undefined,
        }
    }
}

/// Sensor classes served by the daemon
///
/// The discriminants are bit flags; event and data identifiers embed them
/// in their upper 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SensorClass {
    Accelerometer = 0x0001,
    Geomagnetic = 0x0002,
    Light = 0x0004,
    Proximity = 0x0008,
    Gyroscope = 0x0020,
    Motion = 0x0800,
}

impl SensorClass {
    /// Resolve a class from the upper half of an event or data identifier
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0001 => Some(SensorClass::Accelerometer),
            0x0002 => Some(SensorClass::Geomagnetic),
            0x0004 => Some(SensorClass::Light),
            0x0008 => Some(SensorClass::Proximity),
            0x0020 => Some(SensorClass::Gyroscope),
            0x0800 => Some(SensorClass::Motion),
            _ => None,
        }
    }

    /// Daemon channel name for this class
    pub fn channel_name(self) -> &'static str {
        match self {
            SensorClass::Accelerometer => "accel_datastream",
            SensorClass::Geomagnetic => "geomag_datastream",
            SensorClass::Light => "lumin_datastream",
            SensorClass::Proximity => "proxi_datastream",
            SensorClass::Gyroscope => "gyro_datastream",
            SensorClass::Motion => "motion_datastream",
        }
    }

    /// Maximum concurrent event subscriptions for one connection of this class
    pub fn max_event_slots(self) -> usize {
        match self {
            SensorClass::Accelerometer => 6,
            SensorClass::Geomagnetic => 3,
            SensorClass::Light => 3,
            SensorClass::Proximity => 3,
            SensorClass::Gyroscope => 1,
            SensorClass::Motion => 7,
        }
    }

    /// Classes exempt from display-off pausing
    ///
    /// Proximity keeps reporting with the screen off (in-call ear detection
    /// depends on it), so the power coordinator never pauses it.
    pub fn always_on(self) -> bool {
        matches!(self, SensorClass::Proximity)
    }
}

/// Event identifiers, `class << 16 | bit`
pub mod event {
    /// Accelerometer rotation state changed
    pub const ACCEL_ROTATION_CHECK: u32 = 0x0001 << 16 | 0x0001;
    /// Accelerometer raw data report (polled)
    pub const ACCEL_RAW_REPORT: u32 = 0x0001 << 16 | 0x0002;
    /// Accelerometer horizon reference set
    pub const ACCEL_SET_HORIZON: u32 = 0x0001 << 16 | 0x0008;
    /// Accelerometer orientation report (polled)
    pub const ACCEL_ORIENTATION_REPORT: u32 = 0x0001 << 16 | 0x0011;

    /// Geomagnetic calibration required
    pub const GEOMAG_CALIBRATION_NEEDED: u32 = 0x0002 << 16 | 0x0001;
    /// Geomagnetic raw data report (polled)
    pub const GEOMAG_RAW_REPORT: u32 = 0x0002 << 16 | 0x0002;
    /// Geomagnetic attitude report (polled)
    pub const GEOMAG_ATTITUDE_REPORT: u32 = 0x0002 << 16 | 0x0004;

    /// Light level bucket changed
    pub const LIGHT_CHANGE_LEVEL: u32 = 0x0004 << 16 | 0x0001;
    /// Light level report (polled)
    pub const LIGHT_LEVEL_REPORT: u32 = 0x0004 << 16 | 0x0002;
    /// Light lux report (polled)
    pub const LIGHT_LUX_REPORT: u32 = 0x0004 << 16 | 0x0004;

    /// Proximity near/far state changed
    pub const PROXI_CHANGE_STATE: u32 = 0x0008 << 16 | 0x0001;
    /// Proximity state report (polled)
    pub const PROXI_STATE_REPORT: u32 = 0x0008 << 16 | 0x0002;
    /// Proximity distance report (polled)
    pub const PROXI_DISTANCE_REPORT: u32 = 0x0008 << 16 | 0x0004;

    /// Gyroscope raw data report (polled)
    pub const GYRO_RAW_REPORT: u32 = 0x0020 << 16 | 0x0001;

    /// Motion engine snap gesture
    pub const MOTION_SNAP: u32 = 0x0800 << 16 | 0x0001;
    /// Motion engine shake gesture
    pub const MOTION_SHAKE: u32 = 0x0800 << 16 | 0x0002;
    /// Motion engine double tap gesture
    pub const MOTION_DOUBLETAP: u32 = 0x0800 << 16 | 0x0004;
    /// Motion engine panning gesture (packed x/y)
    pub const MOTION_PANNING: u32 = 0x0800 << 16 | 0x0008;
    /// Motion engine top-to-bottom gesture
    pub const MOTION_TOP_TO_BOTTOM: u32 = 0x0800 << 16 | 0x0010;
}

/// Data set identifiers, `class << 16 | set`
pub mod data {
    /// Accelerometer base data set (x, y, z in m/s²)
    pub const ACCEL_BASE: u32 = 0x0001 << 16 | 0x0001;
    /// Accelerometer orientation data set
    pub const ACCEL_ORIENTATION: u32 = 0x0001 << 16 | 0x0002;
    /// Geomagnetic attitude data set
    pub const GEOMAG_BASE: u32 = 0x0002 << 16 | 0x0001;
    /// Geomagnetic raw data set
    pub const GEOMAG_RAW: u32 = 0x0002 << 16 | 0x0002;
    /// Light level data set
    pub const LIGHT_BASE: u32 = 0x0004 << 16 | 0x0001;
    /// Light lux data set
    pub const LIGHT_LUX: u32 = 0x0004 << 16 | 0x0002;
    /// Proximity state data set
    pub const PROXI_BASE: u32 = 0x0008 << 16 | 0x0001;
    /// Proximity distance data set
    pub const PROXI_DISTANCE: u32 = 0x0008 << 16 | 0x0002;
    /// Gyroscope base data set
    pub const GYRO_BASE: u32 = 0x0020 << 16 | 0x0001;

    /// Whether `id` names a known data set
    pub fn is_known(id: u32) -> bool {
        matches!(
            id,
            ACCEL_BASE
                | ACCEL_ORIENTATION
                | GEOMAG_BASE
                | GEOMAG_RAW
                | LIGHT_BASE
                | LIGHT_LUX
                | PROXI_BASE
                | PROXI_DISTANCE
                | GYRO_BASE
        )
    }
}

/// One fetched sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Daemon-reported accuracy, `ACCURACY_UNDEFINED` when unknown
    pub accuracy: i32,
    /// Unit of `values`
    pub unit: SensorUnit,
    /// Client-side receive timestamp, microseconds since the epoch
    pub timestamp_us: u64,
    /// Number of valid entries in `values`
    pub values_num: usize,
    /// Sample values
    pub values: [f32; MAX_VALUES],
}

impl SensorSample {
    /// Sample with every field at its undefined sentinel
    pub fn undefined() -> Self {
        Self {
            accuracy: ACCURACY_UNDEFINED,
            unit: SensorUnit::Undefined,
            timestamp_us: 0,
            values_num: 0,
            values: [0.0; MAX_VALUES],
        }
    }

    /// Reset to the undefined sentinels in place
    pub fn set_undefined(&mut self) {
        *self = Self::undefined();
    }
}

impl Default for SensorSample {
    fn default() -> Self {
        Self::undefined()
    }
}

/// Static properties of one sensor class
#[derive(Debug, Clone, PartialEq)]
pub struct SensorProperties {
    pub unit: SensorUnit,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
    pub name: String,
    pub vendor: String,
}

/// Properties of one data set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataProperties {
    pub unit: SensorUnit,
    pub min_range: f32,
    pub max_range: f32,
    pub resolution: f32,
}

/// Comparison operator of an event condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    NoOp,
    Equal,
    GreaterThan,
    LessThan,
}

/// Optional condition attached to an event registration
///
/// For polled events an `Equal` condition with a positive value selects the
/// polling interval in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventCondition {
    pub op: ConditionOp,
    pub value: f32,
}

impl EventCondition {
    /// Interval condition: poll every `interval_ms` milliseconds
    pub fn interval_ms(interval_ms: u32) -> Self {
        Self {
            op: ConditionOp::Equal,
            value: interval_ms as f32,
        }
    }
}

/// Payload handed to an event callback
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Plain state value (level, rotation, gesture code, ...)
    Scalar(i32),
    /// Panning-style packed pair
    PanTilt { x: i16, y: i16 },
    /// Polled structured sample
    Sample(SensorSample),
}

/// Coarse device rotation derived from gravity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RotationState {
    Unknown = 0,
    LandscapeLeft = 1,
    PortraitTop = 2,
    PortraitBottom = 3,
    LandscapeRight = 4,
}
