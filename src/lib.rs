//! # sensord-client
//!
//! Client runtime for the sensord sensor daemon. Applications open
//! logical connections to sensor classes, subscribe callbacks to events,
//! and fetch data synchronously; the runtime multiplexes everything over
//! per-connection channels to the daemon and keeps delivery, power state
//! and bookkeeping consistent.
//!
//! ## Example
//!
//! ```no_run
//! use sensord_client::{ClientConfig, SensorClient};
//! use sensord_client::types::{event, EventPayload, SensorClass};
//!
//! let client = SensorClient::new(ClientConfig::default());
//! let handle = client.connect(SensorClass::Accelerometer)?;
//! client.register_event(handle, event::ACCEL_ROTATION_CHECK, None, |_, payload| {
//!     if let EventPayload::Scalar(state) = payload {
//!         println!("rotation changed: {}", state);
//!     }
//! })?;
//! client.start(handle, 0)?;
//! # Ok::<(), sensord_client::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod rotation;
pub mod store;
pub mod tables;
pub mod timer;
pub mod transport;
pub mod types;

mod power;

pub use client::SensorClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use tables::{ConnState, Handle};
pub use types::{
    EventCondition, EventPayload, RotationState, SensorClass, SensorSample,
};
