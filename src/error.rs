//! Error types for the sensord client runtime

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Client error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No free slot in a fixed-capacity table
    #[error("Capacity exhausted: {0}")]
    Exhausted(&'static str),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport send/receive failure; the owning handle is released
    #[error("Communication failure: {0}")]
    Communication(String),

    /// Reply carried an unexpected command tag; the channel stays usable
    #[error("Protocol violation: expected reply 0x{expected:02x}, got 0x{actual:02x}")]
    ProtocolViolation {
        /// Command tag the caller waited for
        expected: u16,
        /// Command tag the daemon sent
        actual: u16,
    },

    /// Daemon answered with a negative status
    #[error("Daemon rejected request: status {0}")]
    DaemonRejected(i32),

    /// Operation requires a Started connection
    #[error("Connection not started")]
    NotStarted,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed packet or payload
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// TOML parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
