//! Serial Link Error Types

use thiserror::Error;

/// Errors that can occur while managing the serial device
#[derive(Debug, Error)]
pub enum LinkError {
    /// Underlying serial port error
    #[error("serial port error: {0}")]
    Port(#[from] tokio_serial::Error),

    /// I/O error on the open handle
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port is already open
    #[error("port is already open")]
    AlreadyOpen,

    /// No port has been opened yet
    #[error("port is not open")]
    NotOpen,

    /// The port was already configured this session
    #[error("port has already been configured")]
    AlreadyConfigured,

    /// The port must be configured before reading
    #[error("port must be configured before reading")]
    NotConfigured,

    /// The reader is already running
    #[error("already reading from port")]
    AlreadyReading,
}
