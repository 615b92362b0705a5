//! Byte Source Abstraction
//!
//! One interface over the two byte sources the device can read from: the
//! real cross-platform serial stream and an in-memory loopback used by
//! tests and hardware-free runs. `tokio-serial` already folds the
//! per-platform differences (overlapped I/O on Windows, termios on Unix)
//! into `SerialStream`, so the trait only has to add UART-parameter
//! application on top of `AsyncRead`.

use tokio::io::AsyncRead;
use tokio_serial::{SerialPort, SerialStream};

use crate::config::SerialConfig;
use crate::error::LinkError;

/// A byte source the reader task can drain.
pub trait SerialIo: AsyncRead + Send + Unpin {
    /// Apply UART parameters to the underlying transport.
    fn apply_config(&mut self, config: &SerialConfig) -> Result<(), LinkError>;
}

impl SerialIo for SerialStream {
    fn apply_config(&mut self, config: &SerialConfig) -> Result<(), LinkError> {
        self.set_baud_rate(config.baud_rate)?;
        self.set_data_bits(config.data_bits.to_serial())?;
        self.set_parity(config.parity.to_serial())?;
        self.set_stop_bits(config.stop_bits.to_serial())?;
        self.set_flow_control(config.flow_control.to_serial())?;
        Ok(())
    }
}

impl SerialIo for tokio::io::DuplexStream {
    /// The loopback has no UART; parameters are accepted and ignored.
    fn apply_config(&mut self, _config: &SerialConfig) -> Result<(), LinkError> {
        Ok(())
    }
}
