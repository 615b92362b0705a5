//! Serial Device Lifecycle
//!
//! State machine: `Closed → Opened → Configured → Reading`, back to
//! `Configured` on a clean stop and to `Closed` when the session dies on
//! an OS read failure. Guards on every transition keep the collaborator
//! honest: configuration requires an open port and happens once per
//! session, reading requires both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bounded_buffer::BoundedBuffer;
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SerialConfig;
use crate::error::LinkError;
use crate::io::SerialIo;
use crate::reader::run_reader;

/// Baud rate used between `open` and `configure`; the real line speed is
/// part of [`SerialConfig`].
const PLACEHOLDER_BAUD: u32 = 9600;

struct ReaderHandle {
    cancel: CancellationToken,
    task: JoinHandle<Option<Box<dyn SerialIo>>>,
}

/// Owns the serial connection and the background reader feeding the
/// shared ingest buffer.
pub struct SerialDevice {
    buffer: Arc<BoundedBuffer<u8>>,
    stream: Option<Box<dyn SerialIo>>,
    port_name: Option<String>,
    available_ports: Vec<String>,
    configured: bool,
    reading: Arc<AtomicBool>,
    reader: Option<ReaderHandle>,
}

impl SerialDevice {
    /// Create a closed device that will feed `buffer` once reading starts.
    pub fn new(buffer: Arc<BoundedBuffer<u8>>) -> Self {
        Self {
            buffer,
            stream: None,
            port_name: None,
            available_ports: Vec::new(),
            configured: false,
            reading: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    /// Enumerate serial endpoints visible to the OS.
    ///
    /// Discovery only: nothing is opened. The result is cached and also
    /// available through [`SerialDevice::available_ports`].
    pub fn find_ports(&mut self) -> Result<Vec<String>, LinkError> {
        let ports: Vec<String> = tokio_serial::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        info!("serial discovery found {} port(s)", ports.len());
        self.available_ports = ports.clone();
        Ok(ports)
    }

    /// Open the named port.
    pub async fn open(&mut self, name: &str) -> Result<(), LinkError> {
        if self.is_open() {
            return Err(LinkError::AlreadyOpen);
        }
        let builder = tokio_serial::new(name, PLACEHOLDER_BAUD);
        let stream = SerialStream::open(&builder)?;
        info!("opened serial port {}", name);
        self.stream = Some(Box::new(stream));
        self.port_name = Some(name.to_owned());
        self.configured = false;
        Ok(())
    }

    /// Open an in-memory loopback instead of real hardware.
    ///
    /// Returns the write half; whatever is written there is what the
    /// reader task will see. Used by tests and hardware-free demo runs.
    pub fn open_loopback(&mut self) -> Result<tokio::io::DuplexStream, LinkError> {
        if self.is_open() {
            return Err(LinkError::AlreadyOpen);
        }
        let (tx, rx) = tokio::io::duplex(64);
        info!("opened loopback serial link");
        self.stream = Some(Box::new(rx));
        self.port_name = Some("loopback".to_owned());
        self.configured = false;
        Ok(tx)
    }

    /// Open automatically when discovery yields exactly one candidate.
    ///
    /// Zero or multiple candidates are ambiguous and leave the device
    /// closed; that is a no-op (`Ok(false)`), not an error, so the caller
    /// can fall back to an explicit selection.
    pub async fn auto_open(&mut self) -> Result<bool, LinkError> {
        if self.is_open() {
            return Err(LinkError::AlreadyOpen);
        }
        let ports = self.find_ports()?;
        match ports.as_slice() {
            [only] => {
                let name = only.clone();
                self.open(&name).await?;
                Ok(true)
            }
            _ => {
                info!(
                    "auto-open skipped: {} candidate port(s), need exactly one",
                    ports.len()
                );
                Ok(false)
            }
        }
    }

    /// Apply UART parameters. Exactly once per open session.
    pub fn configure(&mut self, config: &SerialConfig) -> Result<(), LinkError> {
        if self.configured {
            return Err(LinkError::AlreadyConfigured);
        }
        let stream = self.stream.as_mut().ok_or(LinkError::NotOpen)?;
        stream.apply_config(config)?;
        self.configured = true;
        info!("serial port configured at {} baud", config.baud_rate);
        Ok(())
    }

    /// Start the background reader task.
    ///
    /// Clears any stale bytes out of the ingest buffer, then hands the
    /// stream to the reader until [`SerialDevice::stop_reading`] or a read
    /// failure. Requires an open, configured port.
    pub async fn start_reading(&mut self) -> Result<(), LinkError> {
        if self.reader.is_some() {
            return Err(LinkError::AlreadyReading);
        }
        if self.stream.is_none() {
            return Err(LinkError::NotOpen);
        }
        if !self.configured {
            return Err(LinkError::NotConfigured);
        }

        self.buffer.clear();
        self.reading.store(true, Ordering::Release);

        let stream = self.stream.take().ok_or(LinkError::NotOpen)?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_reader(
            stream,
            Arc::clone(&self.buffer),
            Arc::clone(&self.reading),
            cancel.clone(),
        ));
        self.reader = Some(ReaderHandle { cancel, task });
        info!("serial reader started");
        Ok(())
    }

    /// Stop the background reader and wait for it to exit.
    ///
    /// Idempotent: stopping a device that is not reading is a no-op. If
    /// the reader died on a read failure, the session is torn down and the
    /// port must be reopened before reading again.
    pub async fn stop_reading(&mut self) -> Result<(), LinkError> {
        let Some(handle) = self.reader.take() else {
            return Ok(());
        };
        handle.cancel.cancel();
        match handle.task.await {
            Ok(Some(stream)) => {
                // Clean stop: the session stays configured and can be
                // restarted without reopening.
                self.stream = Some(stream);
                info!("serial reader stopped");
            }
            Ok(None) => {
                warn!("serial reader had already died; port must be reopened");
                self.close_session();
            }
            Err(e) => {
                warn!("serial reader task failed to join: {}", e);
                self.close_session();
            }
        }
        self.reading.store(false, Ordering::Release);
        Ok(())
    }

    /// Close the device, stopping the reader first if necessary.
    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.stop_reading().await?;
        if self.port_name.is_some() {
            info!("closing serial port");
        }
        self.close_session();
        Ok(())
    }

    /// Whether a port (or loopback) is currently open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some() || self.reader.is_some()
    }

    /// Whether the background reader is alive.
    ///
    /// Turns false on its own when the reader dies on an OS read failure;
    /// the consumer polls this to detect a lost session.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    /// Name of the open port, if any.
    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    /// Ports found by the most recent discovery.
    pub fn available_ports(&self) -> &[String] {
        &self.available_ports
    }

    fn close_session(&mut self) {
        self.stream = None;
        self.port_name = None;
        self.configured = false;
    }
}

impl std::fmt::Debug for SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("port_name", &self.port_name)
            .field("configured", &self.configured)
            .field("reading", &self.is_reading())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn device() -> SerialDevice {
        SerialDevice::new(Arc::new(BoundedBuffer::new(16)))
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_configure_requires_open_port() {
        let mut dev = device();
        let err = dev.configure(&SerialConfig::default()).unwrap_err();
        assert!(matches!(err, LinkError::NotOpen));
    }

    #[tokio::test]
    async fn test_configure_happens_once_per_session() {
        let mut dev = device();
        let _tx = dev.open_loopback().unwrap();
        dev.configure(&SerialConfig::default()).unwrap();

        let err = dev.configure(&SerialConfig::default()).unwrap_err();
        assert!(matches!(err, LinkError::AlreadyConfigured));
    }

    #[tokio::test]
    async fn test_start_requires_configuration() {
        let mut dev = device();

        let err = dev.start_reading().await.unwrap_err();
        assert!(matches!(err, LinkError::NotOpen));

        let _tx = dev.open_loopback().unwrap();
        let err = dev.start_reading().await.unwrap_err();
        assert!(matches!(err, LinkError::NotConfigured));
    }

    #[tokio::test]
    async fn test_double_open_rejected() {
        let mut dev = device();
        let _tx = dev.open_loopback().unwrap();
        let err = dev.open_loopback().unwrap_err();
        assert!(matches!(err, LinkError::AlreadyOpen));
    }

    #[tokio::test]
    async fn test_lifecycle_round_trip() {
        let buffer = Arc::new(BoundedBuffer::new(16));
        let mut dev = SerialDevice::new(Arc::clone(&buffer));

        let mut tx = dev.open_loopback().unwrap();
        assert!(dev.is_open());
        assert_eq!(dev.port_name(), Some("loopback"));

        dev.configure(&SerialConfig::default()).unwrap();
        dev.start_reading().await.unwrap();
        assert!(dev.is_reading());

        let err = dev.start_reading().await.unwrap_err();
        assert!(matches!(err, LinkError::AlreadyReading));

        tx.write_all(b"xyz").await.unwrap();
        wait_until(|| buffer.len() == 3).await;

        dev.stop_reading().await.unwrap();
        assert!(!dev.is_reading());
        assert!(dev.is_open(), "clean stop keeps the session open");

        // Stopping again is a no-op.
        dev.stop_reading().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_clears_stale_bytes_and_keeps_config() {
        let buffer = Arc::new(BoundedBuffer::new(16));
        let mut dev = SerialDevice::new(Arc::clone(&buffer));

        let mut tx = dev.open_loopback().unwrap();
        dev.configure(&SerialConfig::default()).unwrap();
        dev.start_reading().await.unwrap();

        tx.write_all(b"stale").await.unwrap();
        wait_until(|| buffer.len() == 5).await;

        dev.stop_reading().await.unwrap();

        // No reconfiguration needed: the session is still configured, and
        // the restart must discard the bytes left over from before.
        dev.start_reading().await.unwrap();
        assert!(buffer.is_empty());

        tx.write_all(b"fresh").await.unwrap();
        wait_until(|| buffer.len() == 5).await;
        assert_eq!(buffer.try_pop(), Some(b'f'));

        dev.stop_reading().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_failure_is_fatal_for_the_session() {
        let buffer = Arc::new(BoundedBuffer::new(16));
        let mut dev = SerialDevice::new(Arc::clone(&buffer));

        let tx = dev.open_loopback().unwrap();
        dev.configure(&SerialConfig::default()).unwrap();
        dev.start_reading().await.unwrap();

        // Peer hangup: the reader must die and flag it on its own.
        drop(tx);
        wait_until(|| !dev.is_reading()).await;

        // Reaping the dead reader tears the session down.
        dev.stop_reading().await.unwrap();
        assert!(!dev.is_open());

        let err = dev.configure(&SerialConfig::default()).unwrap_err();
        assert!(matches!(err, LinkError::NotOpen));
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let mut dev = device();
        let _tx = dev.open_loopback().unwrap();
        dev.configure(&SerialConfig::default()).unwrap();
        dev.start_reading().await.unwrap();

        dev.close().await.unwrap();
        assert!(!dev.is_open());
        assert!(!dev.is_reading());
        assert_eq!(dev.port_name(), None);
    }
}
