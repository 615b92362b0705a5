//! Serial Link Management
//!
//! Owns the physical serial connection to the telemetry board: port
//! discovery, the open/configure/start/stop lifecycle, and the background
//! reader task that moves bytes from the OS handle into the shared ingest
//! buffer one at a time. Platform differences are delegated to
//! `tokio-serial`; the byte source itself sits behind the [`SerialIo`]
//! trait so tests and hardware-free demos can substitute an in-memory
//! loopback.

mod config;
mod device;
mod error;
mod io;
mod reader;

pub use config::{DataBits, FlowControl, Parity, SerialConfig, StopBits};
pub use device::SerialDevice;
pub use error::LinkError;
pub use io::SerialIo;
