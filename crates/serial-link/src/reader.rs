//! Background Reader Task
//!
//! The sole producer of the ingest buffer: waits for bytes on the serial
//! stream and pushes them in one at a time until cancelled or the read
//! fails. All blocking happens here, off the consumer's per-frame path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bounded_buffer::BoundedBuffer;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::io::SerialIo;

/// Drain `stream` into `buffer` until cancellation or a read failure.
///
/// Returns the stream on clean cancellation so the device can reuse it;
/// a failed or closed stream is surrendered (`None`) and the session must
/// be reopened. The `reading` flag is cleared on every exit path, which is
/// how the consumer side detects a reader that died on its own.
pub(crate) async fn run_reader(
    mut stream: Box<dyn SerialIo>,
    buffer: Arc<BoundedBuffer<u8>>,
    reading: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> Option<Box<dyn SerialIo>> {
    let mut byte = [0u8; 1];
    let mut failed = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reader task cancelled");
                break;
            }
            read = stream.read(&mut byte) => match read {
                Ok(0) => {
                    warn!("serial stream closed by peer, reader stopping");
                    failed = true;
                    break;
                }
                Ok(_) => {
                    buffer.force_push(byte[0]);
                }
                Err(e) => {
                    warn!("serial read failed, reader stopping: {}", e);
                    failed = true;
                    break;
                }
            }
        }
    }

    reading.store(false, Ordering::Release);
    if failed {
        None
    } else {
        Some(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

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
    async fn test_reader_moves_bytes_into_buffer() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let buffer = Arc::new(BoundedBuffer::new(16));
        let reading = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_reader(
            Box::new(rx),
            Arc::clone(&buffer),
            Arc::clone(&reading),
            cancel.clone(),
        ));

        tx.write_all(b"abc").await.unwrap();
        wait_until(|| buffer.len() == 3).await;

        assert_eq!(buffer.try_pop(), Some(b'a'));
        assert_eq!(buffer.try_pop(), Some(b'b'));
        assert_eq!(buffer.try_pop(), Some(b'c'));

        cancel.cancel();
        let stream = task.await.unwrap();
        assert!(stream.is_some(), "clean cancellation returns the stream");
        assert!(!reading.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_reader_overflow_counts_drops() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let buffer = Arc::new(BoundedBuffer::new(4));
        let reading = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_reader(
            Box::new(rx),
            Arc::clone(&buffer),
            Arc::clone(&reading),
            cancel.clone(),
        ));

        tx.write_all(b"0123456789").await.unwrap();
        wait_until(|| buffer.dropped_elements() == 6).await;

        // The first four bytes survive; the rest were counted drops.
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.try_pop(), Some(b'0'));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_reader_death_clears_flag_and_surrenders_stream() {
        let (tx, rx) = tokio::io::duplex(64);
        let buffer = Arc::new(BoundedBuffer::new(16));
        let reading = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_reader(
            Box::new(rx),
            Arc::clone(&buffer),
            Arc::clone(&reading),
            cancel.clone(),
        ));

        // Closing the write half is the loopback's equivalent of the OS
        // handle dying mid-session.
        drop(tx);
        let stream = task.await.unwrap();
        assert!(stream.is_none(), "failed stream is not reusable");
        assert!(!reading.load(Ordering::Acquire));
    }
}
